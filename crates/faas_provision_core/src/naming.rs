use crate::error::ValidationError;

pub const ROLE_NAME_SUFFIX: &str = "-IamRole";

/// Accepts non-empty names made only of ASCII letters, digits and `-`.
pub fn validate_function_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("function name is required"));
    }

    if let Some(invalid) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
    {
        return Err(ValidationError::new(format!(
            "spaces and special characters other than \"-\" are not allowed (found {invalid:?})"
        )));
    }

    Ok(())
}

pub fn role_name_for(function_name: &str) -> String {
    format!("{function_name}{ROLE_NAME_SUFFIX}")
}

pub fn repository_name_for(function_name: &str, suffix: &str) -> String {
    format!("{function_name}.{suffix}")
}
