use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Remote resource kinds named in not-found errors and operator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    Function,
    Repository,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Function => "function",
            Self::Repository => "repository",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RoleNotYetUsable,
    IdentityService,
    ComputePlatform,
    Provisioning,
    Permission,
    NotFound,
    Aborted,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Role is not yet usable by the compute platform: {0}")]
    RoleNotYetUsable(String),

    #[error("Identity service error: {0}")]
    IdentityService(String),

    #[error("Compute platform error: {0}")]
    ComputePlatform(String),

    #[error("Repository provisioning failed (status {}): {message}", status_label(.status_code))]
    Provisioning {
        status_code: Option<i32>,
        message: String,
    },

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("{resource} not found: {name}")]
    NotFound { resource: ResourceKind, name: String },

    #[error("Workflow aborted: {0}")]
    Aborted(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn status_label(status_code: &Option<i32>) -> String {
    status_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl ProvisionError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RoleNotYetUsable(_) => ErrorKind::RoleNotYetUsable,
            Self::IdentityService(_) => ErrorKind::IdentityService,
            Self::ComputePlatform(_) => ErrorKind::ComputePlatform,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::Permission(_) => ErrorKind::Permission,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::RoleNotYetUsable(_) => "role_not_yet_usable",
            Self::IdentityService(_) => "identity_service_error",
            Self::ComputePlatform(_) => "compute_platform_error",
            Self::Provisioning { .. } => "provisioning_error",
            Self::Permission(_) => "permission_error",
            Self::NotFound { .. } => "not_found",
            Self::Aborted(_) => "aborted",
            Self::Config(_) => "config_error",
        }
    }

    /// Only propagation delay is worth waiting out.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RoleNotYetUsable(_))
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn not_found(resource: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            name: name.into(),
        }
    }
}

impl Serialize for ProvisionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProvisionError", 3)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("error_type", self.error_type())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

const PERMISSION_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "UnrecognizedClientException",
    "ExpiredToken",
    "ExpiredTokenException",
];

/// Maps a compute platform error code/message pair onto the taxonomy.
///
/// Freshly created roles surface as `InvalidParameterValueException` with a
/// message along the lines of "The role defined for the function cannot be
/// assumed by Lambda", which is the only retryable shape.
pub fn classify_compute_error(
    code: Option<&str>,
    message: Option<&str>,
    function_name: &str,
) -> ProvisionError {
    let message_text = message.unwrap_or_default().to_string();
    match code {
        Some("InvalidParameterValueException") if mentions_unusable_role(&message_text) => {
            ProvisionError::RoleNotYetUsable(message_text)
        }
        Some("ResourceNotFoundException") => {
            ProvisionError::not_found(ResourceKind::Function, function_name)
        }
        Some(code) if PERMISSION_CODES.contains(&code) => {
            ProvisionError::Permission(describe(code, &message_text))
        }
        Some(code) => ProvisionError::ComputePlatform(describe(code, &message_text)),
        None => ProvisionError::ComputePlatform(message_text),
    }
}

/// Maps an identity service error code/message pair onto the taxonomy.
pub fn classify_identity_error(
    code: Option<&str>,
    message: Option<&str>,
    role_name: &str,
) -> ProvisionError {
    let message_text = message.unwrap_or_default().to_string();
    match code {
        Some("NoSuchEntity") => ProvisionError::not_found(ResourceKind::Role, role_name),
        Some(code) if PERMISSION_CODES.contains(&code) => {
            ProvisionError::Permission(describe(code, &message_text))
        }
        Some(code) => ProvisionError::IdentityService(describe(code, &message_text)),
        None => ProvisionError::IdentityService(message_text),
    }
}

fn mentions_unusable_role(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("cannot be assumed") || lowered.contains("role")
}

fn describe(code: &str, message: &str) -> String {
    if message.is_empty() {
        code.to_string()
    } else {
        format!("{code}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassumable_role_is_retryable() {
        let error = classify_compute_error(
            Some("InvalidParameterValueException"),
            Some("The role defined for the function cannot be assumed by Lambda."),
            "my-fn",
        );

        assert_eq!(error.kind(), ErrorKind::RoleNotYetUsable);
        assert!(error.is_retryable());
    }

    #[test]
    fn other_invalid_parameters_are_fatal() {
        let error = classify_compute_error(
            Some("InvalidParameterValueException"),
            Some("Unsupported runtime"),
            "my-fn",
        );

        assert_eq!(error.kind(), ErrorKind::ComputePlatform);
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("Unsupported runtime"));
    }

    #[test]
    fn missing_function_maps_to_not_found() {
        let error = classify_compute_error(Some("ResourceNotFoundException"), None, "gone-fn");

        assert_eq!(error, ProvisionError::not_found(ResourceKind::Function, "gone-fn"));
        assert_eq!(error.to_string(), "function not found: gone-fn");
    }

    #[test]
    fn access_denied_is_surfaced_as_permission_error() {
        let compute = classify_compute_error(Some("AccessDeniedException"), Some("nope"), "f");
        let identity = classify_identity_error(Some("AccessDenied"), Some("nope"), "r");

        assert_eq!(compute.kind(), ErrorKind::Permission);
        assert_eq!(identity.kind(), ErrorKind::Permission);
        assert_eq!(identity.to_string(), "Permission denied: AccessDenied: nope");
    }

    #[test]
    fn identity_errors_default_to_service_errors() {
        let missing = classify_identity_error(Some("NoSuchEntity"), None, "my-fn-IamRole");
        let conflict = classify_identity_error(Some("EntityAlreadyExists"), Some("exists"), "r");
        let opaque = classify_identity_error(None, Some("dispatch failure"), "r");

        assert!(missing.is_not_found());
        assert_eq!(conflict.error_type(), "identity_service_error");
        assert_eq!(opaque.to_string(), "Identity service error: dispatch failure");
    }

    #[test]
    fn serializes_kind_type_and_message() {
        let value = serde_json::to_value(ProvisionError::not_found(ResourceKind::Role, "r"))
            .expect("error should serialize");

        assert_eq!(
            value,
            serde_json::json!({
                "kind": "not_found",
                "error_type": "not_found",
                "message": "role not found: r",
            })
        );
    }

    #[test]
    fn provisioning_error_reports_status_code() {
        let with_code = ProvisionError::Provisioning {
            status_code: Some(500),
            message: "boom".to_string(),
        };
        let transport = ProvisionError::Provisioning {
            status_code: None,
            message: "timeout".to_string(),
        };

        assert_eq!(
            with_code.to_string(),
            "Repository provisioning failed (status 500): boom"
        );
        assert_eq!(
            transport.to_string(),
            "Repository provisioning failed (status none): timeout"
        );
    }
}
