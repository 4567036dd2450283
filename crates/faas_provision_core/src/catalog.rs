use std::str::FromStr;

use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    NodeJs,
    Golang,
    Java,
    Python,
}

impl Language {
    pub const ALL: [Language; 4] = [Self::NodeJs, Self::Golang, Self::Java, Self::Python];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NodeJs => "nodejs",
            Self::Golang => "golang",
            Self::Java => "java",
            Self::Python => "python",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nodejs" | "node" => Ok(Self::NodeJs),
            "golang" | "go" => Ok(Self::Golang),
            "java" => Ok(Self::Java),
            "python" | "py" => Ok(Self::Python),
            other => Err(ValidationError::new(format!(
                "Unsupported language '{other}', expected one of: nodejs, golang, java, python"
            ))),
        }
    }
}

/// Static platform settings for one supported source language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeDescriptor {
    pub language: Language,
    /// Runtime identifier understood by the compute platform.
    pub platform_runtime_id: &'static str,
    pub default_handler: &'static str,
    /// Object key of the example deployment zip in the artifact bucket.
    pub example_artifact_key: &'static str,
    /// Template repository new function repositories are generated from.
    pub template_repo_id: &'static str,
}

static CATALOG: [RuntimeDescriptor; 4] = [
    RuntimeDescriptor {
        language: Language::NodeJs,
        platform_runtime_id: "nodejs20.x",
        default_handler: "dist/index.handler",
        example_artifact_key: "nodejs-function.zip",
        template_repo_id: "nodejs-lambda",
    },
    RuntimeDescriptor {
        language: Language::Golang,
        platform_runtime_id: "provided.al2023",
        default_handler: "main",
        example_artifact_key: "golang-function.zip",
        template_repo_id: "golang-lambda",
    },
    RuntimeDescriptor {
        language: Language::Java,
        platform_runtime_id: "java21",
        default_handler: "com.example.app.Function::Handler",
        example_artifact_key: "java-function.zip",
        template_repo_id: "java-lambda",
    },
    RuntimeDescriptor {
        language: Language::Python,
        platform_runtime_id: "python3.10",
        default_handler: "handler",
        example_artifact_key: "python-function.zip",
        template_repo_id: "python-lambda",
    },
];

pub fn all() -> &'static [RuntimeDescriptor] {
    &CATALOG
}

pub fn lookup(language: Language) -> &'static RuntimeDescriptor {
    match language {
        Language::NodeJs => &CATALOG[0],
        Language::Golang => &CATALOG[1],
        Language::Java => &CATALOG[2],
        Language::Python => &CATALOG[3],
    }
}

pub fn lookup_by_name(language: &str) -> Result<&'static RuntimeDescriptor, ValidationError> {
    language.parse::<Language>().map(lookup)
}
