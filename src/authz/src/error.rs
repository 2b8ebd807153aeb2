//! Error types for the authorization engine

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Policy configuration errors
///
/// Only produced while loading or validating a policy definition. Any of
/// these is fatal to startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required policy section has no entries
    #[error("Invalid policy: {0} must not be empty")]
    EmptySection(&'static str),

    /// A declared name is the empty string
    #[error("Invalid policy: {kind} name must not be empty")]
    EmptyName { kind: &'static str },

    /// A name is declared more than once
    #[error("Invalid policy: duplicate {kind} `{name}`")]
    DuplicateName { kind: &'static str, name: String },

    /// Two roles claim the same privilege level
    #[error("Invalid policy: roles `{first}` and `{second}` share level {level}")]
    DuplicateRoleLevel {
        level: u32,
        first: String,
        second: String,
    },

    /// A section references a name that was never declared
    #[error("Invalid policy: {context} references undeclared {kind} `{name}`")]
    Undeclared {
        kind: &'static str,
        name: String,
        context: String,
    },

    /// The permission mapping uses a permission or action twice
    #[error("Invalid policy: {kind} `{name}` appears more than once in the permission mapping")]
    DuplicateMapping { kind: &'static str, name: String },

    /// Policy file could not be read
    #[error("Failed to read policy file `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Policy file is not a valid policy document
    #[error("Failed to parse policy: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Machine-inspectable reason attached to every denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCode {
    NilSubject,
    InvalidRole,
    InvalidPermission,
    UnknownAuthType,
    Denied,
}

impl DenialCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NilSubject => "nil_subject",
            Self::InvalidRole => "invalid_role",
            Self::InvalidPermission => "invalid_permission",
            Self::UnknownAuthType => "unknown_auth_type",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization decision errors
///
/// The message is descriptive and meant for operators; callers decide how
/// much of it is safe to surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// No authenticated subject was supplied
    #[error("No subject supplied")]
    NilSubject,

    /// A role that is empty or not declared in the policy was used
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// A permission that is not declared in the policy was used
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    /// The trust-model tag is not one the engine understands
    #[error("Unknown auth type `{0}`")]
    UnknownAuthType(String),

    /// The decision is no
    #[error("Access denied: {0}")]
    Denied(String),
}

impl AuthzError {
    /// Reason code for this denial
    pub fn code(&self) -> DenialCode {
        match self {
            Self::NilSubject => DenialCode::NilSubject,
            Self::InvalidRole(_) => DenialCode::InvalidRole,
            Self::InvalidPermission(_) => DenialCode::InvalidPermission,
            Self::UnknownAuthType(_) => DenialCode::UnknownAuthType,
            Self::Denied(_) => DenialCode::Denied,
        }
    }
}

/// Result type for authorization decisions
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_codes() {
        assert_eq!(AuthzError::NilSubject.code(), DenialCode::NilSubject);
        assert_eq!(
            AuthzError::InvalidRole("ghost".into()).code(),
            DenialCode::InvalidRole
        );
        assert_eq!(
            AuthzError::Denied("no".into()).code().as_str(),
            "denied"
        );
        assert_eq!(
            serde_json::to_string(&DenialCode::UnknownAuthType).unwrap(),
            "\"unknown_auth_type\""
        );
    }

    #[test]
    fn test_config_error_names_offending_entry() {
        let err = ConfigError::DuplicateRoleLevel {
            level: 2,
            first: "editor".into(),
            second: "maintainer".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("editor"));
        assert!(msg.contains("maintainer"));
        assert!(msg.contains('2'));
    }
}
