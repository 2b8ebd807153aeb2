//! # Shelf Authorization Engine
//!
//! Decides whether an authenticated caller may perform an action on a
//! resource, under two trust models:
//!
//! - **Users** are authorized by role, through a role → resource → action
//!   capability matrix, and by role level for minimum-role checks.
//! - **API keys** are authorized by permission set, restricted to the
//!   policy's machine resource scope and translated through the
//!   permission ↔ action mapping.
//!
//! ## Example
//!
//! ```rust
//! use shelf_authz::{AuthSubject, Checker, PolicyDefinition};
//!
//! let checker = Checker::new(PolicyDefinition::builtin()).expect("valid policy");
//!
//! let viewer = AuthSubject::user("viewer");
//! assert!(checker.authorize(Some(&viewer), "file", "read").is_ok());
//! assert!(checker.authorize(Some(&viewer), "file", "write").is_err());
//!
//! let key = AuthSubject::api_key(["read"]);
//! assert!(checker.authorize(Some(&key), "file", "read").is_ok());
//! assert!(checker.require_role(Some(&key), "viewer").is_err());
//! ```

pub mod engine;
pub mod error;
pub mod policy;
pub mod subject;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use engine::Checker;
pub use error::{AuthzError, ConfigError, DenialCode, Result};
pub use policy::{CapabilityMatrix, PermissionMapping, PolicyDefinition, RoleDefinition};
pub use subject::{AuthSubject, AuthType};
pub use types::{Action, Permission, PermissionSet, Resource, Role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
