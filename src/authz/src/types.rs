//! Core authorization names
//!
//! Roles, permissions, resources and actions are plain string tokens. Each is
//! wrapped in its own newtype so a permission can never be passed where an
//! action is expected, while still serializing as a bare string.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new name from any string-like value
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the underlying name
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the name is the empty string
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    };
}

name_type!(
    /// A named privilege tier for interactive identities
    Role
);

name_type!(
    /// A named capability grantable to a machine credential
    Permission
);

name_type!(
    /// A protected object category (file, folder, api_key, ...)
    Resource
);

name_type!(
    /// An operation performable on a resource
    Action
);

/// Set of permissions held by a machine credential
pub type PermissionSet = BTreeSet<Permission>;

/// Well-known role names of the built-in policy
pub mod roles {
    pub const VIEWER: &str = "viewer";
    pub const EDITOR: &str = "editor";
    pub const ADMIN: &str = "admin";
}

/// Well-known permission names of the built-in policy
pub mod permissions {
    pub const READ: &str = "read";
    pub const WRITE: &str = "write";
    pub const DELETE: &str = "delete";
}

/// Well-known resource names of the built-in policy
pub mod resources {
    pub const PROJECT: &str = "project";
    pub const FILE: &str = "file";
    pub const FOLDER: &str = "folder";
    pub const API_KEY: &str = "api_key";
    pub const MEMBER: &str = "member";
}

/// Well-known action names of the built-in policy
pub mod actions {
    pub const READ: &str = "read";
    pub const WRITE: &str = "write";
    pub const DELETE: &str = "delete";
    pub const MANAGE: &str = "manage";
}
