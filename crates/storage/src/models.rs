//! Storage models.
//!
//! These types are what probe clients hand back to the scanner: access-control
//! grants and object listings, already stripped of any SDK-specific types.

use time::OffsetDateTime;

/// Subject of an access-control grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    /// A predefined group, identified by its URI (e.g. `AllUsers`).
    Group { uri: String },
    /// A named principal.
    CanonicalUser { id: String, display_name: Option<String> },
    /// A principal identified by e-mail address (legacy ACLs only).
    Email(String),
    /// Anything the service returned that we don't recognise.
    Unknown,
}

/// One entry of a bucket's access-control list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub grantee: Grantee,
    /// Permission token as sent by the service (`READ`, `WRITE`, `FULL_CONTROL`...)
    pub permission: String,
}
impl Grant {
    pub fn new(grantee: Grantee, permission: impl Into<String>) -> Self {
        Self { grantee, permission: permission.into() }
    }

    pub fn group(uri: impl Into<String>, permission: impl Into<String>) -> Self {
        Self::new(Grantee::Group { uri: uri.into() }, permission)
    }
}

/// Object metadata returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Object key, exactly as stored in the bucket
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, if the service sent one
    pub last_modified: Option<OffsetDateTime>,
}
impl ObjectDescriptor {
    pub fn new(key: impl Into<String>, size: u64, last_modified: Option<OffsetDateTime>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified,
        }
    }

    /// Keys ending in a slash are "folders" created by consoles and sync
    /// tools; they carry no content worth downloading.
    pub fn is_directory_placeholder(&self) -> bool {
        self.key.ends_with('/')
    }
}
