use s3scan_storage::{Grant, Grantee};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const AUTHENTICATED_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// The well-known anonymous groups worth reporting.
///
/// Grants to named principals are someone's deliberate choice; grants to
/// these groups make a bucket public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GranteeClass {
    /// Anyone on the internet, no credentials needed.
    Everyone,
    /// Anyone holding *any* AWS credentials.
    AuthenticatedUsers,
}
impl GranteeClass {
    pub const ALL: [GranteeClass; 2] = [GranteeClass::Everyone, GranteeClass::AuthenticatedUsers];

    pub fn uri(&self) -> &'static str {
        match self {
            Self::Everyone => ALL_USERS_URI,
            Self::AuthenticatedUsers => AUTHENTICATED_USERS_URI,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Everyone => "Everyone",
            Self::AuthenticatedUsers => "Authenticated AWS users",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.uri() == uri)
    }

    /// Classify a grant; `None` for anything but the two public groups.
    pub fn of(grant: &Grant) -> Option<Self> {
        match &grant.grantee {
            Grantee::Group { uri } => Self::from_uri(uri),
            _ => None,
        }
    }
}
impl Display for GranteeClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.label())
    }
}

/// Permissions granted to each public group, in the order the service
/// listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessGrants(BTreeMap<GranteeClass, Vec<String>>);

impl AccessGrants {
    pub fn from_grants<'a>(grants: impl IntoIterator<Item = &'a Grant>) -> Self {
        let mut access = Self::default();
        for grant in grants {
            if let Some(class) = GranteeClass::of(grant) {
                access.insert(class, &grant.permission);
            }
        }
        access
    }

    pub fn insert(&mut self, class: GranteeClass, permission: &str) {
        let permissions = self.0.entry(class).or_default();
        if !permissions.iter().any(|p| p == permission) {
            permissions.push(permission.to_string());
        }
    }

    pub fn get(&self, class: GranteeClass) -> &[String] {
        self.0.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GranteeClass, &[String])> {
        self.0.iter().map(|(class, permissions)| (*class, permissions.as_slice()))
    }
}
