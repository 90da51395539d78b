use shared_types::{VersionRole, VersioningStatus};

/// How a mutation interacts with the version chain, derived from the
/// bucket's versioning status at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    /// Versioning never configured: the key holds a single null version.
    NonVersioned,
    /// Every write mints a new, retained version.
    Versioned,
    /// Writes replace the null version; older versioned records survive.
    SuspendedWrite,
}

impl MutationMode {
    pub fn resolve(status: VersioningStatus) -> Self {
        match status {
            VersioningStatus::Disabled => Self::NonVersioned,
            VersioningStatus::Enabled => Self::Versioned,
            VersioningStatus::Suspended => Self::SuspendedWrite,
        }
    }

    /// Whether a newly created record takes over the null-version role.
    pub fn installs_null_version(self) -> bool {
        !matches!(self, Self::Versioned)
    }

    pub fn role_for_new_version(self) -> VersionRole {
        if self.installs_null_version() {
            VersionRole::Null
        } else {
            VersionRole::Versioned
        }
    }
}
