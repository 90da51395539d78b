//! Bookkeeping for the null-version role.
//!
//! At most one record per key may hold the null role. Whenever a write
//! installs a new null version, every other null record of the key becomes
//! stale and is scheduled for removal, whether or not it is the latest.

use shared_types::{ContentLocation, ObjectMetadataRecord};
use storage_backend::VersionChain;

use super::resolver::MutationMode;

/// How the pending record reaches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// A freshly minted record, written under the given mode.
    Create(MutationMode),
    /// An existing record edited under its own id.
    InPlace,
}

impl WriteKind {
    /// Whether the write may displace an existing null version, which is
    /// the only case where the chain has to be consulted.
    pub fn may_supersede_null(self) -> bool {
        match self {
            Self::Create(mode) => mode.installs_null_version(),
            Self::InPlace => false,
        }
    }
}

/// A superseded null record and the content it pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleNullVersion {
    pub key: String,
    pub version_id: String,
    pub content: Option<ContentLocation>,
}

impl From<&ObjectMetadataRecord> for StaleNullVersion {
    fn from(record: &ObjectMetadataRecord) -> Self {
        Self {
            key: record.key.clone(),
            version_id: record.version_id.clone(),
            content: record.content_location().cloned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullVersionPlan {
    pub stale: Vec<StaleNullVersion>,
}

impl NullVersionPlan {
    pub fn is_noop(&self) -> bool {
        self.stale.is_empty()
    }
}

/// Decide which null records `new_record` displaces.
///
/// `chain` is the key's chain as read before the write and may be empty
/// when the write cannot displace anything.
pub fn plan(
    write: WriteKind,
    new_record: &ObjectMetadataRecord,
    chain: &VersionChain,
) -> NullVersionPlan {
    if !write.may_supersede_null() || !new_record.is_null() {
        return NullVersionPlan::default();
    }

    let stale = chain
        .null_versions()
        .filter(|record| record.version_id != new_record.version_id)
        .map(StaleNullVersion::from)
        .collect();

    NullVersionPlan { stale }
}

/// Result of reclaiming the stale null versions of one write.
///
/// Failures do not fail the write; they leave orphaned records or content
/// behind and are reported here and in the logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub reclaimed: Vec<StaleNullVersion>,
    pub failed: Vec<StaleNullVersion>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
