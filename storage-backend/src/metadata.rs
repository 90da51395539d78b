use shared_types::ObjectMetadataRecord;

/// All stored versions of one key, ordered newest-first.
///
/// The chain is never stored as a unit; backends rebuild it from the
/// individual version records on every listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionChain {
    records: Vec<ObjectMetadataRecord>,
}

impl VersionChain {
    pub fn new(mut records: Vec<ObjectMetadataRecord>) -> Self {
        // Version ids sort lexicographically newest-first.
        records.sort_by(|a, b| a.version_id.cmp(&b.version_id));
        Self { records }
    }

    pub fn latest(&self) -> Option<&ObjectMetadataRecord> {
        self.records.first()
    }

    /// The record currently holding the null-version role, if any.
    pub fn null_version(&self) -> Option<&ObjectMetadataRecord> {
        self.records.iter().find(|r| r.is_null())
    }

    pub fn null_versions(&self) -> impl Iterator<Item = &ObjectMetadataRecord> {
        self.records.iter().filter(|r| r.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectMetadataRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ObjectMetadataRecord> {
        self.records
    }
}
