//! Versioning core shared by every mutating object operation.

pub mod codec;
pub mod null_version;
pub mod pipeline;
pub mod resolver;

pub use codec::{VersionIdGenerator, VersionQualifier, VersionStamp, NULL_VERSION_ID};
pub use null_version::{CleanupReport, NullVersionPlan, StaleNullVersion, WriteKind};
pub use pipeline::{
    Mutation, MutationOutcome, MutationPipeline, MutationTarget, NewVersion, TargetRequirement,
    ValidatedTarget,
};
pub use resolver::MutationMode;
