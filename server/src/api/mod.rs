//! S3-style object and bucket operations built on the mutation pipeline.

mod bucket;
mod object_copy;
mod object_delete;
mod object_get;
mod object_put;
mod object_put_tagging;


pub use object_copy::{CopyObjectInput, CopyObjectOutput, Directive};
pub use object_delete::{DeleteObjectInput, DeleteObjectOutput};
pub use object_get::{GetObjectInput, GetObjectOutput};
pub use object_put::{PutObjectInput, PutObjectOutput};
pub use object_put_tagging::{GetObjectTaggingOutput, PutObjectTaggingInput, PutObjectTaggingOutput};

use shared_types::ContentLocation;
use std::sync::Arc;
use storage_backend::{ContentStore, MetadataStore, ObjectStoreBackend};
use tracing::warn;

use crate::auth::{Authorizer, BucketOwnerAuthorizer};
use crate::versioning::MutationPipeline;

pub struct ObjectService {
    pipeline: MutationPipeline,
}

impl ObjectService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        authorizer: Arc<dyn Authorizer>,
        instance_id: u16,
    ) -> Self {
        Self {
            pipeline: MutationPipeline::new(metadata, content, authorizer, instance_id),
        }
    }

    /// Service over a single backend serving both metadata and content,
    /// with owner-only authorization.
    pub fn from_backend(backend: Arc<ObjectStoreBackend>, instance_id: u16) -> Self {
        Self::new(
            backend.clone(),
            backend,
            Arc::new(BucketOwnerAuthorizer),
            instance_id,
        )
    }

    /// Best-effort release of content written for a version that was never
    /// recorded.
    async fn release_orphan(&self, location: &ContentLocation) {
        if let Err(err) = self.pipeline.content().release(location).await {
            warn!(location = %location, error = %err, "Failed to release orphaned content");
        }
    }
}
