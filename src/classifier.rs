//! Extension point for the classifier/thumbnailer collaborator excluded
//! from this crate. `Classifier` formalizes the boundary [`crate::rules`]
//! and [`crate::plans`] dispatch outcomes across, without the core ever
//! invoking a real implementation.

use crate::database::entities::entry;
use crate::error::CoreResult;
use async_trait::async_trait;
use serde_json::Value as Json;

/// Classifies or extracts artifacts for a single catalogued entry, e.g.
/// generating a thumbnail or tagging a MIME type. Implementations are
/// expected to report their own progress via a [`crate::progress::ProgressTracker`]
/// bound to a [`crate::database::entities::classifier_job`] row.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, entry: &entry::Model) -> CoreResult<Json>;
}
