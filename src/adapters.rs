//! Collaborator seams for the two ML stages.
//!
//! The detector and classifier are opaque external services supplied by the
//! host application. The session only relies on their completion contract:
//! success with candidates, failure, or cooperative cancellation.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ImageAsset, LabelCandidate, Rect, Region};

/// Failure modes of a single detector or classifier call.
///
/// The session treats both variants as "zero candidates" for that unit and
/// keeps going; the distinction only matters for logging.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter call failed: {0}")]
    Failed(anyhow::Error),

    #[error("adapter call was cancelled")]
    Cancelled,
}

/// Region detection stage: yields zero or more candidate bounding boxes for
/// one image.
#[async_trait]
pub trait RegionDetector: Send + Sync {
    async fn detect(&self, asset: &ImageAsset) -> Result<Vec<Rect>, AdapterError>;
}

/// Classification stage: yields a ranked list of label candidates for one
/// region of an image (or the whole image).
#[async_trait]
pub trait LabelClassifier: Send + Sync {
    async fn classify(
        &self,
        asset: &ImageAsset,
        region: Region,
    ) -> Result<Vec<LabelCandidate>, AdapterError>;
}
