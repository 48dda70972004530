mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from labelscan for tests
pub use labelscan::{
    AdapterError, AssetId, ImageAsset, LabelCandidate, LabelClassifier, LabelIndex,
    LabelingSession, Rect, Region, RegionDetector, SessionConfig,
};
