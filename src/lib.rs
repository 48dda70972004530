pub mod adapters;
pub mod models;
pub mod placement;
pub mod session;
pub mod singleflight;

pub use adapters::{AdapterError, LabelClassifier, RegionDetector};
pub use models::{
    AnchorCorner, AssetId, ImageAsset, LabelAssignment, LabelCandidate, LabelIndex,
    PlacementResult, Rect, Region, SessionState,
};
pub use placement::{BadgePosition, BadgeSize, LabeledRegion, PlacementEngine, Viewport};
pub use session::{ArbitrationPolicy, LabelingSession, SessionConfig};
pub use singleflight::{CancelSignal, JoiningRunner, RunOutcome, SupersedingRunner};
