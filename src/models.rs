use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one image in a labeling batch.
pub type AssetId = Uuid;

/// One image handed to a labeling session.
///
/// The decoded image is shared via `Arc` so the detector and classifier can
/// hold it without copying pixel data. The asset is immutable once a session
/// has started.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub id: AssetId,
    pub image: Arc<DynamicImage>,
}

impl ImageAsset {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: Arc::new(image),
        }
    }

    /// Rebuild an asset with a known id, e.g. when the host restores a
    /// pending batch after an interruption.
    pub fn with_id(id: AssetId, image: Arc<DynamicImage>) -> Self {
        Self { id, image }
    }
}

/// Axis-aligned rectangle in the pixel space of one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Center coordinates
    pub fn midpoint(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }
}

/// A sub-area of an image, or the whole image.
///
/// Detectors only ever produce `Part` regions; the session adds the
/// synthetic `Whole` region so every image also gets whole-image labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Region {
    Whole,
    Part(Rect),
}

impl Region {
    pub fn is_whole(&self) -> bool {
        matches!(self, Region::Whole)
    }

    pub fn rect(&self) -> Option<Rect> {
        match self {
            Region::Whole => None,
            Region::Part(rect) => Some(*rect),
        }
    }
}

/// A proposed (label, confidence) pairing for one region, prior to
/// arbitration. Confidence is in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub label: String,
    pub confidence: f32,
}

impl LabelCandidate {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// A finalized, deduplicated (image, label) fact.
///
/// `region` is the originating detector region; `None` means the label was
/// assigned to the whole image. Whole-image assignments carry no confidence
/// (see the arbitration precedence rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAssignment {
    pub asset: AssetId,
    pub label: String,
    pub region: Option<Rect>,
    pub confidence: Option<f32>,
}

/// Reverse index from label text to the images carrying that label.
///
/// Deduplicated by asset identity; insertion order is irrelevant. Mutated
/// only by the session's aggregation path, read by observers as a cloned
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelIndex {
    map: HashMap<String, HashSet<AssetId>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `asset` under `label`. Returns false if it was already present.
    pub fn insert(&mut self, label: &str, asset: AssetId) -> bool {
        self.map.entry(label.to_string()).or_default().insert(asset)
    }

    pub fn contains(&self, label: &str, asset: AssetId) -> bool {
        self.map
            .get(label)
            .is_some_and(|assets| assets.contains(&asset))
    }

    pub fn assets_for(&self, label: &str) -> Option<&HashSet<AssetId>> {
        self.map.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of distinct labels in the index.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Progress snapshot exposed by a labeling session.
///
/// `images_completed` never decreases and `done` never reverts to false.
/// Cancellation finalizes the session, so a cancelled session reports both
/// `cancelled` and `done`; a naturally completed one reports `done` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub images_total: usize,
    pub images_completed: usize,
    pub paused: bool,
    pub cancelled: bool,
    pub done: bool,
}

/// Corner of a region at which a label badge is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorCorner {
    TopRight,
    BottomRight,
    BottomLeft,
    TopLeft,
}

/// Badge anchor for one region, in the pixel space of its source image.
///
/// `(x, y)` is the anchor corner point of the region; conversion to a
/// display-space badge position happens in the placement engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub x: f32,
    pub y: f32,
    pub corner: AnchorCorner,
}
