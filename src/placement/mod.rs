//! Label badge placement: anchor ordering, display-space conversion, and the
//! replay cache that keeps badge positions stable across re-renders.

pub mod tour;

use std::collections::HashMap;

use tracing::debug;

use crate::models::{AnchorCorner, PlacementResult, Rect};

/// A detector region paired with the single label shown on its badge.
#[derive(Debug, Clone)]
pub struct LabeledRegion {
    pub label: String,
    pub rect: Rect,
}

impl LabeledRegion {
    pub fn new(label: impl Into<String>, rect: Rect) -> Self {
        Self {
            label: label.into(),
            rect,
        }
    }
}

/// Badge pixel dimensions in display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeSize {
    pub width: f32,
    pub height: f32,
}

/// Image→display mapping: per-axis scale factors plus the display boundary
/// badges must stay inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale_x: f32,
    pub scale_y: f32,
    pub display_width: f32,
    pub display_height: f32,
}

/// Display-space top-left corner for one badge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgePosition {
    pub x: f32,
    pub y: f32,
}

/// Computes badge anchors and remembers the last result per label.
///
/// Owned by the rendering layer and outliving individual labeling sessions:
/// the set of labels *shown* changes frequently (user selection) while label
/// *positions* must stay visually stable, so re-renders that carry no new
/// geometry replay cached results instead of recomputing.
#[derive(Debug, Default)]
pub struct PlacementEngine {
    cache: HashMap<String, PlacementResult>,
}

impl PlacementEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all cached results. Callers do this when starting a fresh,
    /// non-incremental placement pass.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Full recompute: runs the anchor ordering over `regions` and stores
    /// each label's result, overwriting stale cache entries. Results are
    /// index-aligned to the input.
    pub fn compute(&mut self, regions: &[LabeledRegion]) -> Vec<PlacementResult> {
        let rects: Vec<Rect> = regions.iter().map(|r| r.rect).collect();
        let results = tour::assign_anchors(&rects);
        for (region, result) in regions.iter().zip(&results) {
            self.cache.insert(region.label.clone(), *result);
        }
        debug!(regions = regions.len(), "placement recomputed");
        results
    }

    /// Cache replay: returns the last computed result for each label,
    /// index-aligned to `labels`.
    ///
    /// # Panics
    ///
    /// Panics if any label has no cached result. Replay is only valid after
    /// a full recompute covering the label, so a miss is a caller bug, not a
    /// recoverable runtime case.
    pub fn replay(&self, labels: &[&str]) -> Vec<PlacementResult> {
        labels
            .iter()
            .map(|label| {
                *self.cache.get(*label).unwrap_or_else(|| {
                    panic!("placement replay for label {label:?} without a prior full recompute")
                })
            })
            .collect()
    }

    /// Converts an anchor to the display-space top-left of its badge.
    ///
    /// The badge corner named by the anchor is pinned at the (scaled) anchor
    /// point, subtracting the badge's width/height as needed, then both axes
    /// are clamped so the badge stays inside the display boundary.
    pub fn to_display(
        &self,
        result: &PlacementResult,
        badge: BadgeSize,
        viewport: Viewport,
    ) -> BadgePosition {
        let anchor_x = result.x * viewport.scale_x;
        let anchor_y = result.y * viewport.scale_y;

        let (x, y) = match result.corner {
            AnchorCorner::TopRight => (anchor_x - badge.width, anchor_y),
            AnchorCorner::BottomRight => (anchor_x - badge.width, anchor_y - badge.height),
            AnchorCorner::BottomLeft => (anchor_x, anchor_y - badge.height),
            AnchorCorner::TopLeft => (anchor_x, anchor_y),
        };

        BadgePosition {
            x: x.clamp(0.0, (viewport.display_width - badge.width).max(0.0)),
            y: y.clamp(0.0, (viewport.display_height - badge.height).max(0.0)),
        }
    }
}
