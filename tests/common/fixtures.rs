use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use labelscan::{
    AdapterError, AssetId, ImageAsset, LabelCandidate, LabelClassifier, LabelingSession, Rect,
    Region, RegionDetector, SessionConfig,
};

/// Creates a 64x64 asset. Adapters in these tests never look at pixels.
pub fn make_asset() -> ImageAsset {
    ImageAsset::new(DynamicImage::new_rgb8(64, 64))
}

pub fn make_rect(left: f32, top: f32, right: f32, bottom: f32) -> Rect {
    Rect::new(left, top, right, bottom)
}

/// Builds candidates from (label, confidence) pairs.
pub fn make_candidates(pairs: &[(&str, f32)]) -> Vec<LabelCandidate> {
    pairs
        .iter()
        .map(|(label, confidence)| LabelCandidate::new(*label, *confidence))
        .collect()
}

/// Scripted detector outcome for one asset.
#[derive(Clone)]
pub enum DetectOutcome {
    Regions(Vec<Rect>),
    Fail,
    Cancelled,
}

/// Detector that replays a fixed script per asset id. Assets without a
/// script detect zero regions.
#[derive(Default)]
pub struct ScriptedDetector {
    pub outcomes: HashMap<AssetId, DetectOutcome>,
    pub delay: Option<Duration>,
}

impl ScriptedDetector {
    pub fn with_outcome(mut self, asset: &ImageAsset, outcome: DetectOutcome) -> Self {
        self.outcomes.insert(asset.id, outcome);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl RegionDetector for ScriptedDetector {
    async fn detect(&self, asset: &ImageAsset) -> Result<Vec<Rect>, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.outcomes.get(&asset.id) {
            Some(DetectOutcome::Regions(rects)) => Ok(rects.clone()),
            Some(DetectOutcome::Fail) => {
                Err(AdapterError::Failed(anyhow::anyhow!("scripted failure")))
            }
            Some(DetectOutcome::Cancelled) => Err(AdapterError::Cancelled),
            None => Ok(Vec::new()),
        }
    }
}

/// Classifier that replays fixed candidate lists per asset id, one list for
/// the whole-image region and one for every part region.
#[derive(Default)]
pub struct ScriptedClassifier {
    pub whole: HashMap<AssetId, Vec<LabelCandidate>>,
    pub part: HashMap<AssetId, Vec<LabelCandidate>>,
    pub delay: Option<Duration>,
}

impl ScriptedClassifier {
    pub fn with_whole(mut self, asset: &ImageAsset, pairs: &[(&str, f32)]) -> Self {
        self.whole.insert(asset.id, make_candidates(pairs));
        self
    }

    pub fn with_part(mut self, asset: &ImageAsset, pairs: &[(&str, f32)]) -> Self {
        self.part.insert(asset.id, make_candidates(pairs));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl LabelClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        asset: &ImageAsset,
        region: Region,
    ) -> Result<Vec<LabelCandidate>, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let script = if region.is_whole() {
            &self.whole
        } else {
            &self.part
        };
        Ok(script.get(&asset.id).cloned().unwrap_or_default())
    }
}

/// Session over scripted adapters with the given confidence threshold.
pub fn make_session(
    detector: ScriptedDetector,
    classifier: ScriptedClassifier,
    confidence_threshold: f32,
) -> LabelingSession {
    LabelingSession::new(
        Arc::new(detector),
        Arc::new(classifier),
        SessionConfig {
            confidence_threshold,
            excluded_labels: HashSet::new(),
            dispatch_delay: None,
        },
    )
}
