//! Label aggregation and arbitration policy.
//!
//! Pure decision logic applied per classifier completion: which candidates
//! survive for a region, and whether a surviving (image, label) pair enters
//! the assignment set or is dropped as a duplicate.

use std::collections::{HashMap, HashSet};

use crate::models::{AssetId, LabelAssignment, LabelCandidate, LabelIndex, Rect, Region};

/// At most this many labels are kept from a whole-image classification.
const WHOLE_IMAGE_LABEL_CAP: usize = 2;

/// Caller-supplied arbitration settings.
#[derive(Debug, Clone, Default)]
pub struct ArbitrationPolicy {
    /// Candidates below this confidence are rejected.
    pub confidence_threshold: f32,
    /// Label texts that are never assigned.
    pub excluded_labels: HashSet<String>,
}

impl ArbitrationPolicy {
    pub fn new(confidence_threshold: f32, excluded_labels: HashSet<String>) -> Self {
        Self {
            confidence_threshold,
            excluded_labels,
        }
    }

    /// Selects the candidates that survive arbitration for one region.
    ///
    /// Whole-image regions keep the top 2 remaining candidates by descending
    /// confidence; part regions keep only the single best one.
    pub fn select(&self, region: Region, candidates: Vec<LabelCandidate>) -> Vec<LabelCandidate> {
        let mut kept: Vec<LabelCandidate> = candidates
            .into_iter()
            .filter(|c| c.confidence >= self.confidence_threshold)
            .filter(|c| !self.excluded_labels.contains(&c.label))
            .collect();

        kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let cap = if region.is_whole() {
            WHOLE_IMAGE_LABEL_CAP
        } else {
            1
        };
        kept.truncate(cap);
        kept
    }
}

#[derive(Debug, Clone)]
struct StoredAssignment {
    region: Option<Rect>,
    confidence: Option<f32>,
}

/// The session's aggregation state: deduplicated assignments plus the
/// label→images reverse index. Only ever mutated from the session's single
/// locked aggregation path.
#[derive(Debug, Default)]
pub(crate) struct Aggregation {
    assignments: HashMap<(AssetId, String), StoredAssignment>,
    index: LabelIndex,
}

impl Aggregation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies the accepted candidates of one region completion.
    ///
    /// Dedup rule: a (image, label) pair is inserted once. A later duplicate
    /// is dropped, except that a part-region detection replaces an earlier
    /// whole-image detection of the same label when its confidence beats the
    /// prior one (unscored priors compare as 0).
    pub(crate) fn apply(&mut self, asset: AssetId, region: Region, accepted: Vec<LabelCandidate>) {
        for candidate in accepted {
            // Whole-image assignments are stored unscored; only part-region
            // confidences participate in the precedence comparison.
            let incoming = StoredAssignment {
                region: region.rect(),
                confidence: region.rect().map(|_| candidate.confidence),
            };

            let key = (asset, candidate.label.clone());
            match self.assignments.get_mut(&key) {
                None => {
                    self.assignments.insert(key, incoming);
                    self.index.insert(&candidate.label, asset);
                }
                Some(existing) => {
                    let prior_is_whole = existing.region.is_none();
                    let prior_score = existing.confidence.unwrap_or(0.0);
                    let supersedes = existing.confidence.is_none()
                        || candidate.confidence > prior_score;
                    if region.rect().is_some() && prior_is_whole && supersedes {
                        // The index already holds this asset exactly once;
                        // only the provenance changes.
                        *existing = incoming;
                    }
                }
            }
        }
    }

    pub(crate) fn index(&self) -> &LabelIndex {
        &self.index
    }

    pub(crate) fn assignments(&self) -> Vec<LabelAssignment> {
        let mut out: Vec<LabelAssignment> = self
            .assignments
            .iter()
            .map(|((asset, label), stored)| LabelAssignment {
                asset: *asset,
                label: label.clone(),
                region: stored.region,
                confidence: stored.confidence,
            })
            .collect();
        out.sort_by(|a, b| (a.asset, &a.label).cmp(&(b.asset, &b.label)));
        out
    }
}
