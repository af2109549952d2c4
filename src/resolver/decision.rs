//! Merge-or-create policy.

use crate::entity::EntityId;
use crate::matching::MatchCandidate;

/// Confidence of an entity created with no candidates at all.
pub const NEW_ENTITY_CONFIDENCE: f64 = 1.0;

/// Confidence of an entity created although candidates existed below the
/// auto-merge threshold.
pub const AMBIGUOUS_CONFIDENCE: f64 = 0.5;

/// What to do with one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Write a new entity.
    Create {
        /// 1.0 for a clean create, 0.5 in the ambiguous band.
        confidence: f64,
        /// Candidates existed but none cleared the auto-merge threshold.
        ambiguous: bool,
        /// Best candidate score, when there was a candidate.
        best_score: Option<f64>,
    },
    /// Merge into an existing entity.
    Merge {
        /// Top-ranked candidate.
        target: EntityId,
        /// Score of the top-ranked candidate.
        confidence: f64,
    },
}

impl Decision {
    /// Returns true for a merge.
    #[must_use]
    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merge { .. })
    }

    /// Confidence reported for the resolution.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        match self {
            Self::Create { confidence, .. } | Self::Merge { confidence, .. } => *confidence,
        }
    }
}

/// Decides from candidates already sorted by descending score.
///
/// A best score exactly equal to the threshold merges.
#[must_use]
pub fn decide(candidates: &[MatchCandidate], auto_merge_threshold: f64) -> Decision {
    match candidates.first() {
        None => Decision::Create {
            confidence: NEW_ENTITY_CONFIDENCE,
            ambiguous: false,
            best_score: None,
        },
        Some(best) if best.overall_score >= auto_merge_threshold => Decision::Merge {
            target: best.entity_id,
            confidence: best.overall_score,
        },
        Some(best) => Decision::Create {
            confidence: AMBIGUOUS_CONFIDENCE,
            ambiguous: true,
            best_score: Some(best.overall_score),
        },
    }
}

/// Flags the candidates that clear the auto-merge threshold.
pub fn mark_recommendations(candidates: &mut [MatchCandidate], auto_merge_threshold: f64) {
    for candidate in candidates {
        candidate.recommend_merge = candidate.overall_score >= auto_merge_threshold;
    }
}
