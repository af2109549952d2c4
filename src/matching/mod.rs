//! Multi-field fuzzy matching.
//!
//! The [`Matcher`] scores a standardized query against candidate records,
//! ranks the survivors and owns the [`BlockingIndex`] used to find
//! candidates cheaply.

mod blocking;
mod similarity;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MatchingConfig;
use crate::entity::{Entity, EntityId};
use crate::standardize::{FieldKind, NormalizedRecord, Standardizer};
use crate::value::ValueMap;

pub use blocking::{apply_blocking, blocking_key, shares_block, BlockingIndex, IndexKeys};
pub use similarity::{
    address_similarity, email_similarity, identifier_similarity, levenshtein_similarity,
    name_similarity, phone_similarity, token_jaccard,
};

/// Weight of the name similarity.
pub const NAME_WEIGHT: f64 = 0.4;
/// Weight of the address similarity.
pub const ADDRESS_WEIGHT: f64 = 0.25;
/// Weight of the phone similarity.
pub const PHONE_WEIGHT: f64 = 0.15;
/// Weight of the email similarity.
pub const EMAIL_WEIGHT: f64 = 0.1;
/// Applied once per identifier key present on both sides.
pub const IDENTIFIER_WEIGHT: f64 = 0.1;

/// Non-contact identifiers reduced to their exact-match text.
fn identifier_texts(identifiers: &ValueMap) -> BTreeMap<String, String> {
    identifiers
        .iter()
        .filter(|(key, _)| !FieldKind::classify(key).is_contact())
        .filter_map(|(key, value)| Some((key.clone(), value.as_identifier_text()?)))
        .collect()
}

/// The standardized query side of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchInput {
    /// Standardized query fields.
    pub record: NormalizedRecord,
    /// Non-contact identifiers as exact-match text.
    pub identifiers: BTreeMap<String, String>,
}

impl MatchInput {
    /// Builds the query side from a record and its standardized identifiers.
    #[must_use]
    pub fn new(record: NormalizedRecord, identifiers: &ValueMap) -> Self {
        Self {
            record,
            identifiers: identifier_texts(identifiers),
        }
    }
}

/// A stored entity prepared for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Stored entity ID.
    pub id: EntityId,
    /// Standardized stored fields.
    pub record: NormalizedRecord,
    /// Non-contact identifiers as exact-match text.
    pub identifiers: BTreeMap<String, String>,
}

impl CandidateRecord {
    /// Standardizes a stored entity for scoring.
    #[must_use]
    pub fn from_entity(entity: &Entity, standardizer: &Standardizer) -> Self {
        Self {
            id: entity.id,
            record: standardizer.record(&entity.name, &entity.identifiers, &entity.attributes),
            identifiers: identifier_texts(&entity.identifiers),
        }
    }
}

/// How a candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Exact identifier hit in the store.
    Identifier,
    /// Blocking index or fuzzy name search.
    Fuzzy,
}

/// Per-field similarity; `None` when the field was not present on both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldScores {
    /// Name similarity.
    pub name: Option<f64>,
    /// Address similarity.
    pub address: Option<f64>,
    /// Phone similarity.
    pub phone: Option<f64>,
    /// Email similarity.
    pub email: Option<f64>,
}

/// One line of audit evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    /// Standardized query value.
    pub query: String,
    /// Standardized candidate value.
    pub candidate: String,
    /// Field similarity in `[0, 1]`.
    pub similarity: f64,
}

/// A scored candidate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Candidate entity.
    pub entity_id: EntityId,
    /// Per-field similarity.
    pub scores: FieldScores,
    /// Score per identifier key present on both sides.
    pub identifier_matches: BTreeMap<String, f64>,
    /// Weighted score in `[0, 1]`.
    pub overall_score: f64,
    /// Search path that found the candidate.
    pub matched_by: MatchSource,
    /// Fields that reached their configured threshold.
    pub matched_fields: Vec<String>,
    /// Fields present on both sides that did not.
    pub conflict_fields: Vec<String>,
    /// Set by the resolver when the score clears the auto-merge threshold.
    pub recommend_merge: bool,
    /// Compared values behind each field score.
    pub evidence: BTreeMap<String, FieldComparison>,
}

impl MatchCandidate {
    /// A candidate known only through an exact identifier hit.
    #[must_use]
    pub fn exact_identifier(entity_id: EntityId, key: &str) -> Self {
        Self {
            entity_id,
            scores: FieldScores::default(),
            identifier_matches: BTreeMap::from([(key.to_string(), 1.0)]),
            overall_score: 1.0,
            matched_by: MatchSource::Identifier,
            matched_fields: vec![key.to_string()],
            conflict_fields: Vec::new(),
            recommend_merge: false,
            evidence: BTreeMap::new(),
        }
    }

    /// Promotes a fuzzy-scored candidate to an exact identifier match.
    #[must_use]
    pub fn into_identifier_match(mut self, key: &str) -> Self {
        self.overall_score = 1.0;
        self.matched_by = MatchSource::Identifier;
        self.identifier_matches.insert(key.to_string(), 1.0);
        self.conflict_fields.retain(|f| f != key);
        if !self.matched_fields.iter().any(|f| f == key) {
            self.matched_fields.push(key.to_string());
        }
        self
    }
}

/// Sorts by descending score, ties by entity ID, and truncates.
pub fn rank(candidates: &mut Vec<MatchCandidate>, max_candidates: usize) {
    candidates.sort_by(|a, b| {
        b.overall_score
            .total_cmp(&a.overall_score)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    candidates.truncate(max_candidates);
}

/// Scores, ranks and indexes candidate entities.
///
/// Pair scoring is pure; the blocking index is the only shared mutable
/// state and is internally synchronized, so a `Matcher` can be shared
/// across threads behind an `Arc`.
#[derive(Debug)]
pub struct Matcher {
    config: MatchingConfig,
    standardizer: Standardizer,
    index: BlockingIndex,
}

impl Matcher {
    /// Creates a matcher with an empty blocking index.
    #[must_use]
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            standardizer: Standardizer::new(),
            index: BlockingIndex::new(),
        }
    }

    /// Matching settings.
    #[must_use]
    pub const fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// The standardizer used for both sides of a comparison.
    #[must_use]
    pub const fn standardizer(&self) -> &Standardizer {
        &self.standardizer
    }

    /// The shared blocking index.
    #[must_use]
    pub const fn index(&self) -> &BlockingIndex {
        &self.index
    }

    /// Blocking key for a standardized record.
    #[must_use]
    pub fn blocking_key(&self, record: &NormalizedRecord) -> String {
        blocking_key(&record.name.standardized, self.config.blocking_key_size)
    }

    /// Keys a record is indexed and looked up under.
    #[must_use]
    pub fn index_keys(&self, record: &NormalizedRecord) -> IndexKeys {
        IndexKeys {
            name_key: self.blocking_key(record),
            phone: record.phone.standardized.clone(),
            email: record.email.clone(),
        }
    }

    /// Adds or refreshes an entity in the blocking index.
    pub fn index_entity(&self, id: EntityId, record: &NormalizedRecord) {
        self.index.upsert(id, self.index_keys(record));
    }

    /// IDs the blocking index associates with `record`.
    #[must_use]
    pub fn candidates_by_index(&self, record: &NormalizedRecord) -> BTreeSet<EntityId> {
        self.index.lookup(&self.index_keys(record))
    }

    /// Scores one pair without threshold filtering.
    ///
    /// Returns `None` for a malformed candidate: a nil ID, or nothing
    /// comparable with the query.
    #[must_use]
    pub fn score(&self, input: &MatchInput, candidate: &CandidateRecord) -> Option<MatchCandidate> {
        if candidate.id.is_nil() {
            warn!("skipping candidate with nil entity id");
            return None;
        }

        let q = &input.record;
        let c = &candidate.record;
        let cfg = &self.config;

        let scores = FieldScores {
            name: name_similarity(&q.name, &c.name, cfg),
            address: address_similarity(&q.address, &c.address),
            phone: phone_similarity(&q.phone, &c.phone),
            email: email_similarity(&q.email, &c.email),
        };

        let identifier_matches: BTreeMap<String, f64> = input
            .identifiers
            .iter()
            .filter_map(|(key, value)| {
                let other = candidate.identifiers.get(key)?;
                Some((key.clone(), identifier_similarity(value, other)?))
            })
            .collect();

        let mut comparable = false;
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (score, weight) in [
            (scores.name, NAME_WEIGHT),
            (scores.address, ADDRESS_WEIGHT),
            (scores.phone, PHONE_WEIGHT),
            (scores.email, EMAIL_WEIGHT),
        ]
        .into_iter()
        .chain(identifier_matches.values().map(|&s| (Some(s), IDENTIFIER_WEIGHT)))
        {
            let Some(score) = score else { continue };
            comparable = true;
            // Zero-scored fields do not count against the others.
            if score > 0.0 {
                weighted += score * weight;
                total_weight += weight;
            }
        }

        if !comparable {
            warn!(entity_id = %candidate.id, "skipping candidate with no comparable fields");
            return None;
        }
        let overall_score = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut matched_fields = Vec::new();
        let mut conflict_fields = Vec::new();
        for (field, score, threshold) in [
            ("name", scores.name, cfg.name_similarity_threshold),
            ("address", scores.address, cfg.address_similarity_threshold),
            ("phone", scores.phone, cfg.phone_similarity_threshold),
            ("email", scores.email, cfg.email_similarity_threshold),
        ] {
            match score {
                Some(s) if s >= threshold => matched_fields.push(field.to_string()),
                Some(_) => conflict_fields.push(field.to_string()),
                None => {}
            }
        }
        for (key, &score) in &identifier_matches {
            if score >= 1.0 {
                matched_fields.push(key.clone());
            } else {
                conflict_fields.push(key.clone());
            }
        }

        let mut evidence = BTreeMap::new();
        for (field, score, query, cand) in [
            ("name", scores.name, &q.name.standardized, &c.name.standardized),
            ("address", scores.address, &q.address.standardized, &c.address.standardized),
            ("phone", scores.phone, &q.phone.standardized, &c.phone.standardized),
            ("email", scores.email, &q.email, &c.email),
        ] {
            if let Some(similarity) = score {
                evidence.insert(
                    field.to_string(),
                    FieldComparison {
                        query: query.clone(),
                        candidate: cand.clone(),
                        similarity,
                    },
                );
            }
        }

        Some(MatchCandidate {
            entity_id: candidate.id,
            scores,
            identifier_matches,
            overall_score,
            matched_by: MatchSource::Fuzzy,
            matched_fields,
            conflict_fields,
            recommend_merge: false,
            evidence,
        })
    }

    /// Blocks, scores, filters by the overall threshold and ranks a pool.
    #[must_use]
    pub fn find_matches(&self, input: &MatchInput, pool: Vec<CandidateRecord>) -> Vec<MatchCandidate> {
        let pool_size = pool.len();
        let pool = if self.config.blocking_enabled {
            let query_key = self.blocking_key(&input.record);
            let size = self.config.blocking_key_size;
            apply_blocking(&query_key, pool, |c| blocking_key(&c.record.name.standardized, size))
        } else {
            pool
        };

        let mut candidates: Vec<MatchCandidate> = pool
            .iter()
            .filter_map(|candidate| self.score(input, candidate))
            .filter(|m| m.overall_score >= self.config.overall_similarity_threshold)
            .collect();

        rank(&mut candidates, self.config.max_candidates);
        debug!(
            pool = pool_size,
            scored = pool.len(),
            matched = candidates.len(),
            "candidate pool scored"
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::value::Value;

    fn matcher() -> Matcher {
        Matcher::new(MatchingConfig::default())
    }

    fn input(m: &Matcher, name: &str, ids: &[(&str, &str)]) -> MatchInput {
        let ids: ValueMap = ids
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect();
        MatchInput::new(m.standardizer().record(name, &ids, &ValueMap::new()), &ids)
    }

    fn candidate(m: &Matcher, name: &str, ids: &[(&str, &str)]) -> CandidateRecord {
        let mut entity = Entity::new(name, name.to_lowercase(), EntityType::Person);
        for (k, v) in ids {
            entity = entity.with_identifier(*k, *v);
        }
        CandidateRecord::from_entity(&entity, m.standardizer())
    }

    #[test]
    fn test_identical_records_score_one() {
        let m = matcher();
        let q = input(&m, "Jane Doe", &[("email", "jane@x.com"), ("ssn", "1")]);
        let c = candidate(&m, "Jane Doe", &[("email", "jane@x.com"), ("ssn", "1")]);
        let scored = m.score(&q, &c).unwrap();
        assert!((scored.overall_score - 1.0).abs() < 1e-9);
        assert_eq!(scored.matched_fields, vec!["name", "email", "ssn"]);
        assert!(scored.conflict_fields.is_empty());
        assert_eq!(scored.matched_by, MatchSource::Fuzzy);
    }

    #[test]
    fn test_missing_field_is_neutral() {
        let m = matcher();
        let q = input(&m, "Jane Doe", &[("phone", "555-123-4567")]);

        let without_phone = candidate(&m, "Jane Doe", &[]);
        let with_other_phone = candidate(&m, "Jane Doe", &[("phone", "999-888-7777")]);

        let a = m.score(&q, &without_phone).unwrap();
        let b = m.score(&q, &with_other_phone).unwrap();
        assert!((a.overall_score - 1.0).abs() < 1e-9);
        assert!(a.scores.phone.is_none());
        assert!(b.overall_score < a.overall_score);
        assert_eq!(b.conflict_fields, vec!["phone"]);
    }

    #[test]
    fn test_zero_scored_identifier_leaves_the_weighting() {
        let m = matcher();
        let q = input(&m, "Jane Doe", &[("ssn", "111")]);
        let c = candidate(&m, "Jane Doe", &[("ssn", "222")]);
        let scored = m.score(&q, &c).unwrap();
        // 1.0 * 0.4 / 0.4; the ssn weight only counts when it scores.
        assert!((scored.overall_score - 1.0).abs() < 1e-9);
        assert_eq!(scored.identifier_matches["ssn"], 0.0);
        assert_eq!(scored.conflict_fields, vec!["ssn"]);
    }

    #[test]
    fn test_only_zero_scored_fields_score_zero() {
        let m = matcher();
        let q = input(&m, "", &[("ssn", "111")]);
        let c = candidate(&m, "", &[("ssn", "222")]);

        let scored = m.score(&q, &c).unwrap();
        assert_eq!(scored.overall_score, 0.0);
        assert!(m.find_matches(&q, vec![c]).is_empty());
    }

    #[test]
    fn test_malformed_candidates_skipped() {
        let m = matcher();
        let q = input(&m, "Jane Doe", &[]);

        let mut nil = candidate(&m, "Jane Doe", &[]);
        nil.id = EntityId::nil();
        assert!(m.score(&q, &nil).is_none());

        let nameless = candidate(&m, "", &[]);
        assert!(m.score(&q, &nameless).is_none());

        let good = candidate(&m, "Jane Doe", &[]);
        let found = m.find_matches(&q, vec![nil, nameless, good.clone()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_id, good.id);
    }

    #[test]
    fn test_find_matches_filters_ranks_and_truncates() {
        let m = Matcher::new(MatchingConfig {
            max_candidates: 2,
            blocking_enabled: false,
            ..MatchingConfig::default()
        });
        let q = input(&m, "Jonathan Smith", &[]);
        let pool = vec![
            candidate(&m, "Jonathan Smyth", &[]),
            candidate(&m, "Jonathan Smith", &[]),
            candidate(&m, "Zed Quux", &[]),
            candidate(&m, "Jonathan Smithe", &[]),
        ];
        let found = m.find_matches(&q, pool);
        assert_eq!(found.len(), 2);
        assert!((found[0].overall_score - 1.0).abs() < 1e-9);
        assert!(found[0].overall_score >= found[1].overall_score);
        assert!(found.iter().all(|c| c.overall_score >= 0.75));
    }

    #[test]
    fn test_ties_broken_by_entity_id() {
        let m = matcher();
        let q = input(&m, "Jane Doe", &[]);
        let pool: Vec<_> = (0..5).map(|_| candidate(&m, "Jane Doe", &[])).collect();
        let found = m.find_matches(&q, pool);
        let ids: Vec<_> = found.iter().map(|c| c.entity_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_bounds() {
        let m = matcher();
        let q = input(&m, "Acme Corp", &[("phone", "555 000 1111"), ("email", "a@acme.com")]);
        for name in ["Acme Corporation", "Acne Co", "Zebra", "A"] {
            let c = candidate(&m, name, &[("phone", "555 000 1112"), ("email", "b@acme.org")]);
            if let Some(s) = m.score(&q, &c) {
                assert!((0.0..=1.0).contains(&s.overall_score));
                for v in [s.scores.name, s.scores.address, s.scores.phone, s.scores.email]
                    .into_iter()
                    .flatten()
                {
                    assert!((0.0..=1.0).contains(&v));
                }
            }
        }
    }

    #[test]
    fn test_into_identifier_match() {
        let m = matcher();
        let q = input(&m, "Jane Doe", &[("ssn", "1")]);
        let c = candidate(&m, "Someone Else", &[("ssn", "1")]);
        let promoted = m.score(&q, &c).unwrap().into_identifier_match("ssn");
        assert_eq!(promoted.overall_score, 1.0);
        assert_eq!(promoted.matched_by, MatchSource::Identifier);
        assert!(promoted.conflict_fields.iter().all(|f| f != "ssn"));
    }

    #[test]
    fn test_index_round_trip_through_matcher() {
        let m = matcher();
        let c = candidate(&m, "Jane Doe", &[("email", "jane@x.com")]);
        m.index_entity(c.id, &c.record);

        let q = input(&m, "Jane Dow", &[]);
        assert!(m.candidates_by_index(&q.record).contains(&c.id));

        let by_email = input(&m, "Totally Different", &[("email", "JANE@x.com")]);
        assert!(m.candidates_by_index(&by_email.record).contains(&c.id));
    }
}
