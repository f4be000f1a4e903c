//! Multi-model consensus over ranked differential diagnoses.
//!
//! Each model contributes one ranked list. Entries are clustered through a
//! [`DiagnosisMatcher`], scored by reciprocal rank and graded by how much
//! the contributing ranks agree. Output is fully ordered so identical input
//! always serializes identically.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::ConsensusConfig;
use crate::models::{
    ConsensusDiagnosis, ConsensusLevel, ConsensusMetrics, DifferentialDiagnosis, ModelDetail,
    ModelDifferential, ProposedDiagnosis,
};

use super::helpers::{extend_unique, format_icd10};
use super::matching::{DiagnosisKey, DiagnosisMatcher};
use super::types::{ConsensusOutcome, MalformedEntry, ReasoningError};

struct Contribution<'a> {
    model: &'a str,
    rank: u32,
    entry: &'a ProposedDiagnosis,
}

struct Cluster<'a> {
    key: DiagnosisKey,
    contributions: Vec<Contribution<'a>>,
}

impl Cluster<'_> {
    fn has_model(&self, model: &str) -> bool {
        self.contributions.iter().any(|c| c.model == model)
    }

    fn score(&self) -> f64 {
        self.contributions.iter().map(|c| 1.0 / c.rank as f64).sum()
    }

    fn max_confidence(&self) -> f64 {
        self.contributions
            .iter()
            .filter_map(|c| c.entry.confidence)
            .fold(0.0, f64::max)
    }

    fn is_top_pick_of_some(&self) -> bool {
        self.contributions.iter().any(|c| c.rank == 1)
    }

    fn level(&self) -> ConsensusLevel {
        if self.contributions.len() == 1 {
            return ConsensusLevel::Single;
        }
        let min = self.contributions.iter().map(|c| c.rank).min().unwrap_or(1);
        let max = self.contributions.iter().map(|c| c.rank).max().unwrap_or(1);
        match max - min {
            0 => ConsensusLevel::Strong,
            1 => ConsensusLevel::Moderate,
            // Spread > 1 means not every contributor ranked it first.
            _ if self.is_top_pick_of_some() => ConsensusLevel::Divergent,
            _ => ConsensusLevel::Weak,
        }
    }

    /// Contributions ordered best rank first, model name breaking ties.
    fn ordered(&self) -> Vec<&Contribution<'_>> {
        let mut ordered: Vec<&Contribution<'_>> = self.contributions.iter().collect();
        ordered.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.model.cmp(b.model)));
        ordered
    }

    fn display_name(&self) -> String {
        self.ordered()
            .first()
            .map(|c| c.entry.name.trim().to_string())
            .unwrap_or_default()
    }

    fn to_consensus(&self) -> ConsensusDiagnosis {
        let ordered = self.ordered();

        let confidences: Vec<f64> = ordered.iter().filter_map(|c| c.entry.confidence).collect();
        let confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let mut supporting_evidence = Vec::new();
        let mut contradicting_evidence = Vec::new();
        let mut suggested_tests = Vec::new();
        let mut model_details = BTreeMap::new();
        for c in &ordered {
            extend_unique(&mut supporting_evidence, &c.entry.supporting_evidence);
            extend_unique(&mut contradicting_evidence, &c.entry.contradicting_evidence);
            extend_unique(&mut suggested_tests, &c.entry.suggested_tests);
            model_details.insert(
                c.model.to_string(),
                ModelDetail {
                    rank: c.rank,
                    confidence: c.entry.confidence,
                    reasoning: c.entry.reasoning.clone(),
                },
            );
        }

        ConsensusDiagnosis {
            diagnosis: DifferentialDiagnosis {
                name: self.display_name(),
                icd10: self.key.icd10.as_deref().map(format_icd10),
                confidence,
                supporting_evidence,
                contradicting_evidence,
                suggested_tests,
            },
            aggregate_score: self.score(),
            consensus_level: self.level(),
            model_details,
        }
    }
}

fn compare_clusters(a: &Cluster<'_>, b: &Cluster<'_>) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| b.max_confidence().total_cmp(&a.max_confidence()))
        .then_with(|| a.key.name.cmp(&b.key.name))
        .then_with(|| a.key.icd10.cmp(&b.key.icd10))
}

fn validate_entry(entry: &ProposedDiagnosis) -> Result<(), String> {
    if entry.name.trim().is_empty() {
        return Err("blank diagnosis name".into());
    }
    if entry.rank == Some(0) {
        return Err("rank must be 1 or greater".into());
    }
    if let Some(confidence) = entry.confidence {
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(format!("confidence {} outside 0-100", confidence));
        }
    }
    Ok(())
}

/// Index of the cluster holding the model's best-ranked entry.
fn top_pick(clusters: &[Cluster<'_>], model: &str) -> Option<usize> {
    clusters
        .iter()
        .enumerate()
        .filter_map(|(i, cluster)| {
            cluster
                .contributions
                .iter()
                .find(|c| c.model == model)
                .map(|c| (c.rank, i))
        })
        .min()
        .map(|(_, i)| i)
}

/// Drop the items that overflow `max`: singles first, lowest first, then the
/// remaining tail.
fn apply_cap(diagnoses: Vec<ConsensusDiagnosis>, max: usize) -> Vec<ConsensusDiagnosis> {
    let mut excess = diagnoses.len().saturating_sub(max);
    if excess == 0 {
        return diagnoses;
    }

    let mut keep = vec![true; diagnoses.len()];
    for (i, dx) in diagnoses.iter().enumerate().rev() {
        if excess == 0 {
            break;
        }
        if dx.consensus_level == ConsensusLevel::Single {
            keep[i] = false;
            excess -= 1;
        }
    }
    for i in (0..diagnoses.len()).rev() {
        if excess == 0 {
            break;
        }
        if keep[i] {
            keep[i] = false;
            excess -= 1;
        }
    }

    diagnoses
        .into_iter()
        .zip(keep)
        .filter_map(|(dx, kept)| kept.then_some(dx))
        .collect()
}

/// Merge ranked differentials from several models into one consensus list.
///
/// Fails only when there is nothing to aggregate. Malformed entries are
/// dropped, logged and reported in the outcome.
pub fn aggregate(
    outputs: &[ModelDifferential],
    matcher: &dyn DiagnosisMatcher,
    config: &ConsensusConfig,
) -> Result<ConsensusOutcome, ReasoningError> {
    if outputs.is_empty() {
        return Err(ReasoningError::NoModelOutput);
    }

    let mut malformed = Vec::new();
    let mut accepted: Vec<&ModelDifferential> = Vec::new();
    let mut seen_models = HashSet::new();

    for output in outputs {
        let name = output.model.trim();
        let reason = if name.is_empty() {
            Some("blank model name")
        } else if !seen_models.insert(name) {
            Some("duplicate model list")
        } else {
            None
        };
        match reason {
            Some(reason) => malformed.push(MalformedEntry {
                model: output.model.clone(),
                position: 0,
                reason: reason.to_string(),
            }),
            None => accepted.push(output),
        }
    }

    if accepted.is_empty() {
        for entry in &malformed {
            tracing::warn!(model = %entry.model, reason = %entry.reason, "Model output rejected");
        }
        return Err(ReasoningError::NoModelOutput);
    }

    let mut clusters: Vec<Cluster<'_>> = Vec::new();

    for &output in &accepted {
        let model = output.model.trim();
        // Implicit ranks number the surviving entries; explicit ranks are unique.
        let mut used_ranks = HashSet::new();
        let mut survivors: u32 = 0;

        for (idx, entry) in output.diagnoses.iter().enumerate() {
            let position = idx + 1;
            let mut reject = |reason: String| {
                malformed.push(MalformedEntry {
                    model: model.to_string(),
                    position,
                    reason,
                })
            };

            if let Err(reason) = validate_entry(entry) {
                reject(reason);
                continue;
            }

            let rank = match entry.rank {
                Some(rank) => rank,
                None => {
                    let mut rank = survivors + 1;
                    while used_ranks.contains(&rank) {
                        rank += 1;
                    }
                    rank
                }
            };
            if used_ranks.contains(&rank) {
                reject(format!("rank {} already used by this model", rank));
                continue;
            }

            let key = DiagnosisKey::new(&entry.name, entry.icd10.as_deref());
            match clusters
                .iter_mut()
                .find(|c| matcher.same_diagnosis(&c.key, &key))
            {
                Some(cluster) if cluster.has_model(model) => {
                    let reason = format!("duplicate of an earlier entry for '{}'", cluster.key.name);
                    reject(reason);
                    continue;
                }
                Some(cluster) => {
                    if cluster.key.icd10.is_none() {
                        cluster.key.icd10 = key.icd10;
                    }
                    cluster.contributions.push(Contribution { model, rank, entry });
                }
                None => clusters.push(Cluster {
                    key,
                    contributions: vec![Contribution { model, rank, entry }],
                }),
            }
            used_ranks.insert(rank);
            survivors += 1;
        }
    }

    for entry in &malformed {
        tracing::warn!(
            model = %entry.model,
            position = entry.position,
            reason = %entry.reason,
            "Malformed model entry dropped"
        );
    }

    clusters.sort_by(compare_clusters);

    // Each model's best-ranked cluster. Divergence needs at least two models
    // whose top picks land in different clusters.
    let top_picks: BTreeSet<usize> = accepted
        .iter()
        .filter_map(|o| top_pick(&clusters, o.model.trim()))
        .collect();
    let divergent_diagnoses = if top_picks.len() >= 2 {
        Some(
            top_picks
                .iter()
                .map(|&i| clusters[i].display_name())
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let diagnoses = apply_cap(
        clusters.iter().map(Cluster::to_consensus).collect(),
        config.max_diagnoses,
    );

    let total = diagnoses.len();
    let strong = diagnoses
        .iter()
        .filter(|d| d.consensus_level == ConsensusLevel::Strong)
        .count();
    let moderate = diagnoses
        .iter()
        .filter(|d| d.consensus_level == ConsensusLevel::Moderate)
        .count();

    let timings: BTreeMap<String, u64> = accepted
        .iter()
        .filter_map(|o| o.processing_time_ms.map(|t| (o.model.trim().to_string(), t)))
        .collect();
    let total_processing_time_ms = timings.values().copied().max().unwrap_or(0);

    let metrics = ConsensusMetrics {
        models_used: accepted.iter().map(|o| o.model.trim().to_string()).collect(),
        strong_consensus_rate: if total == 0 {
            0.0
        } else {
            100.0 * strong as f64 / total as f64
        },
        moderate_consensus_count: moderate,
        divergent_count: divergent_diagnoses.as_ref().map_or(0, Vec::len),
        divergent_diagnoses,
        total_processing_time_ms,
        model_timings: (!timings.is_empty()).then_some(timings),
        malformed_entries_dropped: malformed.len(),
    };

    tracing::info!(
        matcher = matcher.name(),
        models = metrics.models_used.len(),
        diagnoses = total,
        strong,
        divergent = metrics.divergent_count,
        malformed = metrics.malformed_entries_dropped,
        "Consensus aggregated"
    );

    Ok(ConsensusOutcome {
        diagnoses,
        metrics,
        malformed,
    })
}
