//! Same-image best-match resolution.
//!
//! A person cannot appear twice in one photo, so when several faces of one
//! image are classified as the same person only the most confident one keeps
//! the label. The others become `Unknown` with their original confidence.

use crate::types::ClassificationResult;
use std::collections::HashMap;

/// Whether a result takes part in champion selection.
pub fn is_candidate(result: &ClassificationResult, threshold: f32) -> bool {
    !result.is_unknown() && result.confidence >= threshold
}

/// Resolve duplicate person labels within one image's results.
///
/// Output has the same length and order as `results`. For every label the
/// candidate with the strictly greatest confidence is kept; exact ties go to
/// the earliest index. Every other position is demoted to `Unknown`.
pub fn resolve(results: &[ClassificationResult], threshold: f32) -> Vec<ClassificationResult> {
    // label -> (confidence, index) of the current champion
    let mut champions: HashMap<&str, (f32, usize)> = HashMap::new();

    for (idx, result) in results.iter().enumerate() {
        if !is_candidate(result, threshold) {
            continue;
        }
        champions
            .entry(result.label.as_str())
            .and_modify(|best| {
                if result.confidence > best.0 {
                    *best = (result.confidence, idx);
                }
            })
            .or_insert((result.confidence, idx));
    }

    let output: Vec<ClassificationResult> = results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            let is_champion = champions
                .get(result.label.as_str())
                .is_some_and(|&(_, champion_idx)| champion_idx == idx);
            if is_champion {
                result.clone()
            } else {
                ClassificationResult::unknown(result.confidence)
            }
        })
        .collect();

    let demoted = results
        .iter()
        .zip(output.iter())
        .filter(|(before, after)| !before.is_unknown() && after.is_unknown())
        .count();
    if demoted > 0 {
        tracing::debug!(faces = results.len(), demoted, "resolved duplicate person labels");
    }

    output
}
