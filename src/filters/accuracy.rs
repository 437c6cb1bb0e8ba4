use crate::types::Fix;

pub const DEFAULT_ACCURACY_THRESHOLD_M: f64 = 15.0;

/// Binary gate on reported accuracy.
///
/// A fix passes when it carries no accuracy at all or its radius is strictly
/// below `threshold_m`. Rejected fixes are dropped entirely, never
/// down-weighted.
pub fn passes(fix: &Fix, threshold_m: f64) -> bool {
    match fix.accuracy {
        Some(accuracy) => accuracy < threshold_m,
        None => true,
    }
}

pub fn filter_by_accuracy(fixes: &[Fix], threshold_m: f64) -> Vec<Fix> {
    let kept: Vec<Fix> = fixes
        .iter()
        .filter(|fix| passes(fix, threshold_m))
        .cloned()
        .collect();

    if kept.len() < fixes.len() {
        log::debug!(
            "Accuracy gate dropped {} of {} fixes (threshold {} m)",
            fixes.len() - kept.len(),
            fixes.len(),
            threshold_m
        );
    }
    kept
}
