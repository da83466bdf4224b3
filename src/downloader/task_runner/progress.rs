//! Folding fetch samples into task progress.

use crate::extractor::ProgressSample;
use crate::types::Progress;

/// Percentage of `total` covered by `done`, clamped to 0..=100
pub(crate) fn percentage(done: u64, total: Option<u64>) -> Option<f64> {
    total
        .filter(|t| *t > 0)
        .map(|t| (done as f64 / t as f64 * 100.0).clamp(0.0, 100.0))
}

/// Apply one sample; `bytes_done` and `percentage` never move backwards
pub(crate) fn apply_sample(progress: &mut Progress, sample: &ProgressSample) {
    progress.bytes_done = progress.bytes_done.max(sample.bytes_done);
    if sample.bytes_total.is_some() {
        progress.bytes_total = sample.bytes_total;
    }
    progress.rate = sample.rate;
    progress.eta = sample.eta;

    if let Some(pct) = percentage(progress.bytes_done, progress.bytes_total) {
        progress.percentage = progress.percentage.max(pct).min(100.0);
    }
}

/// Progress of a successfully finished fetch
pub(crate) fn complete(progress: &mut Progress) {
    if progress.bytes_total.is_none() && progress.bytes_done > 0 {
        progress.bytes_total = Some(progress.bytes_done);
    }
    progress.percentage = 100.0;
    progress.rate = None;
    progress.eta = Some(0);
}
