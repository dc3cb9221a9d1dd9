//! 1D distribution overlays with legend statistics.

use mts_core::{DatasetArtifact, Error, Hist1D, Result, axis_unit};
use serde::{Deserialize, Serialize};

use crate::comparison::SeriesMeta;

/// Legend statistics of one dataset's histogram.
///
/// `mean` and `rms` are the persisted `mean_<h>` / `stdDev_<h>` scalars;
/// their errors are `rms / sqrt(entries)` and `rms / sqrt(2 * entries)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegendStats {
    /// Mean of the retained samples.
    pub mean: f64,
    /// `None` for an empty histogram.
    pub mean_err: Option<f64>,
    /// Standard deviation of the retained samples.
    pub rms: f64,
    /// `None` for an empty histogram.
    pub rms_err: Option<f64>,
}

impl LegendStats {
    /// Statistics from a persisted summary and the histogram entry count.
    pub fn new(mean: f64, std_dev: f64, entries: u64) -> Self {
        let n = entries as f64;
        let (mean_err, rms_err) = if entries > 0 {
            (Some(std_dev / n.sqrt()), Some(std_dev / (2.0 * n).sqrt()))
        } else {
            (None, None)
        };
        Self { mean, mean_err, rms: std_dev, rms_err }
    }
}

/// One dataset's histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSeries {
    /// Legend title, color and marker.
    #[serde(flatten)]
    pub meta: SeriesMeta,
    /// Content of the in-range bins, without under/overflow.
    pub bin_content: Vec<f64>,
    /// Fills of the histogram, flows included.
    pub entries: u64,
    /// Statistics printed in the legend.
    #[serde(flatten)]
    pub stats: LegendStats,
}

/// Overlay of one 1D histogram across datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionOverlay {
    /// Histogram key `<h>`.
    pub name: String,
    /// Axis title of the histogram.
    pub x_label: String,
    /// `Tracks / <width> <unit>`.
    pub y_label: String,
    /// Unit of the legend statistics, taken from the x label.
    pub unit: Option<String>,
    /// `n_bins + 1` edges shared by every series.
    pub bin_edges: Vec<f64>,
    /// One entry per dataset, in legend order.
    pub series: Vec<DistributionSeries>,
    /// Frame maximum: largest bin content times `1 + 0.25 * n_series`.
    pub y_max: f64,
}

impl DistributionOverlay {
    /// Overlay histogram `hists[i]` of `artifacts[i]` for every dataset.
    pub(crate) fn new(
        artifacts: &[&DatasetArtifact],
        hists: &[&Hist1D],
        series: &[SeriesMeta],
    ) -> Result<Self> {
        let first = hists[0];
        let mut out = Vec::with_capacity(hists.len());
        let mut max = 0.0_f64;

        for ((artifact, h), meta) in artifacts.iter().zip(hists).zip(series) {
            if h.x.n_bins != first.x.n_bins {
                return Err(Error::Validation(format!(
                    "'{}' has {} bins in dataset '{}', {} in '{}'",
                    first.name,
                    h.x.n_bins,
                    artifact.meta.dataset,
                    first.x.n_bins,
                    artifacts[0].meta.dataset
                )));
            }
            let (mean, std_dev) = artifact.summary(&first.name).ok_or_else(|| {
                Error::Validation(format!(
                    "dataset '{}' has no mean/stdDev for '{}'",
                    artifact.meta.dataset, first.name
                ))
            })?;
            max = max.max(h.maximum());
            out.push(DistributionSeries {
                meta: meta.clone(),
                bin_content: h.bin_content.clone(),
                entries: h.entries,
                stats: LegendStats::new(mean, std_dev, h.entries),
            });
        }

        Ok(Self {
            name: first.name.clone(),
            x_label: first.x.label.clone(),
            y_label: first.y_label.clone(),
            unit: axis_unit(&first.x.label).map(str::to_string),
            bin_edges: first.x.edges(),
            y_max: max * (1.0 + 0.25 * hists.len() as f64),
            series: out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn legend_errors() {
        let s = LegendStats::new(0.5, 2.0, 100);
        assert_relative_eq!(s.mean_err.unwrap(), 0.2);
        assert_relative_eq!(s.rms_err.unwrap(), 2.0 / 200.0_f64.sqrt(), max_relative = 1e-12);
        assert_eq!(s.rms, 2.0);

        let empty = LegendStats::new(0.0, 0.0, 0);
        assert_eq!(empty.mean_err, None);
        assert_eq!(empty.rms_err, None);
    }
}
