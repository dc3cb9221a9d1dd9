//! Trimmed mean and population standard deviation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Kind;

/// Symmetric outlier removal applied before summarizing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierTrim {
    /// Use every sample.
    #[default]
    Disabled,
    /// Drop `floor(N * (1 - f) / 2)` sorted samples from each end, `0 <= f < 1`.
    Fraction(f64),
}

impl OutlierTrim {
    /// `None` and `Some(0.0)` disable trimming; a configured `0` means "off".
    pub fn from_option(fraction: Option<f64>) -> Self {
        match fraction {
            None => OutlierTrim::Disabled,
            Some(f) if f == 0.0 => OutlierTrim::Disabled,
            Some(f) => OutlierTrim::Fraction(f),
        }
    }

    /// The configured fraction, if any.
    pub fn fraction(self) -> Option<f64> {
        match self {
            OutlierTrim::Disabled => None,
            OutlierTrim::Fraction(f) => Some(f),
        }
    }

    /// Reject fractions outside `[0, 1)`.
    pub fn validate(self) -> Result<()> {
        if let OutlierTrim::Fraction(f) = self
            && !(0.0..1.0).contains(&f)
        {
            return Err(Error::Configuration(format!(
                "outlier fraction must be in [0, 1), got {f}"
            )));
        }
        Ok(())
    }

    /// Samples dropped from each end of a sorted set of `n`.
    pub fn trim_per_side(self, n: usize) -> usize {
        match self {
            OutlierTrim::Disabled => 0,
            OutlierTrim::Fraction(f) => (n as f64 * (1.0 - f) / 2.0).floor() as usize,
        }
    }
}

/// Summary of one sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Mean of the retained samples.
    pub mean: f64,
    /// Population standard deviation of the retained samples.
    pub std_dev: f64,
    /// Samples before trimming.
    pub n_total: usize,
    /// Samples after trimming.
    pub n_used: usize,
}

/// Summary of one histogram's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSummary {
    /// Histogram name.
    pub name: String,
    /// Variable the histogram belongs to.
    pub variable: String,
    /// Quantity kind.
    pub kind: Kind,
    /// Statistics of the retained samples.
    pub summary: Summary,
}

/// Statistics of one dataset, one entry per 1D histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    /// Entries in histogram output order.
    pub entries: Vec<NamedSummary>,
}

impl DatasetStats {
    /// Summary for histogram `name`.
    pub fn get(&self, name: &str) -> Option<&Summary> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.summary)
    }
}

/// Sort, trim and summarize `samples`.
///
/// `name` identifies the sample set in error messages. Samples must be
/// finite; the aggregator never retains anything else.
pub fn summarize(name: &str, mut samples: Vec<f64>, trim: OutlierTrim) -> Result<Summary> {
    trim.validate()?;

    let n_total = samples.len();
    if n_total == 0 {
        return Err(Error::EmptySampleSet { sample: name.to_string() });
    }

    samples.sort_unstable_by(f64::total_cmp);

    let cut = trim.trim_per_side(n_total);
    if 2 * cut >= n_total {
        return Err(Error::Configuration(format!(
            "outlier fraction {} removes all {n_total} samples of '{name}'",
            trim.fraction().unwrap_or_default()
        )));
    }
    let kept = &samples[cut..n_total - cut];

    let n = kept.len() as f64;
    let mean = kept.iter().sum::<f64>() / n;
    let var = kept.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;

    Ok(Summary { mean, std_dev: var.sqrt(), n_total, n_used: kept.len() })
}
