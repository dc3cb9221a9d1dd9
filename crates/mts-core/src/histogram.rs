//! Binned accumulators and the builder that books them from the policy.
//!
//! An [`Accumulator`] is either a 1D or a 2D histogram with uniform bins.
//! Values below the lower edge, at or above the upper edge, are counted as
//! under/overflow and never land in a bin; NaN is rejected outright.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::{Binning, Region, VariablePolicy};

/// Leading word of every 1D y-axis label.
pub const COUNT_LABEL: &str = "Tracks";

/// Uniform axis with a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Number of bins (excluding under/overflow).
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
    /// Axis title.
    pub label: String,
}

impl Axis {
    /// Axis from a binning and a label.
    pub fn new(binning: Binning, label: impl Into<String>) -> Self {
        Self { n_bins: binning.n_bins, min: binning.min, max: binning.max, label: label.into() }
    }

    /// Width of one bin.
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Bin edges (length = `n_bins + 1`).
    pub fn edges(&self) -> Vec<f64> {
        let w = self.bin_width();
        (0..=self.n_bins).map(|i| self.min + w * i as f64).collect()
    }

    /// Center of bin `i`.
    pub fn center(&self, i: usize) -> f64 {
        self.min + self.bin_width() * (i as f64 + 0.5)
    }

    /// Bin index of `x`, `None` outside `[min, max)`.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.min && x < self.max) {
            return None;
        }
        let i = ((x - self.min) * self.n_bins as f64 / (self.max - self.min)) as usize;
        Some(i.min(self.n_bins - 1))
    }
}

/// Outcome of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The value incremented a bin.
    InRange,
    /// Under- or overflow; no bin changed.
    OutOfRange,
    /// NaN input; nothing was recorded.
    NonFinite,
}

impl Fill {
    /// True if a bin was incremented.
    pub fn is_in_range(self) -> bool {
        self == Fill::InRange
    }
}

/// 1D histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    /// Histogram name (output key).
    pub name: String,
    /// Histogram title.
    pub title: String,
    /// X axis.
    pub x: Axis,
    /// Y axis title.
    pub y_label: String,
    /// Bin contents (length = `x.n_bins`).
    pub bin_content: Vec<f64>,
    /// Count of values below `x.min`.
    pub underflow: f64,
    /// Count of values at or above `x.max`.
    pub overflow: f64,
    /// Number of fills, flows included.
    pub entries: u64,
}

impl Hist1D {
    /// Empty histogram over `x`.
    pub fn new(name: impl Into<String>, x: Axis, y_label: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            bin_content: vec![0.0; x.n_bins],
            x,
            y_label: y_label.into(),
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    /// Add one entry at `x`.
    pub fn fill(&mut self, x: f64) -> Fill {
        if x.is_nan() {
            return Fill::NonFinite;
        }
        self.entries += 1;
        match self.x.find_bin(x) {
            Some(b) => {
                self.bin_content[b] += 1.0;
                Fill::InRange
            }
            None => {
                if x < self.x.min {
                    self.underflow += 1.0;
                } else {
                    self.overflow += 1.0;
                }
                Fill::OutOfRange
            }
        }
    }

    /// Largest bin content.
    pub fn maximum(&self) -> f64 {
        self.bin_content.iter().copied().fold(0.0, f64::max)
    }
}

/// 2D histogram; `bin_content[ix * y.n_bins + iy]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    /// Histogram name (output key).
    pub name: String,
    /// Histogram title.
    pub title: String,
    /// X axis.
    pub x: Axis,
    /// Y axis.
    pub y: Axis,
    /// Bin contents, x-major.
    pub bin_content: Vec<f64>,
    /// Count of fills outside the x or y range.
    pub out_of_range: f64,
    /// Number of fills, out-of-range included.
    pub entries: u64,
}

impl Hist2D {
    /// Empty histogram over `x` × `y`.
    pub fn new(name: impl Into<String>, x: Axis, y: Axis) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            bin_content: vec![0.0; x.n_bins * y.n_bins],
            x,
            y,
            out_of_range: 0.0,
            entries: 0,
        }
    }

    /// Add one entry at `(x, y)`.
    pub fn fill(&mut self, x: f64, y: f64) -> Fill {
        if x.is_nan() || y.is_nan() {
            return Fill::NonFinite;
        }
        self.entries += 1;
        match (self.x.find_bin(x), self.y.find_bin(y)) {
            (Some(ix), Some(iy)) => {
                self.bin_content[ix * self.y.n_bins + iy] += 1.0;
                Fill::InRange
            }
            _ => {
                self.out_of_range += 1.0;
                Fill::OutOfRange
            }
        }
    }

    /// Content of bin `(ix, iy)`.
    pub fn content(&self, ix: usize, iy: usize) -> f64 {
        self.bin_content[ix * self.y.n_bins + iy]
    }
}

/// A booked histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Accumulator {
    /// Distribution of one quantity.
    OneD(Hist1D),
    /// Correlation of two quantities.
    TwoD(Hist2D),
}

impl Accumulator {
    /// Output key.
    pub fn name(&self) -> &str {
        match self {
            Accumulator::OneD(h) => &h.name,
            Accumulator::TwoD(h) => &h.name,
        }
    }

    /// Number of fills.
    pub fn entries(&self) -> u64 {
        match self {
            Accumulator::OneD(h) => h.entries,
            Accumulator::TwoD(h) => h.entries,
        }
    }

    /// The 1D histogram, if this is one.
    pub fn as_one_d(&self) -> Option<&Hist1D> {
        match self {
            Accumulator::OneD(h) => Some(h),
            Accumulator::TwoD(_) => None,
        }
    }

    /// The 2D histogram, if this is one.
    pub fn as_two_d(&self) -> Option<&Hist2D> {
        match self {
            Accumulator::TwoD(h) => Some(h),
            Accumulator::OneD(_) => None,
        }
    }
}

/// Unit of an axis label: the text inside the last parenthesis.
///
/// Labels for pseudorapidity (`#eta`) and for normalized quantities
/// (`#delta`) carry no unit.
pub fn axis_unit(label: &str) -> Option<&str> {
    if label.contains("#eta") || label.contains("#delta") {
        return None;
    }
    let open = label.rfind('(')?;
    let rest = &label[open + 1..];
    let close = rest.find(')')?;
    let unit = rest[..close].trim();
    (!unit.is_empty()).then_some(unit)
}

/// Bin width with at most six decimals and no trailing zeros.
pub fn format_bin_width(width: f64) -> String {
    let fixed = format!("{width:.6}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "0" || trimmed == "-0" { format!("{width:e}") } else { trimmed.to_string() }
}

/// Y-axis label of a 1D histogram over `x`.
pub fn count_label(x: &Axis) -> String {
    let width = format_bin_width(x.bin_width());
    match axis_unit(&x.label) {
        Some(unit) => format!("{COUNT_LABEL} / {width} {unit}"),
        None => format!("{COUNT_LABEL} / {width}"),
    }
}

/// Books accumulators for one region from a policy.
#[derive(Debug, Clone, Copy)]
pub struct HistogramBuilder<'a> {
    policy: &'a VariablePolicy,
    region: Region,
}

impl<'a> HistogramBuilder<'a> {
    /// Builder over `policy` in `region`.
    pub fn new(policy: &'a VariablePolicy, region: Region) -> Self {
        Self { policy, region }
    }

    /// Book a 1D accumulator over `x`, or a 2D one named `x_VS_y`.
    pub fn build(&self, x: &str, y: Option<&str>) -> Result<Accumulator> {
        match y {
            None => self.build_1d(x).map(Accumulator::OneD),
            Some(y) => self.build_2d(x, y).map(Accumulator::TwoD),
        }
    }

    /// Book a 1D histogram.
    pub fn build_1d(&self, x: &str) -> Result<Hist1D> {
        let axis = self.axis(x)?;
        let y_label = count_label(&axis);
        Ok(Hist1D::new(x, axis, y_label))
    }

    /// Book a 2D histogram.
    pub fn build_2d(&self, x: &str, y: &str) -> Result<Hist2D> {
        Ok(Hist2D::new(format!("{x}_VS_{y}"), self.axis(x)?, self.axis(y)?))
    }

    fn axis(&self, name: &str) -> Result<Axis> {
        let spec = self.policy.lookup(name)?;
        Ok(Axis::new(spec.effective_binning(self.region), spec.label))
    }
}
