//! Split-track records and the quantities derived from them.

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use crate::policy::Variable;

/// The three per-variable quantities that are histogrammed and summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Value of the un-split track.
    Original,
    /// Scaled difference between the two halves.
    Delta,
    /// Delta over its combined uncertainty.
    Pull,
}

impl Kind {
    /// All kinds in output order.
    pub const ALL: [Kind; 3] = [Kind::Original, Kind::Delta, Kind::Pull];

    /// Histogram name for `variable` (`pt`, `Delta_pt`, `Delta_pt_pull`).
    pub fn hist_name(self, variable: &str) -> String {
        match self {
            Kind::Original => variable.to_string(),
            Kind::Delta => format!("Delta_{variable}"),
            Kind::Pull => format!("Delta_{variable}_pull"),
        }
    }
}

/// Column names of one variable in a splitter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitColumns {
    /// First half value.
    pub value1: String,
    /// First half uncertainty.
    pub err1: String,
    /// Second half value.
    pub value2: String,
    /// Second half uncertainty.
    pub err2: String,
    /// Un-split value.
    pub original: String,
    /// Precomputed difference between the halves.
    pub delta: String,
}

impl SplitColumns {
    /// Columns for `variable`.
    pub fn for_variable(variable: &str) -> Self {
        Self {
            value1: format!("{variable}1_spl"),
            err1: format!("{variable}1Err_spl"),
            value2: format!("{variable}2_spl"),
            err2: format!("{variable}2Err_spl"),
            original: format!("{variable}_org"),
            delta: format!("Delta_{variable}"),
        }
    }

    /// Names in field order.
    pub fn names(&self) -> [&str; 6] {
        [&self.value1, &self.err1, &self.value2, &self.err2, &self.original, &self.delta]
    }
}

/// One variable of one split track.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SplitMeasurement {
    /// First half value.
    pub value1: f64,
    /// First half uncertainty.
    pub err1: f64,
    /// Second half value.
    pub value2: f64,
    /// Second half uncertainty.
    pub err2: f64,
    /// Un-split value.
    pub original: f64,
    /// Precomputed difference between the halves.
    pub delta: f64,
}

impl SplitMeasurement {
    pub(crate) fn from_fields(f: [f64; 6]) -> Self {
        Self { value1: f[0], err1: f[1], value2: f[2], err2: f[3], original: f[4], delta: f[5] }
    }

    /// Combined uncertainty of the two halves.
    pub fn combined_error(&self) -> f64 {
        (self.err1 * self.err1 + self.err2 * self.err2).sqrt()
    }

    /// Derive the histogrammed quantities.
    pub fn derive(&self, rel_scale: f64) -> Derived {
        let error = self.combined_error();
        let pull = self.delta / error;
        Derived {
            original: self.original,
            delta: self.delta * rel_scale / SQRT_2,
            pull: (error > 0.0 && pull.is_finite()).then_some(pull),
        }
    }
}

/// Per-record values for one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    /// Un-split value.
    pub original: f64,
    /// `Delta * rel_scale / sqrt(2)`.
    pub delta: f64,
    /// `None` when the combined uncertainty is zero.
    pub pull: Option<f64>,
}

impl Derived {
    /// Value of `kind`, `None` for an undefined pull.
    pub fn get(&self, kind: Kind) -> Option<f64> {
        match kind {
            Kind::Original => Some(self.original),
            Kind::Delta => Some(self.delta),
            Kind::Pull => self.pull,
        }
    }
}

/// One track-splitting record: a measurement per variable, in variable order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitRecord {
    /// One entry per variable.
    pub measurements: Vec<SplitMeasurement>,
}

impl SplitRecord {
    /// Zeroed record shaped for `variables`.
    pub fn for_variables(variables: &[Variable]) -> Self {
        Self { measurements: vec![SplitMeasurement::default(); variables.len()] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hist_names() {
        assert_eq!(Kind::Original.hist_name("dz"), "dz");
        assert_eq!(Kind::Delta.hist_name("dz"), "Delta_dz");
        assert_eq!(Kind::Pull.hist_name("dz"), "Delta_dz_pull");
    }

    #[test]
    fn column_names_follow_splitter_tree() {
        let c = SplitColumns::for_variable("qoverpt");
        assert_eq!(
            c.names(),
            ["qoverpt1_spl", "qoverpt1Err_spl", "qoverpt2_spl", "qoverpt2Err_spl", "qoverpt_org", "Delta_qoverpt"]
        );
    }

    #[test]
    fn derive_scales_delta_and_forms_pull() {
        let m = SplitMeasurement { err1: 3.0, err2: 4.0, original: 7.5, delta: 0.002, ..Default::default() };
        let d = m.derive(1e4);
        assert_eq!(d.original, 7.5);
        assert_relative_eq!(d.delta, 20.0 / SQRT_2, max_relative = 1e-12);
        assert_relative_eq!(d.pull.unwrap(), 0.002 / 5.0, max_relative = 1e-12);
    }

    #[test]
    fn zero_uncertainty_has_no_pull() {
        let m = SplitMeasurement { delta: 1.0, ..Default::default() };
        assert_eq!(m.derive(1.0).pull, None);
        let m = SplitMeasurement::default();
        assert_eq!(m.derive(1.0).pull, None);
        assert_eq!(m.derive(1.0).get(Kind::Delta), Some(0.0));
    }
}
