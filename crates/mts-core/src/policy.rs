//! Per-variable binning policy.
//!
//! The policy is a hand-curated table keyed by histogram name (`pt`,
//! `Delta_pt`, `Delta_pt_pull`, ...). Each entry carries the binning, the
//! axis label and an optional rescale factor for the pixel region. Names
//! containing [`PULL_MARKER`] always use [`PULL_BINNING`].
//!
//! The table is validated once when it is built and is read-only afterwards,
//! so a single instance can be shared by every dataset worker.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Substring marking a pull quantity.
pub const PULL_MARKER: &str = "pull";

/// Fixed binning of every pull histogram.
pub const PULL_BINNING: Binning = Binning { n_bins: 40, min: -5.0, max: 5.0 };

/// Uniform binning of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    /// Number of bins (excluding under/overflow).
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
}

impl Binning {
    /// Width of one bin.
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    fn scaled_down(self, factor: f64) -> Self {
        Binning { n_bins: self.n_bins, min: self.min / factor, max: self.max / factor }
    }
}

/// Detector region the histograms are booked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Full tracker acceptance: table bounds as configured.
    Full,
    /// Pixel sub-region: bounds divided by the entry's rescale factor.
    #[default]
    Pixel,
}

/// True if `name` denotes a pull quantity.
pub fn is_pull(name: &str) -> bool {
    name.contains(PULL_MARKER)
}

/// One row of the policy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    /// Table binning; may be omitted for pull entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binning: Option<Binning>,
    /// Axis label (ROOT TLatex syntax).
    pub label: String,
    /// Divisor applied to both bounds in [`Region::Pixel`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_rescale: Option<f64>,
}

/// A split-track variable and the scale used when forming its Delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Variable {
    /// Variable name, also the column prefix in the record source.
    pub name: String,
    /// Unit conversion applied to Delta (e.g. cm → µm is `1e4`).
    pub rel_scale: f64,
}

impl Variable {
    /// Build a variable.
    pub fn new(name: impl Into<String>, rel_scale: f64) -> Self {
        Self { name: name.into(), rel_scale }
    }
}

/// Result of a policy lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    /// Table binning, or [`PULL_BINNING`] for pull names.
    pub binning: Binning,
    /// Axis label.
    pub label: String,
    /// Configured pixel rescale factor.
    pub rescale: Option<f64>,
    /// Whether the pull override applied.
    pub pull: bool,
}

impl AxisSpec {
    /// Binning actually booked in `region`. Pull binning is never rescaled.
    pub fn effective_binning(&self, region: Region) -> Binning {
        match (region, self.rescale) {
            (Region::Pixel, Some(factor)) if !self.pull => self.binning.scaled_down(factor),
            _ => self.binning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyTable {
    variables: Vec<Variable>,
    entries: BTreeMap<String, PolicyEntry>,
}

/// Immutable variable → binning/label table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PolicyTable", into = "PolicyTable")]
pub struct VariablePolicy {
    variables: Vec<Variable>,
    entries: BTreeMap<String, PolicyEntry>,
}

static BUILTIN: LazyLock<VariablePolicy> = LazyLock::new(builtin_table);

/// The table shipped with the tool.
pub fn builtin() -> &'static VariablePolicy {
    &BUILTIN
}

impl TryFrom<PolicyTable> for VariablePolicy {
    type Error = Error;

    fn try_from(t: PolicyTable) -> Result<Self> {
        VariablePolicy::new(t.variables, t.entries)
    }
}

impl From<VariablePolicy> for PolicyTable {
    fn from(p: VariablePolicy) -> Self {
        PolicyTable { variables: p.variables, entries: p.entries }
    }
}

impl VariablePolicy {
    /// Build and validate a policy.
    pub fn new(variables: Vec<Variable>, entries: BTreeMap<String, PolicyEntry>) -> Result<Self> {
        let policy = Self { variables, entries };
        policy.validate()?;
        Ok(policy)
    }

    /// Read a policy from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// Parse a policy from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            if e.is_data() {
                Error::Configuration(format!("invalid policy: {e}"))
            } else {
                Error::Json(e)
            }
        })
    }

    /// Ordered split variables.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Raw table entry.
    pub fn entry(&self, name: &str) -> Option<&PolicyEntry> {
        self.entries.get(name)
    }

    /// Look up the binning and label for a histogram axis.
    ///
    /// Unknown names are a configuration error.
    pub fn lookup(&self, name: &str) -> Result<AxisSpec> {
        let entry = self.entries.get(name).ok_or_else(|| {
            Error::Configuration(format!("variable '{name}' is not in the binning policy"))
        })?;

        let pull = is_pull(name);
        let binning = if pull {
            PULL_BINNING
        } else {
            entry.binning.ok_or_else(|| {
                Error::Configuration(format!("policy entry '{name}' has no binning"))
            })?
        };

        Ok(AxisSpec { binning, label: entry.label.clone(), rescale: entry.pixel_rescale, pull })
    }

    fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(Error::Configuration("policy defines no variables".into()));
        }

        let mut seen = HashSet::new();
        for v in &self.variables {
            if v.name.is_empty() {
                return Err(Error::Configuration("variable name must be non-empty".into()));
            }
            if !seen.insert(v.name.as_str()) {
                return Err(Error::Configuration(format!("duplicate variable '{}'", v.name)));
            }
            if !v.rel_scale.is_finite() || v.rel_scale == 0.0 {
                return Err(Error::Configuration(format!(
                    "variable '{}' has invalid rel_scale {}",
                    v.name, v.rel_scale
                )));
            }
            for name in [v.name.clone(), format!("Delta_{}", v.name), format!("Delta_{}_pull", v.name)]
            {
                if !self.entries.contains_key(&name) {
                    return Err(Error::Configuration(format!(
                        "variable '{}' requires a policy entry '{name}'",
                        v.name
                    )));
                }
            }
        }

        for (name, entry) in &self.entries {
            if let Some(b) = entry.binning
                && (b.n_bins == 0 || !b.min.is_finite() || !b.max.is_finite() || b.min >= b.max)
            {
                return Err(Error::Configuration(format!(
                    "policy entry '{name}' has invalid binning ({}, {}, {})",
                    b.n_bins, b.min, b.max
                )));
            }
            if entry.binning.is_none() && !is_pull(name) {
                return Err(Error::Configuration(format!("policy entry '{name}' has no binning")));
            }
            if let Some(r) = entry.pixel_rescale
                && (!r.is_finite() || r <= 0.0)
            {
                return Err(Error::Configuration(format!(
                    "policy entry '{name}' has invalid pixel_rescale {r}"
                )));
            }
        }
        Ok(())
    }
}

fn builtin_table() -> VariablePolicy {
    let variables = vec![
        Variable::new("pt", 1.0),
        Variable::new("eta", 1.0),
        Variable::new("phi", 1e3),
        Variable::new("dz", 1e4),
        Variable::new("dxy", 1e4),
        Variable::new("theta", 1e3),
        Variable::new("qoverpt", 1e3),
    ];

    let binned = |n_bins: usize, min: f64, max: f64, label: &str, rescale: Option<f64>| PolicyEntry {
        binning: Some(Binning { n_bins, min, max }),
        label: label.to_string(),
        pixel_rescale: rescale,
    };
    let pull =
        |label: &str| PolicyEntry { binning: None, label: label.to_string(), pixel_rescale: None };

    let entries = BTreeMap::from([
        ("pt".to_string(), binned(38, 5.0, 100.0, "p_{T} (GeV)", None)),
        ("qoverpt".to_string(), binned(35, -0.35, 0.35, "q / p_{T} (e/GeV)", None)),
        ("dxy".to_string(), binned(20, -100.0, 100.0, "d_{xy} (cm)", Some(10.0))),
        ("dz".to_string(), binned(20, -250.0, 250.0, "d_{z} (cm)", Some(10.0))),
        ("theta".to_string(), binned(40, 0.0, 2.5, "#theta (rad)", None)),
        ("eta".to_string(), binned(40, -1.2, 1.2, "#eta", None)),
        ("phi".to_string(), binned(30, -3.0, 0.0, "#phi (rad)", None)),
        ("Delta_pt".to_string(), binned(40, -0.8, 0.8, "#Deltap_{T} / #sqrt{2} (GeV)", None)),
        (
            "Delta_qoverpt".to_string(),
            binned(50, -2.5, 2.5, "#Deltaq / p_{T} (x10^{-3}e/GeV)", None),
        ),
        (
            "Delta_dxy".to_string(),
            binned(50, -1250.0, 1250.0, "#Deltad_{xy} / #sqrt{2} (#mum)", Some(10.0)),
        ),
        (
            "Delta_dz".to_string(),
            binned(40, -2000.0, 2000.0, "#Deltad_{z} / #sqrt{2} (#mum)", Some(10.0)),
        ),
        (
            "Delta_theta".to_string(),
            binned(50, -10.0, 10.0, "#Delta#theta / #sqrt{2} (mrad)", Some(2.0)),
        ),
        ("Delta_eta".to_string(), binned(30, -0.006, 0.006, "#Delta#eta / #sqrt{2}", Some(2.0))),
        ("Delta_phi".to_string(), binned(40, -2.0, 2.0, "#Delta#phi / #sqrt{2} (mrad)", None)),
        ("Delta_pt_pull".to_string(), pull("#Deltap_{T} / #delta(#Deltap_{T})")),
        ("Delta_qoverpt_pull".to_string(), pull("#Deltaq/p_{T} / #delta(#Deltaq/p_{T})")),
        ("Delta_dxy_pull".to_string(), pull("#Deltad_{xy} / #delta(#Deltad_{xy})")),
        ("Delta_dz_pull".to_string(), pull("#Deltad_{z} / #delta(#Deltad_{z})")),
        ("Delta_theta_pull".to_string(), pull("#Delta#theta / #delta(#Delta#theta)")),
        ("Delta_eta_pull".to_string(), pull("#Delta#eta / #delta(#Delta#eta)")),
        ("Delta_phi_pull".to_string(), pull("#Delta#phi / #delta(#Delta#phi)")),
    ]);

    VariablePolicy { variables, entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_policy() -> (Vec<Variable>, BTreeMap<String, PolicyEntry>) {
        let variables = vec![Variable::new("x", 10.0)];
        let entries = BTreeMap::from([
            (
                "x".to_string(),
                PolicyEntry {
                    binning: Some(Binning { n_bins: 10, min: -20.0, max: 20.0 }),
                    label: "x (cm)".into(),
                    pixel_rescale: Some(4.0),
                },
            ),
            (
                "Delta_x".to_string(),
                PolicyEntry {
                    binning: Some(Binning { n_bins: 8, min: -1.0, max: 1.0 }),
                    label: "#Deltax (cm)".into(),
                    pixel_rescale: None,
                },
            ),
            (
                "Delta_x_pull".to_string(),
                PolicyEntry {
                    binning: Some(Binning { n_bins: 3, min: 0.0, max: 1.0 }),
                    label: "#Deltax / #delta(#Deltax)".into(),
                    pixel_rescale: Some(2.0),
                },
            ),
        ]);
        (variables, entries)
    }

    #[test]
    fn builtin_table_is_valid() {
        builtin().validate().unwrap();
        assert_eq!(builtin().variables().len(), 7);
        assert_eq!(builtin().variables()[3], Variable::new("dz", 1e4));
    }

    #[test]
    fn lookup_returns_table_binning() {
        let spec = builtin().lookup("pt").unwrap();
        assert_eq!(spec.binning, Binning { n_bins: 38, min: 5.0, max: 100.0 });
        assert_eq!(spec.label, "p_{T} (GeV)");
        assert!(!spec.pull);

        let spec = builtin().lookup("Delta_eta").unwrap();
        assert_eq!(spec.binning, Binning { n_bins: 30, min: -0.006, max: 0.006 });
        assert_eq!(spec.rescale, Some(2.0));
    }

    #[test]
    fn pull_override_ignores_table_and_region() {
        let (vars, entries) = small_policy();
        let policy = VariablePolicy::new(vars, entries).unwrap();
        let spec = policy.lookup("Delta_x_pull").unwrap();
        assert!(spec.pull);
        assert_eq!(spec.binning, PULL_BINNING);
        assert_eq!(spec.effective_binning(Region::Pixel), PULL_BINNING);
        assert_eq!(spec.effective_binning(Region::Full), PULL_BINNING);
    }

    #[test]
    fn pixel_region_divides_bounds() {
        let (vars, entries) = small_policy();
        let policy = VariablePolicy::new(vars, entries).unwrap();
        let spec = policy.lookup("x").unwrap();
        assert_eq!(spec.effective_binning(Region::Pixel), Binning { n_bins: 10, min: -5.0, max: 5.0 });
        assert_eq!(spec.effective_binning(Region::Full), Binning { n_bins: 10, min: -20.0, max: 20.0 });

        // No factor configured: unchanged in both modes.
        let spec = policy.lookup("Delta_x").unwrap();
        assert_eq!(spec.effective_binning(Region::Pixel), spec.binning);
    }

    #[test]
    fn unknown_name_is_configuration_error() {
        let err = builtin().lookup("chi2").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("chi2"));
    }

    #[test]
    fn missing_companion_entry_rejected() {
        let (vars, mut entries) = small_policy();
        entries.remove("Delta_x");
        let err = VariablePolicy::new(vars, entries).unwrap_err();
        assert!(err.to_string().contains("Delta_x"), "{err}");
    }

    #[test]
    fn degenerate_binning_rejected() {
        let (vars, mut entries) = small_policy();
        entries.get_mut("x").unwrap().binning = Some(Binning { n_bins: 5, min: 1.0, max: 1.0 });
        assert!(VariablePolicy::new(vars.clone(), entries).is_err());

        let (_, mut entries) = small_policy();
        entries.get_mut("x").unwrap().pixel_rescale = Some(0.0);
        assert!(VariablePolicy::new(vars, entries).is_err());
    }

    #[test]
    fn json_round_trip_validates() {
        let json = serde_json::to_vec(builtin()).unwrap();
        let back = VariablePolicy::from_json_slice(&json).unwrap();
        assert_eq!(back.variables(), builtin().variables());
        assert_eq!(back.lookup("Delta_dz").unwrap(), builtin().lookup("Delta_dz").unwrap());

        let bad = br#"{"variables": [{"name": "y", "rel_scale": 1.0}], "entries": {}}"#;
        let err = VariablePolicy::from_json_slice(bad).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }
}
