use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mts"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("mts_cli_{}_{}_{}", std::process::id(), nanos, name));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

/// Splitter columns for the seven built-in variables, every value inside
/// the pixel-region binning.
fn write_splitter_parquet(path: &Path, n: usize, shift: f64) {
    // (variable, first original value, original step, Delta step)
    let vars = [
        ("pt", 10.0, 2.0, 1e-2),
        ("eta", -0.9, 0.09, 2e-4),
        ("phi", -2.9, 0.1, 1e-4),
        ("dz", -9.5, 1.0, 1e-3),
        ("dxy", -4.75, 0.5, 1e-3),
        ("theta", 0.5, 0.05, 1e-4),
        ("qoverpt", -0.19, 0.02, 1e-4),
    ];
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for (v, org0, step, dstep) in vars {
        let org: Vec<f64> = (0..n).map(|i| org0 + step * i as f64).collect();
        let delta: Vec<f64> = (0..n).map(|i| dstep * (i as f64 - 10.0 + shift)).collect();
        let err = vec![5.0 * dstep; n];
        let v1: Vec<f64> = org.iter().zip(&delta).map(|(o, d)| o + d / 2.0).collect();
        let v2: Vec<f64> = org.iter().zip(&delta).map(|(o, d)| o - d / 2.0).collect();
        for (name, col) in [
            (format!("{v}1_spl"), v1),
            (format!("{v}1Err_spl"), err.clone()),
            (format!("{v}2_spl"), v2),
            (format!("{v}2Err_spl"), err),
            (format!("{v}_org"), org),
            (format!("Delta_{v}"), delta),
        ] {
            fields.push(Field::new(name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(col)));
        }
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = parquet::arrow::ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn produce(dir: &Path, name: &str, shift: f64, extra: &[&str]) -> Output {
    std::fs::create_dir_all(dir).unwrap();
    let input = dir.join(format!("{name}.parquet"));
    write_splitter_parquet(&input, 20, shift);
    let out_dir = dir.join("out");
    let mut args = vec![
        "produce",
        "--input",
        input.to_str().unwrap(),
        "--name",
        name,
        "--out-dir",
        out_dir.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    run(&args)
}

#[test]
fn produce_writes_histogram_artifact() {
    let dir = tmp_dir("produce");
    let out = produce(&dir, "Kappa1", 0.0, &[]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let path = dir.join("out").join("Kappa1.json");
    assert!(String::from_utf8_lossy(&out.stdout).contains("Kappa1.json"));

    let artifact = mts_core::read_artifact(&path).unwrap();
    assert_eq!(artifact.meta.dataset, "Kappa1");
    assert_eq!(artifact.meta.n_records, 20);
    assert_eq!(artifact.meta.region, mts_core::Region::Pixel);
    assert_eq!(artifact.histograms.len(), 7 * 3 + 7 * 6 * 2);
    assert_eq!(artifact.scalars.len(), 7 * 3 * 2);
    assert!(artifact.summary("Delta_dxy_pull").is_some());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn produce_lower_pairs_in_full_region() {
    let dir = tmp_dir("produce_lower");
    let out = produce(&dir, "K", 0.0, &["--pairs", "lower", "--region", "full", "--outlier", "0.9"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let artifact = mts_core::read_artifact(&dir.join("out").join("K.json")).unwrap();
    assert_eq!(artifact.meta.pairs, mts_core::PairPolicy::Lower);
    assert_eq!(artifact.meta.region, mts_core::Region::Full);
    assert_eq!(artifact.meta.outlier_fraction, Some(0.9));
    assert_eq!(artifact.histograms.len(), 7 * 3 + 7 * 6);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn produce_zero_outlier_fraction_disables_trimming() {
    let dir = tmp_dir("produce_zero_fraction");
    let out = produce(&dir, "K", 0.0, &["--outlier", "0"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let artifact = mts_core::read_artifact(&dir.join("out").join("K.json")).unwrap();
    assert_eq!(artifact.meta.outlier_fraction, None);
    assert!(artifact.summary("Delta_pt").is_some());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn produce_rejects_bad_outlier_fraction() {
    let dir = tmp_dir("produce_bad_fraction");
    let out = produce(&dir, "K", 0.0, &["--outlier", "1.5"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("outlier fraction"));
    assert!(!dir.join("out").join("K.json").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn produce_reports_missing_input() {
    let dir = tmp_dir("produce_missing");
    let missing = dir.join("nope.parquet");
    let out = run(&[
        "produce",
        "--input",
        missing.to_str().unwrap(),
        "--name",
        "K",
        "--out-dir",
        dir.to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("record source unavailable"), "stderr={stderr}");
    assert!(stderr.contains("nope.parquet"), "stderr={stderr}");
}

#[test]
fn compare_overlays_two_artifacts() {
    let dir = tmp_dir("compare");
    assert!(produce(&dir, "A", 0.0, &[]).status.success());
    assert!(produce(&dir, "B", 1.0, &[]).status.success());
    let a = dir.join("out").join("A.json");
    let b = dir.join("out").join("B.json");
    let output = dir.join("plots").join("comparison.json");

    let out = run(&[
        "compare",
        "--artifact",
        a.to_str().unwrap(),
        "--artifact",
        b.to_str().unwrap(),
        "--title",
        "Kappa1",
        "--title",
        "Kappa2",
        "--legend-title",
        "Run 3",
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(v["schema_version"], "mts_comparison_v1");
    assert_eq!(v["meta"]["legend_title"], "Run 3");
    let overlays = v["overlays"].as_array().unwrap();
    assert_eq!(overlays.len(), 7 * 3 + 7 * 6 * 2);
    assert_eq!(overlays[0]["kind"], "distribution");
    assert_eq!(overlays[0]["name"], "pt");
    assert_eq!(overlays[0]["series"][1]["title"], "Kappa2");
    assert_eq!(overlays[0]["series"][1]["color"], 632);
    assert_eq!(overlays[3]["kind"], "profile");
    assert_eq!(overlays[3]["name"], "pt_VS_eta_profile");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn compare_rejects_mismatched_titles() {
    let dir = tmp_dir("compare_titles");
    assert!(produce(&dir, "A", 0.0, &[]).status.success());
    let a = dir.join("out").join("A.json");
    let out = run(&[
        "compare",
        "--artifact",
        a.to_str().unwrap(),
        "--artifact",
        a.to_str().unwrap(),
        "--title",
        "only one",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--title"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn policy_dumps_builtin_table() {
    let out = run(&["policy"]);
    assert!(out.status.success());
    let policy: mts_core::VariablePolicy = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(policy.variables().len(), 7);
    assert_eq!(policy.lookup("pt").unwrap().binning.n_bins, 38);
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(env!("CARGO_PKG_VERSION")));
}
