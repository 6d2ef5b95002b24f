use std::fs;
use std::process::Command;

use pima::logit::test_fixtures::{SyntheticDataBuilder, write_csv};
use tempfile::tempdir;

#[test]
fn bayes_cli_writes_draws_and_model() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("diabetes.csv");
    write_csv(&SyntheticDataBuilder::new(250).build(), &data_path).expect("write data");
    let draws_path = tmp.path().join("draws.csv");
    let model_path = tmp.path().join("model.toml");

    let exe = env!("CARGO_BIN_EXE_pima");
    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "bayes",
            data_path.to_str().expect("path str"),
            "--prior",
            "exponential",
            "--burn-in",
            "100",
            "--iterations",
            "600",
            "--thin",
            "5",
            "--draws-out",
            draws_path.to_str().expect("path str"),
            "--model-out",
            model_path.to_str().expect("path str"),
        ])
        .status()
        .expect("run pima cli");

    assert!(status.success(), "CLI exited with status {status:?}");
    let draws = fs::read_to_string(&draws_path).expect("draws file");
    let mut lines = draws.lines();
    assert_eq!(
        lines.next(),
        Some("(Intercept),Glucose,BMI,DiabetesPedigreeFunction,BloodPressure")
    );
    assert_eq!(lines.count(), 100);
    let model = fs::read_to_string(&model_path).expect("model file");
    assert!(model.contains("BayesianNormalExponentialPrior"));
}

#[test]
fn explore_cli_rejects_bad_split_fraction() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("diabetes.csv");
    write_csv(&SyntheticDataBuilder::new(50).build(), &data_path).expect("write data");

    let exe = env!("CARGO_BIN_EXE_pima");
    let output = Command::new(exe)
        .args([
            "explore",
            data_path.to_str().expect("path str"),
            "--split-fraction",
            "1.5",
        ])
        .output()
        .expect("run pima cli");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {stderr}");
}

#[test]
fn mle_cli_fails_on_missing_file() {
    let exe = env!("CARGO_BIN_EXE_pima");
    let output = Command::new(exe)
        .args(["mle", "/nonexistent/diabetes.csv"])
        .output()
        .expect("run pima cli");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn explore_cli_prints_summary_and_split() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("diabetes.csv");
    write_csv(
        &SyntheticDataBuilder::new(200).with_zero_sentinels(0.03).build(),
        &data_path,
    )
    .expect("write data");

    let exe = env!("CARGO_BIN_EXE_pima");
    let output = Command::new(exe)
        .args(["explore", data_path.to_str().expect("path str")])
        .output()
        .expect("run pima cli");

    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    for expected in ["Correlation matrix:", "Positive outcome rate", "training rows"] {
        assert!(stdout.contains(expected), "missing '{expected}' in: {stdout}");
    }
}

#[test]
fn mle_cli_prints_table_and_saves_model() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("diabetes.csv");
    write_csv(&SyntheticDataBuilder::new(300).build(), &data_path).expect("write data");
    let model_path = tmp.path().join("mle.toml");

    let exe = env!("CARGO_BIN_EXE_pima");
    let output = Command::new(exe)
        .args([
            "mle",
            data_path.to_str().expect("path str"),
            "--model-out",
            model_path.to_str().expect("path str"),
        ])
        .output()
        .expect("run pima cli");

    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pr(>|z|)"), "stdout: {stdout}");
    assert!(stdout.contains("Model saved to:"));
    let model = fs::read_to_string(&model_path).expect("model file");
    assert!(model.contains("MaximumLikelihood"));
    assert!(model.contains("(Intercept)"));
}

#[test]
fn report_cli_runs_with_shipped_config() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("diabetes.csv");
    write_csv(
        &SyntheticDataBuilder::new(300).with_zero_sentinels(0.02).build(),
        &data_path,
    )
    .expect("write data");
    let config_path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/three_sentinel_fields.toml");

    let exe = env!("CARGO_BIN_EXE_pima");
    let output = Command::new(exe)
        .args([
            "report",
            data_path.to_str().expect("path str"),
            "--config",
            config_path,
        ])
        .output()
        .expect("run pima cli");

    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    for expected in [
        "Comparison on the test set",
        "Pr(>|z|)",
        "95% credible intervals:",
        "Dropped: Pregnancies, SkinThickness, Insulin, Age",
    ] {
        assert!(stdout.contains(expected), "missing '{expected}' in: {stdout}");
    }
}
