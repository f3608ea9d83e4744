use std::process::Command;

#[test]
fn cli_prints_json_summaries() {
    let bin = env!("CARGO_BIN_EXE_fleetsim-app");
    let output = Command::new(bin)
        .args([
            "--seed",
            "5",
            "--fishers",
            "6",
            "--periods",
            "10",
            "--replicates",
            "2",
            "--json",
        ])
        .env_remove("FLEETSIM_CONFIG")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run fleetsim binary");
    assert!(output.status.success(), "fleetsim run failed");

    let summaries: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is json");
    let summaries = summaries.as_array().expect("array of summaries");
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["seed"], 5);
    assert_eq!(summaries[1]["periods"], 10);
}

#[test]
fn cli_rejects_zero_replicates() {
    let status = Command::new(env!("CARGO_BIN_EXE_fleetsim-app"))
        .args(["--replicates", "0"])
        .env("RUST_LOG", "off")
        .status()
        .expect("failed to run fleetsim binary");
    assert!(!status.success());
}
