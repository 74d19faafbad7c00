use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const CONFIG: &str = r#"{
  "candidates": { "reference": "A", "opposed": "B" },
  "regions": [
    { "name": "Northland", "weight": 300, "abbreviation": "NL" },
    { "name": "Southland", "weight": 238 }
  ],
  "region_sim": { "iterations": 500 },
  "system_sim": { "iterations": 1000 }
}"#;

fn polls_jsonl() -> String {
    let mut lines = Vec::new();
    let mut id = 1;
    for day in 25..28 {
        for (region, a, b) in [("Northland", 52.0, 44.0), ("Southland", 45.0, 51.0)] {
            for (cand, pct) in [("A", a), ("B", b)] {
                lines.push(format!(
                    r#"{{"poll_id": {id}, "state": "{region}", "pollster": "Pollster {}", "candidate_name": "{cand}", "pct": {pct}, "sample_size": 800, "population": "lv", "end_date": "2024-10-{day}"}}"#,
                    id % 3
                ));
                id += 1;
            }
        }
    }
    lines.join("\n")
}

fn polls_csv() -> String {
    let mut out = String::from("poll_id,state,pollster,candidate_name,pct,sample_size,population,end_date\n");
    let mut id = 1;
    for day in 25..28 {
        for (region, a, b) in [("Northland", 52.0, 44.0), ("Southland", 45.0, 51.0)] {
            for (cand, pct) in [("A", a), ("B", b)] {
                out.push_str(&format!(
                    "{id},{region},Pollster {},{cand},{pct},800,lv,2024-10-{day}\n",
                    id % 3
                ));
                id += 1;
            }
        }
    }
    out
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), CONFIG).unwrap();
        fs::write(dir.path().join("polls.jsonl"), polls_jsonl()).unwrap();
        fs::write(dir.path().join("priors.json"), r#"{"A": 55.0, "B": 45.0}"#).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn explicit(&self) -> Command {
        let mut cmd = Command::cargo_bin("pm").unwrap();
        cmd.arg("--polls")
            .arg(self.path("polls.jsonl"))
            .arg("--config")
            .arg(self.path("config.json"))
            .arg("--priors")
            .arg(self.path("priors.json"))
            .arg("--quiet");
        cmd
    }
}

fn read_json(p: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap()
}

#[test]
fn text_report_shows_tally_and_regions() {
    let fx = Fixture::new();
    fx.explicit()
        .args(["--render", "text", "--seed", "0x2a"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "Projection as of 2024-10-27 (window 15 days, swing +0.00, seed 42)",
        ))
        .stdout(predicate::str::contains("EV: A: 300, B: 238"))
        .stdout(predicate::str::contains("Northland"))
        .stdout(predicate::str::contains("Win Probability:"));
}

#[test]
fn same_seed_same_report() {
    let fx = Fixture::new();
    let run = || fx.explicit().args(["--render", "json", "--seed", "9"]).output().unwrap();
    let (a, b) = (run(), run());
    assert!(a.status.success());
    assert_eq!(a.stdout, b.stdout);
}

#[test]
fn out_dir_gets_projection_and_history() {
    let fx = Fixture::new();
    let out = fx.path("out");
    fx.explicit()
        .arg("--out")
        .arg(&out)
        .args(["--history", "7,30"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let p = read_json(&out.join("projection.json"));
    assert_eq!(p["regions"].as_array().unwrap().len(), 2);
    assert_eq!(p["params"]["window_days"], 15);
    assert_eq!(p["system"]["total_weight_by_candidate"]["A"], 300);
    assert_eq!(p["diagnostics"]["ingest"]["accepted"], 12);
    assert_eq!(p["inputs"]["polls_sha256"].as_str().unwrap().len(), 64);
    assert!(p["inputs"]["weights_sha256"].is_null());

    let h = read_json(&out.join("history.json"));
    let windows: Vec<u64> =
        h.as_array().unwrap().iter().map(|x| x["window_days"].as_u64().unwrap()).collect();
    assert_eq!(windows, vec![7, 15, 30]);
}

#[test]
fn csv_polls_give_the_same_report() {
    let fx = Fixture::new();
    fs::write(fx.path("polls.csv"), polls_csv()).unwrap();
    let json = fx.explicit().args(["--render", "json", "--seed", "9"]).output().unwrap();
    let csv = Command::cargo_bin("pm")
        .unwrap()
        .arg("--polls")
        .arg(fx.path("polls.csv"))
        .arg("--config")
        .arg(fx.path("config.json"))
        .arg("--priors")
        .arg(fx.path("priors.json"))
        .args(["--quiet", "--render", "json", "--seed", "9"])
        .output()
        .unwrap();
    assert!(csv.status.success());
    assert_eq!(json.stdout, csv.stdout);
}

#[test]
fn validate_only_prints_nothing() {
    let fx = Fixture::new();
    fx.explicit()
        .args(["--validate-only", "--render", "text"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn manifest_with_missing_priors_degrades() {
    let fx = Fixture::new();
    fs::write(
        fx.path("manifest.json"),
        r#"{"polls_path": "polls.jsonl", "config_path": "config.json", "priors_path": "absent.json"}"#,
    )
    .unwrap();
    let out = Command::cargo_bin("pm")
        .unwrap()
        .arg("--manifest")
        .arg(fx.path("manifest.json"))
        .args(["--render", "json", "--quiet"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let notes = v["summary"]["notes"].as_array().unwrap();
    assert!(notes.iter().any(|n| n.as_str().unwrap().starts_with("priors unavailable")));
    assert!(notes
        .iter()
        .any(|n| n.as_str().unwrap().starts_with("system win probability unavailable")));
    assert!(v["summary"]["win_probability_text"].is_null());
}

#[test]
fn missing_config_flag_is_a_usage_error() {
    let fx = Fixture::new();
    Command::cargo_bin("pm")
        .unwrap()
        .arg("--polls")
        .arg(fx.path("polls.jsonl"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn non_finite_swing_exits_2() {
    let fx = Fixture::new();
    fx.explicit()
        .args(["--swing", "NaN", "--render", "text"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("swing must be finite"));
}

#[test]
fn invalid_config_exits_2() {
    let fx = Fixture::new();
    fs::write(fx.path("config.json"), r#"{"candidates": {"reference": "A"}}"#).unwrap();
    fx.explicit().assert().code(2);
}

#[test]
fn unreadable_out_dir_exits_4() {
    let fx = Fixture::new();
    // A regular file where the output directory should go.
    fs::write(fx.path("blocked"), "x").unwrap();
    fx.explicit().arg("--out").arg(fx.path("blocked")).assert().code(4);
}

#[test]
fn urls_are_rejected() {
    Command::cargo_bin("pm")
        .unwrap()
        .args(["--manifest", "https://example.org/manifest.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no scheme"));
}

#[test]
fn bundled_demo_runs() {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/manifest.json");
    Command::cargo_bin("pm")
        .unwrap()
        .arg("--manifest")
        .arg(manifest)
        .args(["--as-of", "2024-10-28", "--render", "text", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pennsylvania"))
        .stdout(predicate::str::contains("note: no outcome: "));
}
