// Copyright 2026 Placefind Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

fn placefind_cmd(config_root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("placefind"));
    cmd.env("XDG_CONFIG_HOME", config_root);
    cmd.env("HOME", config_root);
    cmd.env("APPDATA", config_root);
    cmd
}

fn normalize_json(mut value: Value) -> Value {
    if let Some(stats) = value.get_mut("stats")
        && let Some(obj) = stats.as_object_mut()
    {
        obj.insert("took_ms".to_string(), json!(0));
    }
    value
}

fn run_json(cmd: &mut Command, cwd: &Path) -> Value {
    let output = cmd.current_dir(cwd).output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("parse json")
}

fn assert_repeatable(config_root: &Path, args: &[&str], runs: usize, cwd: &Path) {
    let mut baseline: Option<Value> = None;
    for _ in 0..runs {
        let mut cmd = placefind_cmd(config_root);
        cmd.args(args);
        let json = normalize_json(run_json(&mut cmd, cwd));
        if let Some(ref expected) = baseline {
            assert_eq!(&json, expected);
        } else {
            baseline = Some(json);
        }
    }
}

#[test]
fn deterministic_outputs() {
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();

    // Same timestamp everywhere so ordering rests on the id tiebreak.
    let lines: Vec<String> = (0..12)
        .map(|i| {
            json!({
                "id": format!("p{:02}", 11 - i),
                "name": format!("Spot {i}"),
                "location": [0.001 * (i % 4) as f64, 0.001 * (i / 4) as f64],
                "categories": [if i % 2 == 0 { "even" } else { "odd" }],
                "created_at": "2026-01-01T00:00:00Z",
            })
            .to_string()
        })
        .collect();
    fs::write(root.join("places.jsonl"), lines.join("\n")).expect("write fixture");

    let mut cmd = placefind_cmd(config_root);
    cmd.args(["init", "."]);
    assert!(cmd.current_dir(root).output().unwrap().status.success());

    let mut cmd = placefind_cmd(config_root);
    cmd.args(["import", "places.jsonl"]);
    assert!(cmd.current_dir(root).output().unwrap().status.success());

    assert_repeatable(config_root, &["nearby", "0", "0", "5", "--json"], 10, root);
    assert_repeatable(
        config_root,
        &["search", "--category", "even", "--limit", "3", "--offset", "2", "--json"],
        10,
        root,
    );
    assert_repeatable(
        config_root,
        &[
            "search",
            "--within",
            r#"{"type":"bounds","min_lng":0,"min_lat":0,"max_lng":0.002,"max_lat":0.002}"#,
            "--json",
        ],
        10,
        root,
    );
}
