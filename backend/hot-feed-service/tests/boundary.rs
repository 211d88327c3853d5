//! Structural checks on the source tree.

use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(read_dir) = fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                    files.push(path);
                }
            }
        }
    }
    files
}

fn src_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src")
}

#[test]
fn ranking_rules_stay_free_of_io() {
    let pure = [
        src_root().join("filter"),
        src_root().join("services/scoring.rs"),
        src_root().join("services/tiers.rs"),
        src_root().join("services/pagination.rs"),
    ];
    let forbidden = ["sqlx", "reqwest", "tokio::", "std::fs", "std::net"];

    let mut offenders = Vec::new();
    for root in &pure {
        let files = if root.is_dir() {
            collect_rs_files(root)
        } else {
            vec![root.clone()]
        };
        for file in files {
            let source = fs::read_to_string(&file).unwrap_or_default();
            for needle in forbidden {
                if source.contains(needle) {
                    offenders.push(format!("{} uses {}", file.display(), needle));
                }
            }
        }
    }

    if !offenders.is_empty() {
        panic!("Filter and scoring rules must stay pure. Offenders: {:?}", offenders);
    }
}

#[test]
fn only_the_store_layer_writes_sql() {
    let store_root = src_root().join("db");
    let mut offenders = Vec::new();
    for file in collect_rs_files(&src_root()) {
        if file.starts_with(&store_root) {
            continue;
        }
        let source = fs::read_to_string(&file).unwrap_or_default();
        if source.contains("FROM ranked_items")
            || source.contains("INSERT INTO ranked_items")
            || source.contains("DELETE FROM ranked_items")
        {
            offenders.push(file.display().to_string());
        }
    }

    if !offenders.is_empty() {
        panic!("SQL must stay in the db module. Offenders: {:?}", offenders);
    }
}

#[test]
fn feed_handler_does_not_await_refresh() {
    let source = include_str!("../src/handlers/feed.rs");
    assert!(source.contains("state.refresh.request()"));
    assert!(!source.contains("run_refresh_cycle"));
}
