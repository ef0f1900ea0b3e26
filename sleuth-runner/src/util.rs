use chrono::Utc;
use std::path::{Path, PathBuf};

/// Timestamped directory for one invocation's artifacts.
pub fn run_dir(base: &Path, mode: &str, seed: u64) -> PathBuf {
    let ts = Utc::now().format("%Y%m%dT%H%M%S");
    base.join(mode).join(format!("seed-{seed}")).join(ts.to_string())
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}
