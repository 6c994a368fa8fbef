//! File enumeration and rank partitioning: expands the path string and time
//! interval into a file list local to this rank. Discovery uses the
//! rotation-interval pattern `FLOW_FILE_FORMAT` (a strftime template) stepped
//! by a fixed rotation interval when a time range is given over a directory
//! path; otherwise a recursive directory walk or single-file open.
//!
//! This is a plain leaf, not a novel distributed-system design: enumerate the
//! full candidate file list the same way on every rank, then take every
//! `worker_count`-th entry starting at this rank's offset, giving every
//! worker a disjoint, deterministic slice without any coordination.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::session::TimeInterval;

/// Step between successive rotated flow-capture files when a time range is
/// given. Five minutes matches the rotation cadence flow-capture tools
/// (nfcapd, softflowd) commonly use.
const ROTATION_INTERVAL: Duration = Duration::minutes(5);

/// Enumerate every file this rank is responsible for. `rank` is 1-based
/// worker rank; `worker_count` is `transport.size() - 1`.
pub fn discover_files(
    path: &str,
    time_interval: Option<TimeInterval>,
    rank: u32,
    worker_count: u32,
) -> Result<Vec<PathBuf>> {
    let all = enumerate_all(path, time_interval)?;
    Ok(all
        .into_iter()
        .enumerate()
        .filter(|(i, _)| (*i as u32) % worker_count == rank - 1)
        .map(|(_, p)| p)
        .collect())
}

fn enumerate_all(path: &str, time_interval: Option<TimeInterval>) -> Result<Vec<PathBuf>> {
    let path_ref = Path::new(path);
    if contains_strftime_template(path) {
        let Some(interval) = time_interval else {
            return Err(Error::bad_argument(
                format!("path {path:?} names a strftime rotation template but no time range was given"),
                crate::origin!(),
            ));
        };
        return Ok(expand_rotation_template(path, interval));
    }
    if path_ref.is_dir() {
        return walk_directory(path_ref);
    }
    Ok(vec![path_ref.to_path_buf()])
}

fn contains_strftime_template(path: &str) -> bool {
    path.contains('%')
}

/// Step a strftime template across `[start, end)` at `ROTATION_INTERVAL`.
/// The upper bound is exclusive, matching `TimeInterval`'s half-open
/// convention.
fn expand_rotation_template(template: &str, interval: TimeInterval) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Some(mut cursor) = DateTime::<Utc>::from_timestamp(interval.start, 0) else { return files };
    let Some(end) = DateTime::<Utc>::from_timestamp(interval.end, 0) else { return files };
    while cursor < end {
        files.push(PathBuf::from(cursor.format(template).to_string()));
        cursor += ROTATION_INTERVAL;
    }
    files
}

fn walk_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", dir.display());
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::bad_path(dir, e.to_string(), crate::origin!()))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_path_is_assigned_to_exactly_one_rank() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("flows.bin");
        std::fs::write(&file, b"x").unwrap();
        let path = file.to_string_lossy().to_string();

        let rank1 = discover_files(&path, None, 1, 2).unwrap();
        let rank2 = discover_files(&path, None, 2, 2).unwrap();
        assert_eq!(rank1.len() + rank2.len(), 1);
    }

    #[test]
    fn directory_files_are_partitioned_disjointly_across_ranks() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            std::fs::write(dir.path().join(format!("flows-{i}.bin")), b"x").unwrap();
        }
        let path = dir.path().to_string_lossy().to_string();

        let rank1 = discover_files(&path, None, 1, 3).unwrap();
        let rank2 = discover_files(&path, None, 2, 3).unwrap();
        let rank3 = discover_files(&path, None, 3, 3).unwrap();
        assert_eq!(rank1.len() + rank2.len() + rank3.len(), 6);
        assert_eq!(rank1.len(), 2);

        let mut all: Vec<_> = rank1.iter().chain(&rank2).chain(&rank3).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn rotation_template_without_time_range_is_bad_argument() {
        let err = discover_files("/flows/%Y%m%d%H%M.flow", None, 1, 1).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::BadArgument);
    }

    #[test]
    fn rotation_template_expands_across_interval() {
        let interval = TimeInterval { start: 0, end: 900 }; // 15 minutes -> 3 rotation steps
        let files = expand_rotation_template("/flows/%Y%m%d%H%M.flow", interval);
        assert_eq!(files.len(), 3);
    }
}
