//! Labels and metadata derived from log file names

use regex::Regex;
use std::path::Path;

/// Short label for a log source
///
/// `measure-<x>.txt` becomes `<x>`; any other name loses a `.txt` extension.
pub fn source_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = name.strip_suffix(".txt").unwrap_or(&name);
    match stem.strip_prefix("measure-") {
        Some(suffix) if name.ends_with(".txt") && !suffix.is_empty() => suffix.to_string(),
        _ => stem.to_string(),
    }
}

/// Trailing `-<number>[M|Mbps][.txt]` of a file name
const THROUGHPUT_SUFFIX: &str = r"-(\d+(?:\.\d+)?)(?:M|Mbps)?(?:\.txt)?$";

/// Throughput in Mbps encoded at the end of a file name
///
/// Matches a trailing `-<number>`, optionally followed by `M` or `Mbps`, as
/// in `measure-PRB-500M.txt` or `run-125.5Mbps.txt`.
pub fn throughput_from_file_name(path: &Path) -> Option<f64> {
    let name = path.file_name()?.to_string_lossy();
    let pattern = Regex::new(THROUGHPUT_SUFFIX).ok()?;
    pattern.captures(&name)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_source_label() {
        assert_eq!(source_label(&PathBuf::from("logs/measure-nfapi.txt")), "nfapi");
        assert_eq!(source_label(&PathBuf::from("measure-monolithic.txt")), "monolithic");
        assert_eq!(source_label(&PathBuf::from("vnf.txt")), "vnf");
        assert_eq!(source_label(&PathBuf::from("measure-x.log")), "measure-x.log");
        assert_eq!(source_label(&PathBuf::from("measure-.txt")), "measure-");
    }

    #[test]
    fn test_throughput_from_file_name() {
        assert_eq!(throughput_from_file_name(&PathBuf::from("measure-PRB-500M.txt")), Some(500.0));
        assert_eq!(throughput_from_file_name(&PathBuf::from("test-1000M.txt")), Some(1000.0));
        assert_eq!(throughput_from_file_name(&PathBuf::from("run-125.5Mbps.txt")), Some(125.5));
        assert_eq!(throughput_from_file_name(&PathBuf::from("run-42")), Some(42.0));
        assert_eq!(throughput_from_file_name(&PathBuf::from("measure.txt")), None);
        assert_eq!(throughput_from_file_name(&PathBuf::from("measure-PRB.txt")), None);
        assert_eq!(throughput_from_file_name(&PathBuf::from("a-1.2.3M.txt")), None);
        assert_eq!(throughput_from_file_name(&PathBuf::from("exp-125.5M.txt")), Some(125.5));
        assert_eq!(throughput_from_file_name(&PathBuf::from("logs-7/run-64Mbps")), Some(64.0));
        assert_eq!(throughput_from_file_name(&PathBuf::from("run-500M.log")), None);
    }
}
