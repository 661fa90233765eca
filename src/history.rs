//! Append-only audit trail of run and graph invocations

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Local;

use crate::error::Result;

/// Shared history file, never rotated or truncated
pub const HISTORY_FILE: &str = "history.txt";

/// Append one timestamped line recording an invocation
pub fn append(action: &str, stem: &str) -> Result<()> {
    append_to(Path::new(HISTORY_FILE), action, stem)
}

fn append_to(path: &Path, action: &str, stem: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "{} - {} {}", now, action, stem)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        append_to(&path, "running", "bench/run1").unwrap();
        append_to(&path, "graphing", "bench/run1").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("- running bench/run1"));
        assert!(lines[1].ends_with("- graphing bench/run1"));
    }
}
