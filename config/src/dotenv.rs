//! `.env` reader. Produces a key-value map; applying it to the environment happens in `lib`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = match override_dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().ok()?,
    };
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Strips one pair of matching quotes. Double quotes honour `\"`; single quotes are literal.
fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return raw[1..raw.len() - 1].replace("\\\"", "\"");
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    raw.to_string()
}

/// One `KEY=VALUE` line. Accepts an optional leading `export `. Comments (`#` at line start)
/// and lines without `=` yield `None`.
fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim())))
}

fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content.lines().filter_map(parse_line).collect()
}

/// Loads `.env` from `override_dir` or the current directory. Missing file yields an empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    match dotenv_path(override_dir) {
        Some(path) => Ok(parse_dotenv(&std::fs::read_to_string(path)?)),
        None => Ok(HashMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs_and_skips_comments() {
        let m = parse_dotenv("\n# runtime\nAJORA_RUNTIME_URL=http://localhost:4000\n  \nX=1\n");
        assert_eq!(m.len(), 2);
        assert_eq!(
            m.get("AJORA_RUNTIME_URL").map(String::as_str),
            Some("http://localhost:4000")
        );
    }

    #[test]
    fn export_prefix_is_accepted() {
        let m = parse_dotenv("export AJORA_RUNTIME_TRANSPORT=single\n");
        assert_eq!(m.get("AJORA_RUNTIME_TRANSPORT").map(String::as_str), Some("single"));
    }

    #[test]
    fn quotes_are_stripped() {
        let m = parse_dotenv("A=\"hello world\"\nB='single'\nC=\"say \\\"hi\\\"\"\nD=\"\"\n");
        assert_eq!(m.get("A").map(String::as_str), Some("hello world"));
        assert_eq!(m.get("B").map(String::as_str), Some("single"));
        assert_eq!(m.get("C").map(String::as_str), Some("say \"hi\""));
        assert_eq!(m.get("D").map(String::as_str), Some(""));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let m = parse_dotenv("NO_EQUALS\n=value_only\nOK=yes\n");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("OK").map(String::as_str), Some("yes"));
    }

    #[test]
    fn load_env_map_reads_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_map(Some(dir.path())).unwrap().is_empty());
        std::fs::write(dir.path().join(".env"), "A=1\nB=2\n").unwrap();
        let m = load_env_map(Some(dir.path())).unwrap();
        assert_eq!(m.get("A").map(String::as_str), Some("1"));
        assert_eq!(m.get("B").map(String::as_str), Some("2"));
    }
}
