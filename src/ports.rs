use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::ScanError;

/// Ports probed during a deep scan when none are configured.
pub const DEFAULT_PORTS: [u16; 5] = [22, 80, 443, 3389, 8080];

/// Default deep-scan port set as an owned list.
pub fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

/// Parse a port list into an ordered set of TCP ports (1..=65535).
///
/// Entries may be separated by commas, whitespace or newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
///
/// The first occurrence of a port fixes its position; later duplicates are dropped.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>, ScanError> {
    let mut ports = Vec::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            match token.split_once('-') {
                Some((a, b)) => {
                    let start = parse_port(a).map_err(|e| at_line(line_no, e))?;
                    let end = parse_port(b).map_err(|e| at_line(line_no, e))?;
                    if start > end {
                        return Err(at_line(
                            line_no,
                            format!("invalid range {start}-{end} (start > end)"),
                        ));
                    }
                    ports.extend(start..=end);
                }
                None => ports.push(parse_port(token).map_err(|e| at_line(line_no, e))?),
            }
        }
    }

    Ok(dedup_ports(ports))
}

/// Load a port list from a file. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> anyhow::Result<Vec<u16>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read ports file: {}", path.display()))?;
    parse_ports_str(&content).with_context(|| format!("invalid ports file: {}", path.display()))
}

/// Remove duplicate ports while keeping first-seen order.
pub fn dedup_ports(ports: impl IntoIterator<Item = u16>) -> Vec<u16> {
    let mut seen = HashSet::new();
    ports.into_iter().filter(|p| seen.insert(*p)).collect()
}

fn parse_port(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let val: u32 = s
        .parse()
        .map_err(|_| format!("invalid port value: {s:?}"))?;
    if val == 0 || val > u16::MAX as u32 {
        return Err(format!("port out of range: {val}"));
    }
    Ok(val as u16)
}

fn at_line(line_no: usize, msg: impl std::fmt::Display) -> ScanError {
    ScanError::InvalidConfig(format!("ports line {line_no}: {msg}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_separated() {
        let ports = parse_ports_str("22,80, 443").unwrap();
        assert_eq!(ports, vec![22, 80, 443]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let ports = parse_ports_str("8000-8002\n80\n8001\n").unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 80]);
    }

    #[test]
    fn parse_with_comments_and_whitespace() {
        let input = r#"
            # remote access
            22   # ssh
            3389 # rdp
            8000-8001, 8080

        "#;
        let ports = parse_ports_str(input).unwrap();
        assert_eq!(ports, vec![22, 3389, 8000, 8001, 8080]);
    }

    #[test]
    fn out_of_range_and_reversed_ranges_error() {
        assert!(parse_ports_str("70000").is_err());
        assert!(parse_ports_str("0").is_err());
        assert!(parse_ports_str("90-80").is_err());
        assert!(parse_ports_str("http").is_err());
    }

    #[test]
    fn default_set_matches_deep_scan_defaults() {
        assert_eq!(default_ports(), vec![22, 80, 443, 3389, 8080]);
    }
}
