//! Host selection - glob matching and numeric windowing
//!
//! Selection happens in two steps:
//! 1. Keep hosts whose name matches a shell glob
//! 2. Window the matches: skip the first `skip`, keep every `every`-th,
//!    truncate to `limit`

use crate::error::{Error, Result};
use crate::types::Host;
use regex::Regex;

/// Parameters for narrowing an inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOptions {
    /// Shell glob matched against host names
    pub pattern: String,
    /// Number of leading matches to drop
    pub skip: usize,
    /// Keep every n-th remaining match
    pub every: usize,
    /// Upper bound on the selection; `None` or `Some(0)` is unbounded
    pub limit: Option<usize>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            skip: 0,
            every: 1,
            limit: None,
        }
    }
}

/// Result of narrowing an inventory
#[derive(Debug, Clone)]
pub struct Selection {
    /// Selected hosts, in inventory order
    pub hosts: Vec<Host>,
    /// Size of the full inventory
    pub total: usize,
    /// Hosts that matched the pattern
    pub matched: usize,
}

impl Selection {
    /// Hosts dropped by the name pattern
    pub fn name_filtered(&self) -> usize {
        self.total - self.matched
    }

    /// Matching hosts dropped by skip/every/limit
    pub fn limit_filtered(&self) -> usize {
        self.matched - self.hosts.len()
    }
}

/// Narrow an inventory to the working set
pub fn select(inventory: Vec<Host>, opts: &SelectOptions) -> Result<Selection> {
    let total = inventory.len();
    let matching = match_by_pattern(inventory, &opts.pattern)?;
    let matched = matching.len();
    let hosts = window(matching, opts.skip, opts.every, opts.limit);

    log::debug!(
        "Selected {}/{} hosts (pattern '{}', skip {}, every {}, limit {:?})",
        hosts.len(),
        total,
        opts.pattern,
        opts.skip,
        opts.every,
        opts.limit
    );

    Ok(Selection {
        hosts,
        total,
        matched,
    })
}

/// Keep hosts whose name matches the glob
pub fn match_by_pattern(hosts: Vec<Host>, glob: &str) -> Result<Vec<Host>> {
    let pattern = HostPattern::new(glob)?;
    Ok(hosts
        .into_iter()
        .filter(|h| pattern.matches(h.hostname()))
        .collect())
}

/// Apply skip, then every, then limit
pub fn window(hosts: Vec<Host>, skip: usize, every: usize, limit: Option<usize>) -> Vec<Host> {
    let every = every.max(1);
    let limit = match limit {
        Some(0) | None => usize::MAX,
        Some(n) => n,
    };

    hosts
        .into_iter()
        .skip(skip)
        .step_by(every)
        .take(limit)
        .collect()
}

/// A compiled shell glob
///
/// Supports `*`, `?`, bracket classes (`[abc]`, `[a-z]`, `[^0-9]`) and
/// backslash escapes. `*` and `?` never match `/`.
#[derive(Debug, Clone)]
pub struct HostPattern {
    glob: String,
    regex: Regex,
}

impl HostPattern {
    pub fn new(glob: &str) -> Result<Self> {
        let source = glob_to_regex(glob).map_err(|reason| Error::InvalidPattern {
            pattern: glob.to_string(),
            reason,
        })?;
        let regex = Regex::new(&source).map_err(|e| Error::InvalidPattern {
            pattern: glob.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

fn glob_to_regex(glob: &str) -> std::result::Result<String, String> {
    let mut out = String::from("^");
    let mut chars = glob.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars.next().ok_or("trailing backslash")?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => out.push_str(&parse_class(&mut chars)?),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}

/// Translate a bracket class; the opening `[` is already consumed
fn parse_class(chars: &mut std::str::Chars<'_>) -> std::result::Result<String, String> {
    let mut class = String::from("[");
    let mut rest = chars.clone().peekable();
    if rest.peek() == Some(&'^') {
        chars.next();
        class.push('^');
    }

    let mut items = 0;
    loop {
        let lo = match chars.next() {
            None => return Err("unterminated character class".to_string()),
            Some(']') if items > 0 => break,
            Some(']') => return Err("empty character class".to_string()),
            Some('\\') => chars.next().ok_or("trailing backslash")?,
            Some(c) => c,
        };

        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') && !matches!(lookahead.next(), Some(']') | None) {
            chars.next();
            let hi = match chars.next() {
                Some('\\') => chars.next().ok_or("trailing backslash")?,
                Some(c) => c,
                None => return Err("unterminated character class".to_string()),
            };
            if hi < lo {
                return Err(format!("invalid range {lo}-{hi}"));
            }
            class.push_str(&escape_class_char(lo));
            class.push('-');
            class.push_str(&escape_class_char(hi));
        } else {
            class.push_str(&escape_class_char(lo));
        }
        items += 1;
    }

    class.push(']');
    Ok(class)
}

fn escape_class_char(c: char) -> String {
    match c {
        '\\' | ']' | '[' | '^' | '-' | '&' | '~' => format!("\\{c}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(names: &[&str]) -> Vec<Host> {
        names
            .iter()
            .map(|n| Host::new(*n, format!("{n}.example.net")))
            .collect()
    }

    fn names(hosts: &[Host]) -> Vec<&str> {
        hosts.iter().map(|h| h.name.as_str()).collect()
    }

    fn ten_hosts() -> Vec<Host> {
        let names: Vec<String> = (0..10).map(|i| format!("h{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        inventory(&refs)
    }

    #[test]
    fn test_pattern_wildcards() {
        let p = HostPattern::new("web*").unwrap();
        assert!(p.matches("web01"));
        assert!(p.matches("web"));
        assert!(!p.matches("db01"));

        let p = HostPattern::new("web0?").unwrap();
        assert!(p.matches("web01"));
        assert!(!p.matches("web10"));
        assert!(!p.matches("web0"));

        let p = HostPattern::new("*").unwrap();
        assert!(p.matches("anything.example.net"));
        assert!(!p.matches("a/b"));
    }

    #[test]
    fn test_pattern_classes() {
        let p = HostPattern::new("web[0-2]").unwrap();
        assert!(p.matches("web0"));
        assert!(p.matches("web2"));
        assert!(!p.matches("web3"));

        let p = HostPattern::new("web[^0-2]").unwrap();
        assert!(!p.matches("web1"));
        assert!(p.matches("web7"));

        let p = HostPattern::new("db[ab-]").unwrap();
        assert!(p.matches("dba"));
        assert!(p.matches("db-"));
        assert!(!p.matches("dbc"));
    }

    #[test]
    fn test_pattern_literals_are_not_regex() {
        let p = HostPattern::new("web.prod").unwrap();
        assert!(p.matches("web.prod"));
        assert!(!p.matches("webxprod"));

        let p = HostPattern::new(r"host\*").unwrap();
        assert!(p.matches("host*"));
        assert!(!p.matches("host1"));
    }

    #[test]
    fn test_malformed_patterns() {
        for glob in ["web[", "web[]", "web[z-a]", "web\\", "[a-"] {
            let err = HostPattern::new(glob).unwrap_err();
            assert!(
                matches!(err, Error::InvalidPattern { .. }),
                "{glob} should be rejected"
            );
        }
    }

    #[test]
    fn test_match_by_pattern_keeps_order() {
        let hosts = inventory(&["web02", "db01", "web01", "web10"]);
        let matched = match_by_pattern(hosts, "web0*").unwrap();
        assert_eq!(names(&matched), vec!["web02", "web01"]);
    }

    #[test]
    fn test_window_skip_every_limit() {
        let selected = window(ten_hosts(), 2, 3, Some(2));
        assert_eq!(names(&selected), vec!["h2", "h5"]);
    }

    #[test]
    fn test_window_every_starts_at_first_retained() {
        let selected = window(ten_hosts(), 2, 3, None);
        assert_eq!(names(&selected), vec!["h2", "h5", "h8"]);
    }

    #[test]
    fn test_window_edge_cases() {
        assert!(window(ten_hosts(), 10, 1, None).is_empty());
        assert!(window(ten_hosts(), 25, 1, None).is_empty());
        assert_eq!(window(ten_hosts(), 0, 1, Some(0)).len(), 10);
        assert_eq!(window(ten_hosts(), 0, 0, None).len(), 10);
        assert_eq!(window(ten_hosts(), 0, 1, Some(50)).len(), 10);
    }

    #[test]
    fn test_select_counts() {
        let mut hosts = ten_hosts();
        hosts.extend(inventory(&["db01", "db02"]));

        let opts = SelectOptions {
            pattern: "h*".into(),
            skip: 2,
            every: 3,
            limit: Some(2),
        };
        let selection = select(hosts, &opts).unwrap();
        assert_eq!(selection.total, 12);
        assert_eq!(selection.matched, 10);
        assert_eq!(selection.name_filtered(), 2);
        assert_eq!(selection.limit_filtered(), 8);
        assert_eq!(names(&selection.hosts), vec!["h2", "h5"]);
    }

    #[test]
    fn test_select_is_deterministic() {
        let opts = SelectOptions {
            pattern: "h[0-7]".into(),
            skip: 1,
            every: 2,
            limit: None,
        };
        let first = select(ten_hosts(), &opts).unwrap();
        let second = select(ten_hosts(), &opts).unwrap();
        assert_eq!(first.hosts, second.hosts);
        assert_eq!(names(&first.hosts), vec!["h1", "h3", "h5", "h7"]);
    }

    #[test]
    fn test_select_invalid_pattern() {
        let opts = SelectOptions {
            pattern: "h[".into(),
            ..Default::default()
        };
        assert!(select(ten_hosts(), &opts).is_err());
    }
}
