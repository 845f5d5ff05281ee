//! Scanning of Redis container logs for known attack signatures.

use std::sync::LazyLock;

use regex::RegexSet;

/// Case-insensitive signatures Redis writes when it is probed or abused.
const ALERT_PATTERNS: &[&str] = &[
    // Redis refuses HTTP-looking input with this message
    r"(?i)security attack",
    r"(?i)\b(post|host:)\s.*commands?",
    r"(?i)cross[- ]protocol scripting",
    r"(?i)connection\b.*\baborted",
    r"(?i)received\s+sig(term|int|kill)",
    r"(?i)\bshutdown\b.*\b(nosave|force)\b",
];

static ALERT_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(ALERT_PATTERNS).expect("Alert patterns are constant and must compile")
});

/// Lines matching at least one signature, trimmed, in log order. A line
/// matched by several signatures is reported once.
pub fn scan_for_alerts<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            (!line.is_empty() && ALERT_SET.is_match(line)).then(|| line.to_string())
        })
        .collect()
}
