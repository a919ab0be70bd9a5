//! Versioned pattern rule set backing the safety validator.
//!
//! Rules are immutable after compilation. Literal-marker rules feed a single
//! Aho-Corasick automaton used as the cheap prefilter; pattern rules feed a
//! `RegexSet` for the expensive pass. Declaration order is a contract: when
//! several expensive rules match the same input, the earliest-declared rule
//! determines the verdict.

use std::fmt;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexSet};
use serde::Serialize;

/// Error raised when a rule table fails to compile.
#[derive(Debug)]
pub struct RuleCompileError(String);

impl fmt::Display for RuleCompileError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "rule table failed to compile: {}", self.0)
    }
}

impl std::error::Error for RuleCompileError {}

impl From<regex::Error> for RuleCompileError {
    fn from(error: regex::Error) -> Self {
        Self(error.to_string())
    }
}

/// Version of the built-in rule table. Bumped whenever the table changes so
/// that cached verdicts from older tables are never returned.
pub const BUILTIN_RULE_SET_VERSION: u64 = 1;

/// Marker substituted for spans matched by redaction rules.
pub const REDACTION_MARKER: &str = "[IRIS-SAFETY-REDACTED]";

/// Enumerates supported `RuleCategory` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleCategory {
    Destructive,
    Credential,
    #[serde(rename = "PII")]
    Pii,
    Injection,
    #[serde(rename = "UnsafeURL")]
    UnsafeUrl,
}

impl RuleCategory {
    pub fn name(self) -> &'static str {
        match self {
            RuleCategory::Destructive => "Destructive",
            RuleCategory::Credential => "Credential",
            RuleCategory::Pii => "PII",
            RuleCategory::Injection => "Injection",
            RuleCategory::UnsafeUrl => "UnsafeURL",
        }
    }
}

/// Enumerates supported `Severity` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Enumerates supported `CostClass` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CostClass {
    Cheap,
    Expensive,
}

/// What the dispatcher must do with an argument that matched the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleOutcome {
    Block,
    Redact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleMatcher {
    /// Case-insensitive substring test against the lowercased input.
    Literal(&'static str),
    /// Compiled regular expression run against the raw input.
    Pattern(&'static str),
}

/// A single detection rule. Literal rules are the cheap prefilter tier;
/// pattern rules are the expensive tier.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    pub id: &'static str,
    pub category: RuleCategory,
    pub severity: Severity,
    pub outcome: RuleOutcome,
    matcher: RuleMatcher,
}

impl PatternRule {
    pub fn cost(&self) -> CostClass {
        match self.matcher {
            RuleMatcher::Literal(_) => CostClass::Cheap,
            RuleMatcher::Pattern(_) => CostClass::Expensive,
        }
    }

    const fn literal(
        id: &'static str,
        category: RuleCategory,
        severity: Severity,
        marker: &'static str,
    ) -> Self {
        Self {
            id,
            category,
            severity,
            outcome: RuleOutcome::Block,
            matcher: RuleMatcher::Literal(marker),
        }
    }

    const fn pattern(
        id: &'static str,
        category: RuleCategory,
        severity: Severity,
        outcome: RuleOutcome,
        pattern: &'static str,
    ) -> Self {
        Self {
            id,
            category,
            severity,
            outcome,
            matcher: RuleMatcher::Pattern(pattern),
        }
    }
}

/// High-frequency destructive/injection fragments checked before anything
/// else. All literal rules block; redaction rules live in the pattern tier so
/// that matched spans can be rewritten.
const LITERAL_RULES: &[PatternRule] = &[
    PatternRule::literal(
        "destructive.rm_recursive_root",
        RuleCategory::Destructive,
        Severity::High,
        "rm -rf /",
    ),
    PatternRule::literal(
        "destructive.format_system_drive",
        RuleCategory::Destructive,
        Severity::High,
        "format c:",
    ),
    PatternRule::literal(
        "destructive.windows_del_force",
        RuleCategory::Destructive,
        Severity::High,
        "del /f /s /q",
    ),
    PatternRule::literal(
        "destructive.windows_system32_delete",
        RuleCategory::Destructive,
        Severity::High,
        "del c:\\windows\\system32",
    ),
    PatternRule::literal(
        "destructive.fork_bomb_header",
        RuleCategory::Destructive,
        Severity::High,
        ":(){",
    ),
    PatternRule::literal(
        "destructive.fork_bomb_pipe",
        RuleCategory::Destructive,
        Severity::High,
        ":|:&",
    ),
    PatternRule::literal(
        "destructive.mkfs_invocation",
        RuleCategory::Destructive,
        Severity::High,
        "mkfs.",
    ),
    // Letters-only fragments must live in this tier: the benign-shape
    // shortcut never runs when a literal marker matches.
    PatternRule::literal(
        "destructive.killall",
        RuleCategory::Destructive,
        Severity::Medium,
        "killall",
    ),
    PatternRule::literal(
        "injection.sql_drop_table",
        RuleCategory::Injection,
        Severity::High,
        "drop table",
    ),
    PatternRule::literal(
        "injection.sql_delete_table",
        RuleCategory::Injection,
        Severity::High,
        "delete table",
    ),
    PatternRule::literal(
        "injection.sql_truncate_table",
        RuleCategory::Injection,
        Severity::High,
        "truncate table",
    ),
    PatternRule::literal(
        "injection.sql_tautology_literal",
        RuleCategory::Injection,
        Severity::High,
        "' or '1'='1",
    ),
    PatternRule::literal(
        "injection.script_tag_literal",
        RuleCategory::Injection,
        Severity::Medium,
        "<script>",
    ),
    PatternRule::literal(
        "unsafe_url.javascript_scheme",
        RuleCategory::UnsafeUrl,
        Severity::Medium,
        "javascript:",
    ),
    PatternRule::literal(
        "unsafe_url.file_scheme",
        RuleCategory::UnsafeUrl,
        Severity::Medium,
        "file://",
    ),
    PatternRule::literal(
        "unsafe_url.vbscript_scheme",
        RuleCategory::UnsafeUrl,
        Severity::Medium,
        "vbscript:",
    ),
];

/// Expensive pattern rules, declared in category priority order:
/// Destructive, then Credential, PII, Injection, UnsafeUrl.
const PATTERN_RULES: &[PatternRule] = &[
    // Destructive
    PatternRule::pattern(
        "destructive.rm_recursive",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)rm\s+.*-rf.*/",
    ),
    PatternRule::pattern(
        "destructive.format_drive",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)format\s+[a-z]:",
    ),
    PatternRule::pattern(
        "destructive.dd_disk_overwrite",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)dd\s+if=/dev/(zero|random|urandom)\s+of=/dev/",
    ),
    PatternRule::pattern(
        "destructive.disk_device_redirect",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r">\s*/dev/(sd|hd|nvme)",
    ),
    PatternRule::pattern(
        "destructive.windows_system_delete",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)del\s+.*\\(windows|system32)",
    ),
    PatternRule::pattern(
        "destructive.windows_rd_tree",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)rd\s+/s\s+/q\s+[a-z]:",
    ),
    PatternRule::pattern(
        "destructive.recursive_chmod_root",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)chmod\s+(-r\s+)?777\s+/",
    ),
    PatternRule::pattern(
        "destructive.recursive_chmod",
        RuleCategory::Destructive,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)chmod\s+.*-r.*777",
    ),
    PatternRule::pattern(
        "destructive.kill_all_processes",
        RuleCategory::Destructive,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)kill\s+-9\s+-1",
    ),
    PatternRule::pattern(
        "destructive.git_force_push",
        RuleCategory::Destructive,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)git\s+push\s+.*--force",
    ),
    PatternRule::pattern(
        "destructive.git_hard_reset",
        RuleCategory::Destructive,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)git\s+reset\s+--hard",
    ),
    // Credential
    PatternRule::pattern(
        "credential.password_assignment",
        RuleCategory::Credential,
        Severity::Medium,
        RuleOutcome::Redact,
        r"(?i)password[=:\s]\S+",
    ),
    PatternRule::pattern(
        "credential.api_key_assignment",
        RuleCategory::Credential,
        Severity::Medium,
        RuleOutcome::Redact,
        r"(?i)api[_-]?key[=:\s]\S+",
    ),
    PatternRule::pattern(
        "credential.token_assignment",
        RuleCategory::Credential,
        Severity::Medium,
        RuleOutcome::Redact,
        r"(?i)\b(access[_-]?|auth[_-]?)?token[=:\s]\S+",
    ),
    PatternRule::pattern(
        "credential.secret_assignment",
        RuleCategory::Credential,
        Severity::Medium,
        RuleOutcome::Redact,
        r"(?i)\bsecret[_-]?key[=:\s]\S+",
    ),
    PatternRule::pattern(
        "credential.bearer_token",
        RuleCategory::Credential,
        Severity::Medium,
        RuleOutcome::Redact,
        r"(?i)bearer\s+[a-z0-9\-._~+/]+=*",
    ),
    PatternRule::pattern(
        "credential.private_key_block",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"(?i)begin\s+(rsa |dsa |ec |openssh |pgp |ssh2 )?\s*private\s+key",
    ),
    PatternRule::pattern(
        "credential.env_secret_export",
        RuleCategory::Credential,
        Severity::Medium,
        RuleOutcome::Redact,
        r"(?i)export\s+\w*_(secret|key|token|password)",
    ),
    PatternRule::pattern(
        "credential.aws_secret_access_key",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"(?i)aws_secret_access_key",
    ),
    PatternRule::pattern(
        "credential.aws_access_key_id",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"AKIA[0-9A-Z]{16}",
    ),
    PatternRule::pattern(
        "credential.openai_api_key",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"\bsk-[A-Za-z0-9_-]{20,}",
    ),
    PatternRule::pattern(
        "credential.github_token",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"\bgh[pos]_[A-Za-z0-9]{16,}",
    ),
    PatternRule::pattern(
        "credential.gitlab_token",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"\bglpat-[A-Za-z0-9_-]{20,}",
    ),
    PatternRule::pattern(
        "credential.connection_string",
        RuleCategory::Credential,
        Severity::High,
        RuleOutcome::Redact,
        r"(?i)(mysql|mariadb|mongodb|postgres(ql)?|redis|ftp|sftp|ssh)://[^:/\s]+:[^@\s]+@",
    ),
    // PII
    PatternRule::pattern(
        "pii.us_ssn",
        RuleCategory::Pii,
        Severity::Medium,
        RuleOutcome::Redact,
        r"\b\d{3}-\d{2}-\d{4}\b",
    ),
    PatternRule::pattern(
        "pii.visa_card",
        RuleCategory::Pii,
        Severity::Medium,
        RuleOutcome::Redact,
        r"\b4\d{3}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
    ),
    PatternRule::pattern(
        "pii.mastercard",
        RuleCategory::Pii,
        Severity::Medium,
        RuleOutcome::Redact,
        r"\b5[1-5]\d{2}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
    ),
    PatternRule::pattern(
        "pii.amex_card",
        RuleCategory::Pii,
        Severity::Medium,
        RuleOutcome::Redact,
        r"\b3[47]\d{2}[\s-]?\d{6}[\s-]?\d{5}\b",
    ),
    PatternRule::pattern(
        "pii.email_address",
        RuleCategory::Pii,
        Severity::Low,
        RuleOutcome::Redact,
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
    ),
    // Injection
    PatternRule::pattern(
        "injection.chained_destructive",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)[;&]\s*(rm|del|format|mkfs)\b",
    ),
    PatternRule::pattern(
        "injection.backtick_substitution",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"`[^`]+`",
    ),
    PatternRule::pattern(
        "injection.command_substitution",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"\$\([^)]+\)",
    ),
    PatternRule::pattern(
        "injection.pipe_to_shell",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)\|\s*(bash|sh|zsh|ksh)\b",
    ),
    PatternRule::pattern(
        "injection.sql_destructive_statement",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)(drop|delete|truncate)\s+table",
    ),
    PatternRule::pattern(
        "injection.sql_tautology",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)'\s*(or|and)\s+'?\d+'?\s*=\s*'?\d+'?",
    ),
    PatternRule::pattern(
        "injection.script_tag",
        RuleCategory::Injection,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)<script[^>]*>",
    ),
    PatternRule::pattern(
        "injection.reverse_shell",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"(?i)(bash|sh|zsh)\s+-i\s+>&\s*/dev/tcp/",
    ),
    PatternRule::pattern(
        "injection.dev_tcp_endpoint",
        RuleCategory::Injection,
        Severity::High,
        RuleOutcome::Block,
        r"/dev/tcp/[0-9.]+/[0-9]+",
    ),
    PatternRule::pattern(
        "injection.encoded_line_break",
        RuleCategory::Injection,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)\\x0[ad]|%0[ad]",
    ),
    PatternRule::pattern(
        "injection.zero_width_character",
        RuleCategory::Injection,
        Severity::Medium,
        RuleOutcome::Block,
        r"[\x{200B}\x{200C}\x{200D}\x{2060}\x{FEFF}]",
    ),
    PatternRule::pattern(
        "injection.bidi_override",
        RuleCategory::Injection,
        Severity::Medium,
        RuleOutcome::Block,
        r"[\x{202A}-\x{202E}\x{2066}-\x{2069}]",
    ),
    // UnsafeUrl
    PatternRule::pattern(
        "unsafe_url.data_html",
        RuleCategory::UnsafeUrl,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)data:text/html",
    ),
    PatternRule::pattern(
        "unsafe_url.local_address",
        RuleCategory::UnsafeUrl,
        Severity::Medium,
        RuleOutcome::Block,
        r"(?i)https?://(localhost|127\.|192\.168\.|10\.|\[::1\])",
    ),
];

/// Compiled, versioned rule table. Immutable after construction.
#[derive(Debug)]
pub struct RuleSet {
    version: u64,
    literal_rules: Vec<PatternRule>,
    pattern_rules: Vec<PatternRule>,
    literal_automaton: AhoCorasick,
    pattern_set: RegexSet,
    pattern_regexes: Vec<Regex>,
}

impl RuleSet {
    /// The built-in rule table carried by this crate.
    pub fn builtin() -> Self {
        Self::compile(BUILTIN_RULE_SET_VERSION, LITERAL_RULES, PATTERN_RULES)
            .expect("built-in rule table must compile")
    }

    /// Compiles a custom rule table. Used by tests that need a distinct
    /// version counter; production code always uses [`RuleSet::builtin`].
    pub fn compile(
        version: u64,
        literal_rules: &[PatternRule],
        pattern_rules: &[PatternRule],
    ) -> Result<Self, RuleCompileError> {
        let markers = literal_rules
            .iter()
            .map(|rule| match rule.matcher {
                RuleMatcher::Literal(marker) => marker,
                RuleMatcher::Pattern(_) => "",
            })
            .collect::<Vec<_>>();
        // Leftmost-first match semantics make the earliest-declared marker win
        // when two markers start at the same offset.
        let literal_automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&markers)
            .map_err(|error| RuleCompileError(error.to_string()))?;

        let patterns = pattern_rules
            .iter()
            .map(|rule| match rule.matcher {
                RuleMatcher::Pattern(pattern) => pattern,
                RuleMatcher::Literal(_) => "",
            })
            .collect::<Vec<_>>();
        let pattern_set = RegexSet::new(&patterns)?;
        let pattern_regexes = patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version,
            literal_rules: literal_rules.to_vec(),
            pattern_rules: pattern_rules.to_vec(),
            literal_automaton,
            pattern_set,
            pattern_regexes,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rule_count(&self) -> usize {
        self.literal_rules.len() + self.pattern_rules.len()
    }

    /// Cheap tier: substring scan over the lowercased input.
    pub(crate) fn match_literal(&self, lowered: &str) -> Option<&PatternRule> {
        self.literal_automaton
            .find(lowered)
            .map(|hit| &self.literal_rules[hit.pattern().as_usize()])
    }

    /// Expensive tier: full pattern pass over the raw input. The
    /// earliest-declared matching rule wins.
    pub(crate) fn match_pattern(&self, text: &str) -> Option<&PatternRule> {
        self.pattern_set
            .matches(text)
            .iter()
            .min()
            .map(|index| &self.pattern_rules[index])
    }

    /// Rewrites every span matched by a redaction rule. Block rules are left
    /// alone; a blocked input never reaches a provider in any form.
    pub(crate) fn redact_all(&self, text: &str) -> String {
        let mut current = text.to_string();
        for (index, rule) in self.pattern_rules.iter().enumerate() {
            if rule.outcome != RuleOutcome::Redact {
                continue;
            }
            let regex = &self.pattern_regexes[index];
            if regex.is_match(&current) {
                current = regex.replace_all(&current, REDACTION_MARKER).into_owned();
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_builtin_rule_table_compiles_and_is_versioned() {
        let rules = RuleSet::builtin();
        assert_eq!(rules.version(), BUILTIN_RULE_SET_VERSION);
        assert!(rules.rule_count() > 40);
    }

    #[test]
    fn unit_literal_tier_matches_destructive_fragments() {
        let rules = RuleSet::builtin();
        let rule = rules
            .match_literal("please run rm -rf / now")
            .expect("destructive fragment should match");
        assert_eq!(rule.id, "destructive.rm_recursive_root");
        assert_eq!(rule.category, RuleCategory::Destructive);
        assert_eq!(rule.cost(), CostClass::Cheap);
    }

    #[test]
    fn unit_pattern_tier_prefers_earliest_declared_rule() {
        let rules = RuleSet::builtin();
        // Matches both destructive.dd_disk_overwrite and (later)
        // injection-adjacent device redirect content; the destructive rule is
        // declared first and must win.
        let rule = rules
            .match_pattern("dd if=/dev/zero of=/dev/sda > /dev/sda")
            .expect("pattern should match");
        assert_eq!(rule.category, RuleCategory::Destructive);
        assert_eq!(rule.id, "destructive.dd_disk_overwrite");
    }

    #[test]
    fn unit_redact_all_rewrites_credential_spans_only() {
        let rules = RuleSet::builtin();
        let redacted = rules.redact_all("login with password=hunter2 please");
        assert!(redacted.contains(REDACTION_MARKER));
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.starts_with("login with"));
    }

    #[test]
    fn regression_category_serialization_uses_wire_names() {
        assert_eq!(
            serde_json::to_value(RuleCategory::Pii).expect("serialize"),
            serde_json::Value::String("PII".to_string())
        );
        assert_eq!(
            serde_json::to_value(RuleCategory::UnsafeUrl).expect("serialize"),
            serde_json::Value::String("UnsafeURL".to_string())
        );
        assert_eq!(RuleCategory::Destructive.name(), "Destructive");
    }
}
