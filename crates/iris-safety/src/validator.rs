//! Safety validator: classifies free-form tool arguments before any provider
//! sees them.
//!
//! Evaluation order is cheap literal scan, benign-shape short-circuit, cache
//! lookup, expensive pattern pass, cache store. The expensive pass is the only
//! cached portion and is a pure function of (input, rule-set version).

use std::sync::Mutex;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cache::{CacheCounters, CacheKey, VerdictCache, DEFAULT_VERDICT_CACHE_CAPACITY};
use crate::rules::{RuleCategory, RuleOutcome, RuleSet};

/// Inputs at or under this length with a benign character shape are allowed
/// without touching the cache or the pattern tier.
pub const PREFILTER_MAX_BENIGN_LEN: usize = 64;

/// Nine or more digits can form SSN or card-number shapes; inputs that dense
/// in digits always go through the full pass.
const PREFILTER_MAX_BENIGN_DIGITS: usize = 8;

/// System key chords refused in [`EvalContext::KeyInput`].
const BLOCKED_KEY_COMBOS: &[&str] = &[
    "alt+f4",
    "ctrl+alt+del",
    "ctrl+alt+delete",
    "cmd+q",
    "ctrl+shift+esc",
    "super+",
    "win+",
];

/// Unsafe scheme prefixes refused in [`EvalContext::Url`].
const BLOCKED_URL_SCHEMES: &[&str] = &["javascript:", "file://", "data:", "vbscript:"];

/// Enumerates supported `VerdictOutcome` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerdictOutcome {
    Allow,
    Block,
    Redact,
}

/// Classified outcome of evaluating one candidate string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyVerdict {
    pub outcome: VerdictOutcome,
    pub category: Option<RuleCategory>,
    pub matched_rule_id: Option<&'static str>,
    pub explanation: String,
}

impl SafetyVerdict {
    pub fn allow(explanation: &str) -> Self {
        Self {
            outcome: VerdictOutcome::Allow,
            category: None,
            matched_rule_id: None,
            explanation: explanation.to_string(),
        }
    }

    fn for_rule(outcome: VerdictOutcome, category: RuleCategory, rule_id: &'static str) -> Self {
        // The explanation names the category and rule id, never the matched
        // substring: blocked material must not ride along in error payloads.
        let explanation = match outcome {
            VerdictOutcome::Block => {
                format!("input blocked by {} rule {}", category.name(), rule_id)
            }
            VerdictOutcome::Redact => format!(
                "{} material requires redaction (rule {})",
                category.name(),
                rule_id
            ),
            VerdictOutcome::Allow => format!("allowed by rule {rule_id}"),
        };
        Self {
            outcome,
            category: Some(category),
            matched_rule_id: Some(rule_id),
            explanation,
        }
    }

    pub fn is_block(&self) -> bool {
        self.outcome == VerdictOutcome::Block
    }

    pub fn is_redact(&self) -> bool {
        self.outcome == VerdictOutcome::Redact
    }
}

/// Evaluation context for context-specific cheap checks. The general pass is
/// context independent, so cached verdicts are valid for every context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalContext {
    #[default]
    FreeText,
    KeyInput,
    Url,
}

#[derive(Debug, Default)]
struct PassCounters {
    prefilter_blocks: u64,
    prefilter_allows: u64,
    expensive_evaluations: u64,
}

/// Snapshot counters exposed for validator observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidatorCounters {
    pub prefilter_blocks: u64,
    pub prefilter_allows: u64,
    pub expensive_evaluations: u64,
    pub cache: CacheCounters,
}

/// Public struct `SafetyValidator` used across Iris components.
pub struct SafetyValidator {
    rules: RuleSet,
    cache: VerdictCache,
    counters: Mutex<PassCounters>,
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyValidator {
    pub fn new() -> Self {
        Self::with_rules(RuleSet::builtin(), DEFAULT_VERDICT_CACHE_CAPACITY)
    }

    pub fn with_rules(rules: RuleSet, cache_capacity: usize) -> Self {
        Self {
            rules,
            cache: VerdictCache::new(cache_capacity),
            counters: Mutex::new(PassCounters::default()),
        }
    }

    pub fn rule_set_version(&self) -> u64 {
        self.rules.version()
    }

    /// Evaluates free text. Deterministic for a given (text, rule-set
    /// version).
    pub fn evaluate(&self, text: &str) -> SafetyVerdict {
        self.evaluate_in_context(text, EvalContext::FreeText)
    }

    /// Evaluates text with context-specific cheap checks layered on top of
    /// the general pass.
    pub fn evaluate_in_context(&self, text: &str, context: EvalContext) -> SafetyVerdict {
        if text.is_empty() {
            return SafetyVerdict::allow("empty input");
        }

        let lowered = text.to_lowercase();
        if let Some(verdict) = self.context_verdict(&lowered, context) {
            return verdict;
        }

        // Cheap tier: literal markers over the lowercased input.
        if let Some(rule) = self.rules.match_literal(&lowered) {
            self.bump(|counters| counters.prefilter_blocks += 1);
            return SafetyVerdict::for_rule(VerdictOutcome::Block, rule.category, rule.id);
        }

        if is_benign_shape(text) {
            self.bump(|counters| counters.prefilter_allows += 1);
            return SafetyVerdict::allow("benign input shape");
        }

        let key = cache_key(text, self.rules.version());
        if let Some(cached) = self.cache.lookup(&key) {
            return cached;
        }

        self.bump(|counters| counters.expensive_evaluations += 1);
        let verdict = match self.rules.match_pattern(text) {
            Some(rule) => {
                let outcome = match rule.outcome {
                    RuleOutcome::Block => VerdictOutcome::Block,
                    RuleOutcome::Redact => VerdictOutcome::Redact,
                };
                SafetyVerdict::for_rule(outcome, rule.category, rule.id)
            }
            None => SafetyVerdict::allow("no rule matched"),
        };
        self.cache.store(key, verdict.clone());
        verdict
    }

    /// Rewrites all redaction-rule matches to the redaction marker. Callers
    /// invoke this after receiving a Redact verdict.
    pub fn redact(&self, text: &str) -> String {
        self.rules.redact_all(text)
    }

    pub fn counters(&self) -> ValidatorCounters {
        let passes = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ValidatorCounters {
            prefilter_blocks: passes.prefilter_blocks,
            prefilter_allows: passes.prefilter_allows,
            expensive_evaluations: passes.expensive_evaluations,
            cache: self.cache.counters(),
        }
    }

    fn context_verdict(&self, lowered: &str, context: EvalContext) -> Option<SafetyVerdict> {
        match context {
            EvalContext::FreeText => None,
            EvalContext::KeyInput => BLOCKED_KEY_COMBOS
                .iter()
                .any(|combo| lowered.contains(combo))
                .then(|| {
                    SafetyVerdict::for_rule(
                        VerdictOutcome::Block,
                        RuleCategory::Destructive,
                        "destructive.system_key_combo",
                    )
                }),
            EvalContext::Url => BLOCKED_URL_SCHEMES
                .iter()
                .any(|scheme| lowered.trim_start().starts_with(scheme))
                .then(|| {
                    SafetyVerdict::for_rule(
                        VerdictOutcome::Block,
                        RuleCategory::UnsafeUrl,
                        "unsafe_url.scheme_prefix",
                    )
                }),
        }
    }

    fn bump(&self, update: impl FnOnce(&mut PassCounters)) {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(&mut counters);
    }
}

fn cache_key(text: &str, version: u64) -> CacheKey {
    let digest = Sha256::digest(text.as_bytes());
    let mut hash = [0_u8; 32];
    hash.copy_from_slice(&digest);
    (hash, version)
}

fn is_benign_shape(text: &str) -> bool {
    if text.len() > PREFILTER_MAX_BENIGN_LEN {
        return false;
    }
    let mut digits = 0_usize;
    for character in text.chars() {
        if character.is_ascii_digit() {
            digits += 1;
        } else if !character.is_ascii_alphabetic()
            && !matches!(
                character,
                // No '-': flag-shaped fragments (git push --force) must reach
                // the pattern tier.
                ' ' | '.' | ',' | '!' | '?' | '\'' | '"' | '_' | '(' | ')'
            )
        {
            return false;
        }
    }
    digits <= PREFILTER_MAX_BENIGN_DIGITS
}
