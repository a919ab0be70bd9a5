//! Safety validation engine for desktop-automation arguments.
//!
//! Classifies free-form text against a versioned pattern rule set before any
//! capability provider sees it: cheap literal prefilter, bounded LRU verdict
//! cache, then an ordered expensive pattern pass. First matching rule wins;
//! Credential/PII matches request redaction, everything else that matches
//! blocks.

pub mod adversarial;
mod cache;
mod rules;
mod validator;

pub use adversarial::{
    ADVERSARIAL_CREDENTIAL_CONNECTION_STRING, ADVERSARIAL_DESTRUCTIVE_MULTILINE,
    ADVERSARIAL_INJECTION_PIPE_SHELL, ADVERSARIAL_KEY_COMBO_CLOSE_WINDOW,
    ADVERSARIAL_SECRET_PROJECT_KEY,
};
pub use cache::{CacheCounters, DEFAULT_VERDICT_CACHE_CAPACITY};
pub use rules::{
    CostClass, PatternRule, RuleCategory, RuleCompileError, RuleOutcome, RuleSet, Severity,
    BUILTIN_RULE_SET_VERSION, REDACTION_MARKER,
};
pub use validator::{
    EvalContext, SafetyValidator, SafetyVerdict, ValidatorCounters, VerdictOutcome,
    PREFILTER_MAX_BENIGN_LEN,
};
