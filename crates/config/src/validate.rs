//! Configuration validation.
//!
//! Detects unknown/misspelled sections and fields in a raw config value and
//! reports semantic problems (missing bot endpoint, zero throttle window).

use std::path::{Path, PathBuf};

use crate::schema::RelayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "unknown-field", "type-error", "bot", "replier", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "bot.endpoint"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Known sections and their fields.
const KNOWN_FIELDS: &[(&str, &[&str])] = &[
    ("bot", &["id", "name", "endpoint"]),
    ("server", &["bind", "port"]),
    ("replier", &["min_interval_ms", "timeout_secs"]),
    ("proxy", &["timeout_secs"]),
    ("commands", &["enabled", "prefix"]),
    ("metrics", &["enabled"]),
];

/// Top-level keys of the legacy flat layout.
const LEGACY_KEYS: &[&str] = &["bot_id", "bot_name", "bot_endpoint"];

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn unknown_field(path: String, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic {
        severity: Severity::Error,
        category: "unknown-field",
        path,
        message,
    }
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Flag unknown sections/fields in a raw config value (any source format,
/// converted to JSON).
#[must_use]
pub fn check_unknown_fields(raw: &serde_json::Value) -> Vec<Diagnostic> {
    let Some(root) = raw.as_object() else {
        return Vec::new();
    };
    if LEGACY_KEYS.iter().any(|k| root.contains_key(*k)) {
        return root
            .keys()
            .filter(|k| !LEGACY_KEYS.contains(&k.as_str()))
            .map(|k| unknown_field(k.clone(), k, LEGACY_KEYS))
            .collect();
    }

    let sections: Vec<&str> = KNOWN_FIELDS.iter().map(|(s, _)| *s).collect();
    let mut diagnostics = Vec::new();
    for (section, value) in root {
        let Some((_, fields)) = KNOWN_FIELDS.iter().find(|(s, _)| s == section) else {
            diagnostics.push(unknown_field(section.clone(), section, &sections));
            continue;
        };
        if let Some(table) = value.as_object() {
            for key in table.keys() {
                if !fields.contains(&key.as_str()) {
                    diagnostics.push(unknown_field(format!("{section}.{key}"), key, fields));
                }
            }
        }
    }
    diagnostics
}

/// Validate a config file: unknown fields first, then semantic checks on the
/// parsed result.
#[must_use]
pub fn validate_file(path: &Path) -> ValidationResult {
    let mut result = match crate::loader::load_config_value(path) {
        Ok(raw) => {
            let unknown = check_unknown_fields(&raw);
            match crate::loader::load_config(path) {
                Ok(config) => {
                    let mut result = validate(&config);
                    result.diagnostics.splice(0..0, unknown);
                    result
                },
                Err(e) => ValidationResult {
                    diagnostics: vec![Diagnostic {
                        severity: Severity::Error,
                        category: "type-error",
                        path: String::new(),
                        message: format!("type error: {e}"),
                    }],
                    config_path: None,
                },
            }
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "file-ref",
                path: String::new(),
                message: e.to_string(),
            }],
            config_path: None,
        },
    };
    result.config_path = Some(path.to_path_buf());
    result
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate(config: &RelayConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let endpoint = config.bot.endpoint.trim();
    if endpoint.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "bot",
            path: "bot.endpoint".into(),
            message: "bot endpoint is required for replies, queries and decryption".into(),
        });
    } else if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "bot",
            path: "bot.endpoint".into(),
            message: format!("bot endpoint must be an http(s) URL, got \"{endpoint}\""),
        });
    }

    if config.bot.id.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "bot",
            path: "bot.id".into(),
            message: "bot id is empty; the bot's own messages will be resolved like any other sender"
                .into(),
        });
    }

    if config.bot.name.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "bot",
            path: "bot.name".into(),
            message: "bot name is empty".into(),
        });
    }

    if config.replier.min_interval_ms == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "replier",
            path: "replier.min_interval_ms".into(),
            message: "throttle window must be at least 1ms".into(),
        });
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}
