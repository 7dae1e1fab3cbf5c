//! Keys that survive a cache flush.

use serde::{Deserialize, Serialize};

/// Key-name prefixes exempted from [`flush_except_protected`](crate::flush_except_protected).
///
/// Patterns may be written with a trailing `*` (`cart:*`); it is stripped
/// and the rest is matched as a plain prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ProtectedKeys {
    prefixes: Vec<String>,
}

/// Namespaces protected when nothing else is configured.
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &[
    "cart:",
    "session:",
    "stock:",
    "product-stock-",
    "product-stock-is-dirty-",
    "product-template-stock-",
];

impl ProtectedKeys {
    /// Build from patterns. Empty patterns are ignored.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().trim_end_matches('*').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    /// Whether `key` must be kept.
    pub fn is_protected(&self, key: &str) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Normalized prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Add one more protected pattern.
    pub fn with(mut self, pattern: &str) -> Self {
        let mut all = std::mem::take(&mut self.prefixes);
        all.push(pattern.to_string());
        Self::new(all)
    }
}

impl Default for ProtectedKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_PREFIXES.iter().copied())
    }
}

impl From<Vec<String>> for ProtectedKeys {
    fn from(patterns: Vec<String>) -> Self {
        Self::new(patterns)
    }
}

impl From<ProtectedKeys> for Vec<String> {
    fn from(keys: ProtectedKeys) -> Self {
        keys.prefixes
    }
}
