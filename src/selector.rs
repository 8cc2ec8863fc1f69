use tracing::info;

use crate::error::DbError;
use crate::models::profile::ConnectionProfile;
use crate::registry::ProfileRegistry;

/// Fallback dialect list used when the descriptor is absent or empty.
pub const DEFAULT_DIALECTS: &[&str] = &["sqlite3", "mysql", "mysql2", "better-sqlite3"];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parses a dialect descriptor into an ordered, de-duplicated token list.
///
/// Tokens are maximal runs of `[A-Za-z0-9_-]`; everything else separates.
/// An empty or all-separator descriptor yields `fallback`. Duplicates
/// collapse to their first occurrence, so the result behaves as a set with
/// a stable iteration order.
pub fn select(descriptor: &str, fallback: &[&str]) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in descriptor.split(|c: char| !is_word_char(c)) {
        if token.is_empty() || tokens.iter().any(|t| t == token) {
            continue;
        }
        tokens.push(token.to_string());
    }
    if tokens.is_empty() {
        tokens = fallback.iter().map(|d| d.to_string()).collect();
    }
    info!(selection = ?tokens, "dialect selection");
    tokens
}

/// Resolves a selection against the registry, cloning the active profiles
/// in selection order.
///
/// Any token the registry does not know fails the whole selection: one bad
/// token must not silently drop valid profiles, and the failure surfaces
/// here, before any pool is constructed.
pub fn filter_registry(
    selection: &[String],
    registry: &ProfileRegistry,
) -> Result<Vec<ConnectionProfile>, DbError> {
    selection
        .iter()
        .map(|dialect| registry.lookup(dialect).cloned())
        .collect()
}
