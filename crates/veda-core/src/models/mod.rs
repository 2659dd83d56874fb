//! Data models for the archive
//!
//! One sub-module per domain: accounts, archived assets and the audit trail.

mod asset;
mod audit;
mod user;

pub use asset::*;
pub use audit::*;
pub use user::*;

/// Default and maximum page sizes shared by list endpoints.
pub(crate) fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

pub(crate) fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// `%q%` pattern for ILIKE with wildcards in the user input escaped.
pub(crate) fn like_pattern(q: Option<&str>) -> Option<String> {
    let q = q?.trim();
    if q.is_empty() {
        return None;
    }
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}
