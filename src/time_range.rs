//! Relative time tokens (`1h`, `7d`, ...) resolved against an injected clock.

use chrono::{DateTime, Duration, Utc};

use crate::model::ResolvedRange;

/// Window used by tail lookups when the caller gives no start at all.
pub const TAIL_DEFAULT_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeToken {
    H1,
    H2,
    H4,
    H6,
    H12,
    H24,
    D1,
    D2,
    D3,
    D7,
    D14,
    D30,
}

impl RelativeToken {
    pub const ALL: [RelativeToken; 12] = [
        RelativeToken::H1,
        RelativeToken::H2,
        RelativeToken::H4,
        RelativeToken::H6,
        RelativeToken::H12,
        RelativeToken::H24,
        RelativeToken::D1,
        RelativeToken::D2,
        RelativeToken::D3,
        RelativeToken::D7,
        RelativeToken::D14,
        RelativeToken::D30,
    ];

    /// Exact, case-sensitive match.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelativeToken::H1 => "1h",
            RelativeToken::H2 => "2h",
            RelativeToken::H4 => "4h",
            RelativeToken::H6 => "6h",
            RelativeToken::H12 => "12h",
            RelativeToken::H24 => "24h",
            RelativeToken::D1 => "1d",
            RelativeToken::D2 => "2d",
            RelativeToken::D3 => "3d",
            RelativeToken::D7 => "7d",
            RelativeToken::D14 => "14d",
            RelativeToken::D30 => "30d",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            RelativeToken::H1 => Duration::hours(1),
            RelativeToken::H2 => Duration::hours(2),
            RelativeToken::H4 => Duration::hours(4),
            RelativeToken::H6 => Duration::hours(6),
            RelativeToken::H12 => Duration::hours(12),
            // 24h and 1d are aliases.
            RelativeToken::H24 | RelativeToken::D1 => Duration::hours(24),
            RelativeToken::D2 => Duration::days(2),
            RelativeToken::D3 => Duration::days(3),
            RelativeToken::D7 => Duration::days(7),
            RelativeToken::D14 => Duration::days(14),
            RelativeToken::D30 => Duration::days(30),
        }
    }
}

/// Resolves a relative token to `(now - duration, now)`.
///
/// Returns `None` for anything else; the caller then treats `reference` as an
/// absolute timestamp and leaves its validation to the backend.
pub fn resolve(reference: &str, now: DateTime<Utc>) -> Option<ResolvedRange> {
    let token = RelativeToken::parse(reference)?;
    Some(ResolvedRange {
        from: now - token.duration(),
        to: now,
    })
}

/// Start of a tail window with no explicit reference.
pub fn tail_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(TAIL_DEFAULT_SECS)
}
