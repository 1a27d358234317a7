//! # Domain Models
//!
//! Canonical value types for solvency verification.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SubjectId`] | Validated applicant identifier (`client-XXX`) |
//! | [`DataCategory`] | Identity / financials / history lookup category |
//! | [`CacheKey`] | `(category, subject)` cache key |
//! | [`SubjectRecord`] | Opaque cached upstream payload |
//! | [`CreditScore`] | Score clamped to `0..=1000` |
//! | [`SolvencyReport`] | Assembled per-subject report |
//!
//! All constructors validate their invariants and return [`crate::ValidationError`]
//! on malformed input.

mod records;
mod report;
mod subject;

pub(crate) use records::validate_non_negative;
pub use records::{CategoryRecord, ClientIdentity, CreditHistory, Financials, SubjectRecord};
pub use report::{
    CashFlowBand, CreditScore, Explanations, ScoreBand, SolvencyReport, SolvencyStatus,
    MAX_CREDIT_SCORE,
};
pub use subject::{CacheKey, DataCategory, SubjectId};
