// Fatal-error taxonomy for the import pipeline.
//
// Only unrecoverable conditions live here. An unresolved counterparty,
// category or location is NOT an error: those stay `None` on the transaction
// and are routed to the enrichment workflow.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    /// No format rule matched the raw description. Surfaced loudly so the
    /// rule table gets extended; never silently dropped.
    #[error("unrecognized statement description: {0:?}")]
    UnrecognizedFormat(String),

    /// Statement rows must be denominated in the home currency.
    #[error("unsupported currency {currency:?} on row: {description:?}")]
    UnsupportedCurrency {
        currency: String,
        description: String,
    },

    #[error("invalid value date {0:?}, expected an 8-digit yyyymmdd date")]
    InvalidValueDate(String),

    /// `end == start + amount` violated at construction time.
    #[error("end balance {end} does not equal start balance {start} plus amount {amount}")]
    BalanceMismatch { start: i64, amount: i64, end: i64 },

    /// The row does not chain onto the ledger tail.
    #[error("start balance {found} does not match the ledger's last end balance {expected}")]
    ChainViolation { expected: i64, found: i64 },

    /// Indices of a persisted ledger are not the contiguous run 0..n-1.
    #[error("ledger {ledger:?} has a broken index sequence at position {position}")]
    BrokenIndex { ledger: String, position: usize },

    /// Reference data must resolve every observed (place, country) pair
    /// uniquely; two candidates cannot be told apart at runtime.
    #[error("location {place:?} in {country:?} is ambiguous, candidates: {candidates:?}")]
    AmbiguousLocation {
        place: String,
        country: String,
        candidates: Vec<String>,
    },

    #[error("country {name:?} is ambiguous, candidates: {candidates:?}")]
    AmbiguousCountry {
        name: String,
        candidates: Vec<String>,
    },

    #[error("unknown account id {0:?}")]
    UnknownAccount(String),

    /// The decision source was asked for input it could not provide
    /// (a scripted source ran out of answers, or stdin closed).
    #[error("decision source exhausted while resolving {0:?}")]
    DecisionExhausted(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
