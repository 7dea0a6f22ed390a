// Money as integer minor units (euro cents).
//
// Statement extracts carry decimal amounts; everything past this module is an
// i64 cent count. The conversion rounds half-to-even, matching how the
// original statements were booked.

use serde::{Deserialize, Serialize};

/// ISO 4217 code of the home currency. Rows in any other currency are
/// rejected by the classifier.
pub const HOME_CURRENCY: &str = "EUR";

/// Convert a decimal amount (euros) to minor units (cents).
///
/// Rounding rule: round-half-to-even. `0.125` euro → 12 cents, `0.135` euro
/// → 14 cents.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round_ties_even() as i64
}

/// Amount booked in a foreign currency, kept next to the euro amount as a
/// side-channel. The euro amount on the transaction stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignAmount {
    /// ISO 4217 code, e.g. "USD".
    pub currency: String,
    /// Amount in that currency's minor units.
    pub minor_units: i64,
}

/// Format a cent count the way Dutch statements print it: `€ 12,34`, whole
/// euros as `€ 12,-`, sign in front of the currency symbol.
pub fn format_eur(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.abs();
    let euros = abs / 100;
    let cents = abs % 100;
    if cents == 0 {
        format!("{sign}\u{20ac} {euros},-")
    } else {
        format!("{sign}\u{20ac} {euros},{cents:02}")
    }
}
