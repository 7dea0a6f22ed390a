// Description classifier - free statement text to typed transactions.
//
// An ordered table of (type predicate, grammar set) pairs. Predicates pick
// the transaction type from the description prefix; within a type, grammar
// variants are tried in priority order and the first full match wins. A row
// no rule recognizes fails the whole import, carrying the offending text, so
// the table gets extended instead of rows getting dropped.

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::ImportError;
use crate::iban::find_iban;
use crate::ledger::{Details, Staging, TransactionKind};
use crate::money::{to_minor_units, HOME_CURRENCY};

// ============================================================================
// INPUT ROW
// ============================================================================

/// One row of a tabular statement extract. The six fields below are all the
/// core needs, whatever file format they came from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatementRow {
    pub description: String,
    pub amount: f64,
    pub start_balance: f64,
    pub end_balance: f64,
    /// 8-digit value date, yyyymmdd.
    pub value_date: String,
    pub currency: String,
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Classifier output: type tag, normalized amounts and timestamp, typed
/// details, and the raw staging evidence the resolver consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub kind: TransactionKind,
    pub amount: i64,
    pub start_balance: i64,
    pub end_balance: i64,
    pub timestamp: NaiveDateTime,
    pub details: Details,
    pub staging: Staging,
}

// ============================================================================
// RULE TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum RuleKind {
    Interest,
    Card,
    Transfer,
    DirectDebit,
    Ideal,
    BankFee,
}

struct FormatRule {
    kind: RuleKind,
    /// Priority-ordered grammar variants; first full match wins.
    grammars: Vec<Regex>,
}

pub struct Classifier {
    /// Description prefix marking a fee booking by the home bank, casefolded.
    fee_prefix: String,
    rules: Vec<FormatRule>,
}

fn grammar(pattern: &str) -> Regex {
    Regex::new(pattern).expect("format grammar")
}

impl Classifier {
    pub fn new(fee_prefix: &str) -> Self {
        let rules = vec![
            FormatRule {
                kind: RuleKind::Interest,
                grammars: vec![grammar(r"(?i)^(?P<memo>rente.*)$")],
            },
            FormatRule {
                kind: RuleKind::Card,
                grammars: vec![grammar(
                    r"(?i)^(?P<channel>[BG])EA, Betaalpas\s+(?P<name>.*),PAS(?P<card>\d{3})\s+NR:(?P<terminal>.*?),?\s+(?P<timestamp>\d{2}\.\d{2}\.\d{2}/\d{2}[:.]\d{2})\s+(?P<place>.*)$",
                )],
            },
            FormatRule {
                kind: RuleKind::Transfer,
                grammars: vec![
                    grammar(
                        r"(?i)^/TRTP/SEPA OVERBOEKING/IBAN/(?P<iban>[^/]*)/BIC/(?P<bic>[^/]*)/NAME/(?P<name>.*)/REMI/(?P<memo>.*)/EREF/(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^/TRTP/SEPA OVERBOEKING/IBAN/(?P<iban>[^/]*)/BIC/(?P<bic>[^/]*)/NAME/(?P<name>.*)/EREF/(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Overboeking\s+IBAN:\s(?P<iban>\S+)\s+BIC:\s(?P<bic>\S+)\s+Naam:\s(?P<name>.*?)\s+Betalingskenm\.:\s(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Overboeking\s+IBAN:\s(?P<iban>\S+)\s+BIC:\s(?P<bic>\S+)\s+Naam:\s(?P<name>.*?)\s+Omschrijving:\s(?P<memo>.*?)\s+Kenmerk:\s(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Overboeking\s+IBAN:\s(?P<iban>\S+)\s+BIC:\s(?P<bic>\S+)\s+Naam:\s(?P<name>.*?)\s+Omschrijving:\s(?P<memo>.*)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Overboeking\s+IBAN:\s(?P<iban>\S+)\s+BIC:\s(?P<bic>\S+)\s+Naam:\s(?P<name>.*)$",
                    ),
                ],
            },
            FormatRule {
                kind: RuleKind::DirectDebit,
                grammars: vec![
                    grammar(
                        r"(?i)^/TRTP/SEPA Incasso algemeen doorlopend/CSID/(?P<creditor>[^/]*)/NAME/(?P<name>.*)/MARF/(?P<mandate>[^/]*)/REMI/(?P<memo>.*)/IBAN/(?P<iban>[^/]*)/BIC/(?P<bic>[^/]*)/EREF/(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Incasso algemeen doorlopend\s+Incassant:\s(?P<creditor>\S+)\s+Naam:\s(?P<name>.*?)\s+Machtiging:\s(?P<mandate>\S+)\s+Omschrijving:\s(?P<memo>.*?)\s+IBAN:\s(?P<iban>\S+)\s+Kenmerk:\s(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Incasso algemeen doorlopend\s+Incassant:\s(?P<creditor>\S+)\s+Naam:\s(?P<name>.*?)\s+Machtiging:\s(?P<mandate>\S+)\s+Omschrijving:\s(?P<memo>.*?)\s+IBAN:\s(?P<iban>\S+)$",
                    ),
                    grammar(
                        r"(?i)^SEPA Incasso algemeen doorlopend\s+Incassant:\s(?P<creditor>\S+)\s+Naam:\s(?P<name>.*?)\s+Machtiging:\s(?P<mandate>\S+)\s+Omschrijving:\s(?P<memo>.*)$",
                    ),
                ],
            },
            FormatRule {
                kind: RuleKind::Ideal,
                grammars: vec![
                    grammar(
                        r"(?i)^SEPA iDEAL\s+IBAN:\s(?P<iban>\S+)\s+BIC:\s(?P<bic>\S+)\s+Naam:\s(?P<name>.*?)\s+Omschrijving:\s(?P<memo>.*?)\s+Kenmerk:\s(?P<timestamp>\d{2}-\d{2}-\d{4} \d{2}:\d{2})\s(?P<reference>.*)$",
                    ),
                    grammar(
                        r"(?i)^/TRTP/iDEAL/IBAN/(?P<iban>[^/]*)/BIC/(?P<bic>[^/]*)/NAME/(?P<name>.*)/REMI/(?P<memo>.*)/EREF/(?P<timestamp>\d{2}-\d{2}-\d{4} \d{2}:\d{2}) (?P<reference>.*)$",
                    ),
                ],
            },
            FormatRule {
                kind: RuleKind::BankFee,
                grammars: vec![grammar(r"(?i)^(?P<memo>.*)$")],
            },
        ];
        Classifier {
            fee_prefix: fee_prefix.to_lowercase(),
            rules,
        }
    }

    /// Type predicate per rule, evaluated on the casefolded description.
    fn applies(&self, kind: RuleKind, folded: &str) -> bool {
        match kind {
            RuleKind::Interest => folded.starts_with("rente"),
            RuleKind::Card => {
                folded.starts_with("bea, betaalpas") || folded.starts_with("gea, betaalpas")
            }
            RuleKind::Transfer => {
                folded.starts_with("sepa overboeking")
                    || folded.starts_with("/trtp/sepa overboeking/")
            }
            RuleKind::DirectDebit => folded.contains("sepa incasso algemeen doorlopend"),
            RuleKind::Ideal => {
                folded.starts_with("sepa ideal") || folded.starts_with("/trtp/ideal/")
            }
            RuleKind::BankFee => {
                !self.fee_prefix.is_empty() && folded.starts_with(self.fee_prefix.as_str())
            }
        }
    }

    /// Classify one statement row. Deterministic: the same description
    /// always yields the same structured output.
    pub fn classify(&self, row: &StatementRow) -> Result<Classified, ImportError> {
        if !row.currency.eq_ignore_ascii_case(HOME_CURRENCY) {
            return Err(ImportError::UnsupportedCurrency {
                currency: row.currency.clone(),
                description: row.description.clone(),
            });
        }

        let value_date = NaiveDate::parse_from_str(row.value_date.trim(), "%Y%m%d")
            .map_err(|_| ImportError::InvalidValueDate(row.value_date.clone()))?;

        let base = Classified {
            kind: TransactionKind::Transfer,
            amount: to_minor_units(row.amount),
            start_balance: to_minor_units(row.start_balance),
            end_balance: to_minor_units(row.end_balance),
            timestamp: value_date.and_hms_opt(0, 0, 0).unwrap(),
            details: Details::default(),
            staging: Staging::default(),
        };

        let description = row.description.trim();
        let folded = description.to_lowercase();

        for rule in &self.rules {
            if !self.applies(rule.kind, &folded) {
                continue;
            }
            for pattern in &rule.grammars {
                if let Some(caps) = pattern.captures(description) {
                    return self.build(rule.kind, &caps, base, description);
                }
            }
            // right predicate, no grammar variant: still unrecognized
            break;
        }
        Err(ImportError::UnrecognizedFormat(description.to_string()))
    }

    fn build(
        &self,
        kind: RuleKind,
        caps: &Captures,
        base: Classified,
        description: &str,
    ) -> Result<Classified, ImportError> {
        match kind {
            RuleKind::Interest => Ok(build_interest(caps, base)),
            RuleKind::Card => build_card(caps, base, description),
            RuleKind::Transfer => build_transfer(caps, base, description),
            RuleKind::DirectDebit => Ok(build_direct_debit(caps, base)),
            RuleKind::Ideal => build_ideal(caps, base, description),
            RuleKind::BankFee => Ok(build_bank_fee(caps, base)),
        }
    }
}

// ============================================================================
// PER-TYPE BUILDERS
// ============================================================================

/// Trimmed named capture, with empty strings collapsed to None.
fn capture(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A reference is only kept when the statement actually provided one.
fn keep_reference(reference: Option<String>) -> Option<String> {
    reference.filter(|r| !r.eq_ignore_ascii_case("NOTPROVIDED"))
}

fn build_interest(caps: &Captures, mut out: Classified) -> Classified {
    out.kind = TransactionKind::Interest;
    out.details.memo = capture(caps, "memo");
    out
}

fn build_bank_fee(caps: &Captures, mut out: Classified) -> Classified {
    out.kind = TransactionKind::BankFee;
    out.details.memo = capture(caps, "memo");
    out
}

fn build_card(
    caps: &Captures,
    mut out: Classified,
    description: &str,
) -> Result<Classified, ImportError> {
    out.kind = match caps["channel"].to_uppercase().as_str() {
        "B" => TransactionKind::CardPayment,
        _ => TransactionKind::CashWithdrawal,
    };

    let raw_timestamp = &caps["timestamp"];
    out.timestamp = NaiveDateTime::parse_from_str(raw_timestamp, "%d.%m.%y/%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw_timestamp, "%d.%m.%y/%H.%M"))
        .map_err(|_| ImportError::UnrecognizedFormat(description.to_string()))?;

    out.details.card_number = capture(caps, "card");
    out.details.terminal = capture(caps, "terminal");
    out.staging.name = capture(caps, "name");

    // The raw place may carry a trailing country marker: "KOELN, land:DEU".
    // Without one the transaction happened in the home country.
    let raw_place = caps["place"].trim();
    if let Some((place, country)) = raw_place
        .split_once(", land:")
        .or_else(|| raw_place.split_once("land:"))
    {
        out.staging.place = Some(place.trim().to_string()).filter(|s| !s.is_empty());
        out.staging.country = Some(country.trim().to_string()).filter(|s| !s.is_empty());
    } else if !raw_place.is_empty() {
        out.staging.place = Some(raw_place.to_string());
    }
    Ok(out)
}

fn build_transfer(
    caps: &Captures,
    mut out: Classified,
    description: &str,
) -> Result<Classified, ImportError> {
    let name = capture(caps, "name");
    let memo = capture(caps, "memo");
    let reference = keep_reference(capture(caps, "reference"));

    out.details.reference = reference;

    let is_payment_request = memo
        .as_deref()
        .map(|m| m.to_lowercase().contains("tikkie"))
        .unwrap_or(false);

    if is_payment_request {
        // A payment request settled by transfer: the true counterparty is
        // named inside the memo, not in the Naam field.
        let memo_text = memo.unwrap_or_default();
        let pattern = grammar(
            r"(?i)^Tikkie ID (?:[0-9 ]+), ?(?P<memo>.+), ?Van ?(?P<name>[\w\s.]+),? ?(?P<trailer>.*)$",
        );
        let request = pattern
            .captures(&memo_text)
            .ok_or_else(|| ImportError::UnrecognizedFormat(description.to_string()))?;

        out.kind = TransactionKind::PaymentRequest;
        out.details.memo = capture(&request, "memo");
        out.staging.name = capture(&request, "name");
        out.staging.iban = capture(&request, "trailer").and_then(|t| find_iban(&t));
        out.staging.bank_marker = Some("tikkie".to_string());
    } else {
        out.kind = TransactionKind::Transfer;
        out.details.memo = memo;
        out.staging.name = name;
        out.staging.iban = capture(caps, "iban");
        out.staging.bic = capture(caps, "bic");
    }
    Ok(out)
}

fn build_direct_debit(caps: &Captures, mut out: Classified) -> Classified {
    out.kind = TransactionKind::DirectDebit;
    out.details.creditor = capture(caps, "creditor");
    out.details.mandate = capture(caps, "mandate");
    out.details.memo = capture(caps, "memo");
    out.details.reference = keep_reference(capture(caps, "reference"));
    out.staging.name = capture(caps, "name");
    out.staging.iban = capture(caps, "iban");
    out.staging.bic = capture(caps, "bic");
    out
}

/// Markers that route an iDEAL booking through the payment-request path.
const PAYMENT_REQUEST_MARKERS: &[&str] = &["betaalverzoek", "tikkie", "bunq b.v.", "abn amro"];

fn build_ideal(
    caps: &Captures,
    mut out: Classified,
    description: &str,
) -> Result<Classified, ImportError> {
    let raw_timestamp = caps["timestamp"].trim();
    out.timestamp = NaiveDateTime::parse_from_str(raw_timestamp, "%d-%m-%Y %H:%M")
        .map_err(|_| ImportError::UnrecognizedFormat(description.to_string()))?;

    let name = capture(caps, "name").unwrap_or_default();
    let memo = capture(caps, "memo").unwrap_or_default();
    let reference = keep_reference(capture(caps, "reference"));

    let folded_name = name.to_lowercase();
    let folded_memo = memo.to_lowercase();
    let is_payment_request = PAYMENT_REQUEST_MARKERS
        .iter()
        .any(|marker| folded_name.contains(marker) || folded_memo.contains(marker));

    if is_payment_request {
        out.kind = TransactionKind::PaymentRequest;
        out.details.reference = reference.clone();
        dissect_request_memo(&mut out, &name, &memo, reference.as_deref());
    } else {
        out.kind = TransactionKind::IdealPayment;
        out.details.memo = Some(memo).filter(|m| !m.is_empty());
        out.details.reference = reference;
        out.staging.name = Some(name).filter(|n| !n.is_empty());
        out.staging.iban = capture(caps, "iban");
        out.staging.bic = capture(caps, "bic");
    }
    Ok(out)
}

/// Every requesting bank wraps the payer's name, IBAN and the reference into
/// the memo in its own order; pick the layout by the bank marker present.
fn dissect_request_memo(out: &mut Classified, name: &str, memo: &str, reference: Option<&str>) {
    let folded_name = name.to_lowercase();
    let folded_memo = memo.to_lowercase();
    let iban = find_iban(memo);

    if folded_name.contains("asn") {
        out.staging.bank_marker = Some("asn".to_string());
        out.staging.name = memo.split_whitespace().next().map(|s| s.to_string());
        if let Some(found) = &iban {
            out.details.memo = memo
                .splitn(2, found.as_str())
                .nth(1)
                .map(|rest| rest.trim().to_string())
                .filter(|rest| !rest.is_empty());
        }
    } else if folded_memo.contains("tikkie")
        || folded_name.contains("tikkie")
        || folded_name.contains("abn amro")
    {
        out.staging.bank_marker = Some("tikkie".to_string());
        // The reference may have been re-wrapped with interior spaces;
        // squeeze them out until the verbatim token appears.
        if let (Some(found), Some(token)) = (&iban, reference) {
            if let Some(squeezed) = strip_spaces_until_contains(memo, token) {
                out.staging.name = squeezed
                    .splitn(2, token)
                    .nth(1)
                    .and_then(|after| after.split(found.as_str()).next())
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty());
            }
        }
    } else if folded_memo.contains("rabo") {
        out.staging.bank_marker = Some("rabo".to_string());
        if let Some(token) = reference {
            out.staging.name = memo
                .splitn(2, token)
                .nth(1)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
        }
    } else if folded_memo.contains("bunq") {
        out.staging.bank_marker = Some("bunq".to_string());
        if let Some(found) = &iban {
            let after_iban = memo.splitn(2, found.as_str()).nth(1).unwrap_or("");
            let before_reference = match reference {
                Some(token) => after_iban.split(token).next().unwrap_or(after_iban),
                None => after_iban,
            };
            out.staging.name = Some(before_reference.trim().to_string()).filter(|n| !n.is_empty());
        }
    } else if folded_memo.contains("ingb") {
        out.staging.bank_marker = Some("ingb".to_string());
        if let Some(found) = &iban {
            out.staging.name = memo
                .split(found.as_str())
                .next()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
        }
        if let Some(token) = reference {
            out.details.memo = memo
                .splitn(2, token)
                .nth(1)
                .and_then(|after| after.split("ING").next())
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty());
        }
    } else {
        // marker only occurred in the Naam field; keep it as the evidence
        out.staging.name = Some(name.to_string()).filter(|n| !n.is_empty());
    }
    out.staging.iban = iban;
}

// ============================================================================
// REFERENCE LOCATOR
// ============================================================================

/// Remove the first `count` spaces of `text`, wherever they sit.
fn strip_first_spaces(text: &str, count: usize) -> String {
    let mut removed = 0;
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == ' ' && removed < count {
            removed += 1;
            continue;
        }
        out.push(ch);
    }
    out
}

/// Locate a known token inside text that may have re-wrapped it with
/// interior spaces: progressively strip 0..k spaces until the verbatim
/// token appears, bounded by the text's own space count.
pub fn strip_spaces_until_contains(text: &str, token: &str) -> Option<String> {
    let spaces = text.matches(' ').count();
    for count in 0..=spaces {
        let candidate = strip_first_spaces(text, count);
        if candidate.contains(token) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new("ABN AMRO")
    }

    fn row(description: &str, amount: f64) -> StatementRow {
        StatementRow {
            description: description.to_string(),
            amount,
            start_balance: 100.00,
            end_balance: 100.00 + amount,
            value_date: "20240201".to_string(),
            currency: "EUR".to_string(),
        }
    }

    #[test]
    fn test_card_payment_scenario() {
        let classified = classifier()
            .classify(&row(
                "BEA, Betaalpas SUPER MARKT,PAS123 NR:T001 01.02.24/10:30 AMSTERDAM",
                -12.34,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::CardPayment);
        assert_eq!(classified.amount, -1234);
        assert_eq!(classified.staging.name.as_deref(), Some("SUPER MARKT"));
        assert_eq!(classified.staging.place.as_deref(), Some("AMSTERDAM"));
        assert_eq!(classified.staging.country, None);
        assert_eq!(classified.details.card_number.as_deref(), Some("123"));
        assert_eq!(classified.details.terminal.as_deref(), Some("T001"));
        assert_eq!(
            classified.timestamp,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_cash_withdrawal_with_country_marker() {
        let classified = classifier()
            .classify(&row(
                "GEA, Betaalpas GELDMAAT KOELN,PAS123 NR:491823 03.02.24/14.05 KOELN, land:DEU",
                -100.00,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::CashWithdrawal);
        assert_eq!(classified.staging.place.as_deref(), Some("KOELN"));
        assert_eq!(classified.staging.country.as_deref(), Some("DEU"));
        // dotted time variant parses too
        assert_eq!(
            classified.timestamp,
            NaiveDate::from_ymd_opt(2024, 2, 3)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_transfer_scenario() {
        let classified = classifier()
            .classify(&row(
                "SEPA Overboeking IBAN: NL00BANK0123456789 BIC: ABCDEFGH Naam: J JANSEN Omschrijving: huur",
                -750.00,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::Transfer);
        assert_eq!(classified.amount, -75000);
        assert_eq!(classified.staging.name.as_deref(), Some("J JANSEN"));
        assert_eq!(
            classified.staging.iban.as_deref(),
            Some("NL00BANK0123456789")
        );
        assert_eq!(classified.details.memo.as_deref(), Some("huur"));
    }

    #[test]
    fn test_transfer_variant_with_reference_and_memo() {
        let classified = classifier()
            .classify(&row(
                "SEPA Overboeking IBAN: NL00BANK0123456789 BIC: ABCDEFGH Naam: VERHUURDER BV Omschrijving: huur maart Kenmerk: 2024-03-001",
                -750.00,
            ))
            .unwrap();

        assert_eq!(classified.details.memo.as_deref(), Some("huur maart"));
        assert_eq!(classified.details.reference.as_deref(), Some("2024-03-001"));
    }

    #[test]
    fn test_transfer_bare_variant() {
        let classified = classifier()
            .classify(&row(
                "SEPA Overboeking IBAN: NL00BANK0123456789 BIC: ABCDEFGH Naam: J JANSEN",
                25.00,
            ))
            .unwrap();
        assert_eq!(classified.kind, TransactionKind::Transfer);
        assert_eq!(classified.details.memo, None);
    }

    #[test]
    fn test_transfer_slash_layout() {
        let classified = classifier()
            .classify(&row(
                "/TRTP/SEPA OVERBOEKING/IBAN/NL00BANK0123456789/BIC/ABCDEFGH/NAME/J JANSEN/REMI/huur/EREF/NOTPROVIDED",
                -750.00,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::Transfer);
        assert_eq!(classified.staging.name.as_deref(), Some("J JANSEN"));
        assert_eq!(classified.details.memo.as_deref(), Some("huur"));
        // NOTPROVIDED is the absence of a reference
        assert_eq!(classified.details.reference, None);
    }

    #[test]
    fn test_tikkie_inside_transfer_memo_is_a_payment_request() {
        let classified = classifier()
            .classify(&row(
                "SEPA Overboeking IBAN: NL11BANK0000000022 BIC: ABCDEFGH Naam: AAB retail iDEAL Omschrijving: Tikkie ID 012345678901, etentje, Van P DE VRIES, NL22BANK0123456780",
                15.50,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::PaymentRequest);
        assert_eq!(classified.details.memo.as_deref(), Some("etentje"));
        assert_eq!(classified.staging.name.as_deref(), Some("P DE VRIES"));
        assert_eq!(
            classified.staging.iban.as_deref(),
            Some("NL22BANK0123456780")
        );
        assert_eq!(classified.staging.bank_marker.as_deref(), Some("tikkie"));
    }

    #[test]
    fn test_ideal_payment_with_embedded_timestamp() {
        let classified = classifier()
            .classify(&row(
                "SEPA iDEAL IBAN: NL33KOOP0000000033 BIC: KOOPNL2A Naam: Webwinkel BV Omschrijving: bestelling 8872 Kenmerk: 01-02-2024 18:04 0050001234567890",
                -45.99,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::IdealPayment);
        assert_eq!(classified.staging.name.as_deref(), Some("Webwinkel BV"));
        assert_eq!(classified.details.memo.as_deref(), Some("bestelling 8872"));
        assert_eq!(
            classified.details.reference.as_deref(),
            Some("0050001234567890")
        );
        assert_eq!(
            classified.timestamp,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(18, 4, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_ideal_payment_request_ing_layout() {
        let classified = classifier()
            .classify(&row(
                "SEPA iDEAL IBAN: NL44BETL0000000044 BIC: BETLNL2A Naam: Betaalverzoek Omschrijving: K BAKKER NL55INGB0000000055 5VQ7201 cadeau ING Betaalverzoek Kenmerk: 01-02-2024 12:00 5VQ7201",
                -10.00,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::PaymentRequest);
        assert_eq!(classified.staging.bank_marker.as_deref(), Some("ingb"));
        assert_eq!(classified.staging.name.as_deref(), Some("K BAKKER"));
        assert_eq!(
            classified.staging.iban.as_deref(),
            Some("NL55INGB0000000055")
        );
        assert_eq!(classified.details.memo.as_deref(), Some("cadeau"));
    }

    #[test]
    fn test_direct_debit_labeled_layout() {
        let classified = classifier()
            .classify(&row(
                "SEPA Incasso algemeen doorlopend Incassant: NL93ZZZ011234560000 Naam: Energie NV Machtiging: M-2023-001 Omschrijving: termijn februari IBAN: NL66ENER0000000066 Kenmerk: F-2024-02",
                -120.00,
            ))
            .unwrap();

        assert_eq!(classified.kind, TransactionKind::DirectDebit);
        assert_eq!(
            classified.details.creditor.as_deref(),
            Some("NL93ZZZ011234560000")
        );
        assert_eq!(classified.details.mandate.as_deref(), Some("M-2023-001"));
        assert_eq!(classified.details.memo.as_deref(), Some("termijn februari"));
        assert_eq!(classified.details.reference.as_deref(), Some("F-2024-02"));
        assert_eq!(classified.staging.name.as_deref(), Some("Energie NV"));
    }

    #[test]
    fn test_interest_and_fee_rows() {
        let interest = classifier().classify(&row("Rente spaarrekening", 1.23)).unwrap();
        assert_eq!(interest.kind, TransactionKind::Interest);
        assert_eq!(
            interest.details.memo.as_deref(),
            Some("Rente spaarrekening")
        );

        let fee = classifier()
            .classify(&row("ABN AMRO Bank N.V. kosten betaalpakket", -1.95))
            .unwrap();
        assert_eq!(fee.kind, TransactionKind::BankFee);
    }

    #[test]
    fn test_unrecognized_format_is_fatal_and_carries_text() {
        let err = classifier()
            .classify(&row("GIRO 1234 OLD FORMAT", -5.00))
            .unwrap_err();
        assert_eq!(
            err,
            ImportError::UnrecognizedFormat("GIRO 1234 OLD FORMAT".to_string())
        );
    }

    #[test]
    fn test_foreign_currency_is_rejected() {
        let mut foreign = row("Rente", 1.00);
        foreign.currency = "USD".to_string();
        let err = classifier().classify(&foreign).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedCurrency { .. }));
    }

    #[test]
    fn test_invalid_value_date_is_rejected() {
        let mut bad = row("Rente", 1.00);
        bad.value_date = "2024-02-01".to_string();
        let err = classifier().classify(&bad).unwrap_err();
        assert_eq!(
            err,
            ImportError::InvalidValueDate("2024-02-01".to_string())
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let input = row(
            "SEPA Overboeking IBAN: NL00BANK0123456789 BIC: ABCDEFGH Naam: J JANSEN Omschrijving: huur",
            -750.00,
        );
        let first = classifier().classify(&input).unwrap();
        let second = classifier().classify(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.details).unwrap(),
            serde_json::to_string(&second.details).unwrap()
        );
    }

    #[test]
    fn test_strip_spaces_until_contains() {
        // token "AB12CD" got re-wrapped as "AB 12 CD"
        assert_eq!(
            strip_spaces_until_contains("x AB 12 CD y", "AB12CD"),
            Some("xAB12CD y".to_string())
        );
        assert_eq!(strip_spaces_until_contains("nothing here", "AB12CD"), None);
        // zero strips needed
        assert_eq!(
            strip_spaces_until_contains("pre AB12CD post", "AB12CD"),
            Some("pre AB12CD post".to_string())
        );
    }

    #[test]
    fn test_strip_first_spaces_removes_leftmost_occurrences() {
        assert_eq!(strip_first_spaces("a b c d", 2), "abc d");
        assert_eq!(strip_first_spaces("a b", 5), "ab");
    }
}
