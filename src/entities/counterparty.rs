// Counterparties - the other side of a transaction.
//
// Four kinds with one shared learning mechanism: every kind carries alias
// lists (IBANs, account numbers, synonyms) that grow as statements are
// imported, so the next occurrence of the same raw string resolves silently.

use serde::{Deserialize, Serialize};

/// Registry-wide entity identifier (UUID v4 as a string).
pub type EntityId = String;

pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// KIND DISCRIMINANT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyKind {
    Person,
    Company,
    Bank,
    PaymentProcessor,
}

impl CounterpartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyKind::Person => "person",
            CounterpartyKind::Company => "company",
            CounterpartyKind::Bank => "bank",
            CounterpartyKind::PaymentProcessor => "payment processor",
        }
    }
}

// ============================================================================
// PERSON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,

    /// Free-form grouping label ("family", "colleagues", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ibans: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_numbers: Vec<String>,

    /// Legacy postgiro numbers, still seen on old statements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub giro_numbers: Vec<String>,
}

impl Person {
    pub fn new(name: String) -> Self {
        Person {
            name,
            group: None,
            ibans: Vec::new(),
            account_numbers: Vec::new(),
            giro_numbers: Vec::new(),
        }
    }

    pub fn add_iban(&mut self, iban: String) {
        if !self.ibans.contains(&iban) {
            self.ibans.push(iban);
        }
    }
}

// ============================================================================
// COMPANY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,

    /// Casefolded raw-statement spellings that map to this company.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    /// Category assigned to every transaction with this company, unless a
    /// more specific rule already set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category: Option<EntityId>,

    /// Excluded companies are kept in the ledger but left out of the
    /// tabular projection handed to reporting.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ibans: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_numbers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub giro_numbers: Vec<String>,
}

impl Company {
    pub fn new(name: String) -> Self {
        Company {
            name,
            synonyms: Vec::new(),
            default_category: None,
            exclude: false,
            ibans: Vec::new(),
            account_numbers: Vec::new(),
            giro_numbers: Vec::new(),
        }
    }

    /// Synonyms are matched casefolded; store them that way.
    pub fn add_synonym(&mut self, raw: &str) {
        let folded = raw.to_lowercase();
        if folded != self.name.to_lowercase() && !self.synonyms.contains(&folded) {
            self.synonyms.push(folded);
        }
    }

    pub fn add_iban(&mut self, iban: String) {
        if !self.ibans.contains(&iban) {
            self.ibans.push(iban);
        }
    }

    pub fn matches_name(&self, raw: &str) -> bool {
        let folded = raw.to_lowercase();
        self.name.to_lowercase() == folded || self.synonyms.iter().any(|s| *s == folded)
    }
}

// ============================================================================
// BANK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankParty {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ibans: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_numbers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bics: Vec<String>,
}

impl BankParty {
    pub fn new(name: String) -> Self {
        BankParty {
            name,
            synonyms: Vec::new(),
            ibans: Vec::new(),
            account_numbers: Vec::new(),
            bics: Vec::new(),
        }
    }

    /// Case-insensitive marker match against name or synonyms, used to tie a
    /// payment-request memo to the requesting bank.
    pub fn matches_marker(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        folded.contains(&self.name.to_lowercase())
            || self.synonyms.iter().any(|s| folded.contains(s.as_str()))
    }
}

// ============================================================================
// PAYMENT PROCESSOR
// ============================================================================

/// An intermediary whose name or IBAN shows up on the statement in place of
/// the true counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProcessor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ibans: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_numbers: Vec<String>,
}

impl PaymentProcessor {
    pub fn new(name: String) -> Self {
        PaymentProcessor {
            name,
            synonyms: Vec::new(),
            exclude: false,
            ibans: Vec::new(),
            account_numbers: Vec::new(),
        }
    }

    /// Substring match on name/synonyms, exact match on IBAN.
    pub fn matches(&self, name: &str, iban: Option<&str>) -> bool {
        let folded = name.to_lowercase();
        if folded.contains(&self.name.to_lowercase()) {
            return true;
        }
        if self.synonyms.iter().any(|s| folded.contains(s.as_str())) {
            return true;
        }
        if let Some(iban) = iban {
            if self.ibans.iter().any(|known| known == iban) {
                return true;
            }
        }
        false
    }

    /// Learn a freshly observed IBAN. Returns true when the list grew.
    pub fn add_iban(&mut self, iban: String) -> bool {
        if self.ibans.contains(&iban) {
            return false;
        }
        self.ibans.push(iban);
        true
    }
}

// ============================================================================
// TAGGED UNION
// ============================================================================

/// A counterparty of any kind, as handed to resolution sites and the
/// projection. Matching on this enum is exhaustive everywhere by design of
/// the type, no dispatch table needed.
#[derive(Debug, Clone, PartialEq)]
pub enum Counterparty<'a> {
    Person(&'a Person),
    Company(&'a Company),
    Bank(&'a BankParty),
    PaymentProcessor(&'a PaymentProcessor),
}

impl<'a> Counterparty<'a> {
    pub fn kind(&self) -> CounterpartyKind {
        match self {
            Counterparty::Person(_) => CounterpartyKind::Person,
            Counterparty::Company(_) => CounterpartyKind::Company,
            Counterparty::Bank(_) => CounterpartyKind::Bank,
            Counterparty::PaymentProcessor(_) => CounterpartyKind::PaymentProcessor,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Counterparty::Person(p) => &p.name,
            Counterparty::Company(c) => &c.name,
            Counterparty::Bank(b) => &b.name,
            Counterparty::PaymentProcessor(p) => &p.name,
        }
    }

    pub fn excluded(&self) -> bool {
        match self {
            Counterparty::Company(c) => c.exclude,
            Counterparty::PaymentProcessor(p) => p.exclude,
            Counterparty::Person(_) | Counterparty::Bank(_) => false,
        }
    }
}
