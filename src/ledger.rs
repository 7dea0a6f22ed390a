// Ledgers - per-account, append-only journals.
//
// Two invariants carry the whole design:
//   1. per transaction: end_balance == start_balance + amount (checked at
//      construction, re-checked at append)
//   2. per ledger: transaction[i].start_balance == transaction[i-1].end_balance
// Violations are fatal and mutate nothing.
//
// An internal transfer between two own accounts is one logical event: the
// second ledger to see it reuses the first ledger's transaction identifier.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::entities::{AccountMeta, EntityId, INTERNAL_TRANSFER_CATEGORY};
use crate::error::ImportError;
use crate::money::{format_eur, ForeignAmount};
use crate::registry::Registries;
use crate::store;

// ============================================================================
// TRANSACTION KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Interest,
    CardPayment,
    CashWithdrawal,
    Transfer,
    DirectDebit,
    IdealPayment,
    PaymentRequest,
    BankFee,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Interest => "interest",
            TransactionKind::CardPayment => "card payment",
            TransactionKind::CashWithdrawal => "cash withdrawal",
            TransactionKind::Transfer => "transfer",
            TransactionKind::DirectDebit => "direct debit",
            TransactionKind::IdealPayment => "ideal payment",
            TransactionKind::PaymentRequest => "payment request",
            TransactionKind::BankFee => "bank fee",
        }
    }
}

// ============================================================================
// DETAILS
// ============================================================================

/// Type-specific attributes of a transaction. Everything is optional; empty
/// fields stay out of the persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Details {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,

    /// End-to-end payment reference from the statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,

    /// Resolved registry ids (card transactions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<EntityId>,

    /// Payment processor that sat between the counterparty and us.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<EntityId>,

    /// Bank behind a payment request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<EntityId>,

    /// Direct-debit creditor identifier as printed on the statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandate: Option<String>,

    /// Original foreign-currency amount, when the row was converted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign: Option<ForeignAmount>,

    /// Named components of an income booking (gross, allowances, ...),
    /// in minor units.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub income: BTreeMap<String, i64>,
}

impl Details {
    pub fn is_empty(&self) -> bool {
        *self == Details::default()
    }
}

// ============================================================================
// STAGING
// ============================================================================

/// Raw pre-resolution evidence carried from the classifier to the resolver
/// and the enrichment workflow. Never persisted: `Transaction` skips this
/// field during serialization and `append` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Staging {
    pub name: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub place: Option<String>,
    pub country: Option<String>,
    /// Free-text marker naming the bank behind a payment request.
    pub bank_marker: Option<String>,
}

// ============================================================================
// TRANSACTION
// ============================================================================

mod timestamp_format {
    // Date-only timestamps persist as "2024-02-01"; card and iDEAL rows
    // carry a time of day and persist as "2024-02-01T10:30".
    use chrono::{NaiveDate, NaiveDateTime, Timelike};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        timestamp: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = if timestamp.hour() == 0 && timestamp.minute() == 0 {
            timestamp.format("%Y-%m-%d").to_string()
        } else {
            timestamp.format("%Y-%m-%dT%H:%M").to_string()
        };
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.len() == 10 {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap())
                .map_err(serde::de::Error::custom)
        } else {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M").map_err(serde::de::Error::custom)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Position in the owning ledger, assigned by `append`.
    #[serde(default)]
    pub index: usize,

    pub amount: i64,
    pub start_balance: i64,
    pub end_balance: i64,

    pub kind: TransactionKind,

    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,

    /// How many transactions with the same date precede this one in the
    /// owning ledger. Assigned by `append`.
    #[serde(default)]
    pub day_index: usize,

    /// None means unresolved, pending enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub details: Details,

    #[serde(skip)]
    pub staging: Staging,
}

impl Transaction {
    /// Build a transaction, enforcing `end == start + amount`.
    pub fn new(
        kind: TransactionKind,
        amount: i64,
        start_balance: i64,
        end_balance: i64,
        timestamp: NaiveDateTime,
    ) -> Result<Self, ImportError> {
        if end_balance != start_balance + amount {
            return Err(ImportError::BalanceMismatch {
                start: start_balance,
                amount,
                end: end_balance,
            });
        }
        Ok(Transaction {
            index: 0,
            amount,
            start_balance,
            end_balance,
            kind,
            timestamp,
            day_index: 0,
            category: None,
            counterparty: None,
            details: Details::default(),
            staging: Staging::default(),
        })
    }

    pub fn is_internal_transfer(&self) -> bool {
        self.category.as_deref() == Some(INTERNAL_TRANSFER_CATEGORY)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.amount < 0 { "debit" } else { "credit" };
        let when = if self.timestamp.hour() == 0 && self.timestamp.minute() == 0 {
            self.timestamp.format("%Y-%m-%d").to_string()
        } else {
            self.timestamp.format("%Y-%m-%d %H:%M").to_string()
        };
        write!(
            f,
            "{direction} of {} on {when} ({})",
            format_eur(self.amount),
            self.kind.as_str()
        )
    }
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug)]
pub struct Ledger {
    pub account: EntityId,
    pub meta: AccountMeta,
    transactions: HashMap<String, Transaction>,
}

impl Ledger {
    pub fn new(account: EntityId, meta: AccountMeta) -> Self {
        Ledger {
            account,
            meta,
            transactions: HashMap::new(),
        }
    }

    /// Load the persisted journal and re-validate the whole chain; a
    /// corrupted document is rejected, not trusted.
    pub fn open(base: &Path, account: EntityId, meta: AccountMeta) -> anyhow::Result<Self> {
        let transactions: HashMap<String, Transaction> =
            store::open_document_or(base, "ledgers", &account)?;
        let ledger = Ledger {
            account,
            meta,
            transactions,
        };
        ledger
            .validate_chain()
            .with_context(|| format!("persisted ledger {} failed validation", ledger.account))?;
        Ok(ledger)
    }

    pub fn save(&self, base: &Path) -> anyhow::Result<()> {
        store::save_document(base, "ledgers", &self.account, &self.transactions)
    }

    /// Transactions ordered by ledger index. A fresh, finite projection,
    /// not a live view.
    pub fn transaction_list(&self) -> Vec<&Transaction> {
        let mut list: Vec<&Transaction> = self.transactions.values().collect();
        list.sort_by_key(|tx| tx.index);
        list
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn tail(&self) -> Option<&Transaction> {
        self.transactions.values().max_by_key(|tx| tx.index)
    }

    /// Current balance; an empty ledger stands at zero.
    pub fn balance(&self) -> i64 {
        self.tail().map(|tx| tx.end_balance).unwrap_or(0)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.transactions.contains_key(id)
    }

    /// (identifier, transaction) pairs ordered by ledger index.
    pub fn entries(&self) -> Vec<(&String, &Transaction)> {
        let mut list: Vec<(&String, &Transaction)> = self.transactions.iter().collect();
        list.sort_by_key(|(_, tx)| tx.index);
        list
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// The other half of an internal transfer: same date, exactly opposite
    /// amount, sentinel category, and not yet referenced by `other`.
    pub fn find_transfer_mirror(
        &self,
        timestamp: NaiveDateTime,
        amount: i64,
        other: &Ledger,
    ) -> Option<String> {
        self.transactions
            .iter()
            .find(|(id, tx)| {
                tx.is_internal_transfer()
                    && tx.timestamp == timestamp
                    && tx.amount == amount
                    && !other.contains_id(id)
            })
            .map(|(id, _)| id.clone())
    }

    /// Append one transaction. Both balance checks run before any mutation;
    /// on success the next contiguous index and the same-day index are
    /// assigned and the staging bag is dropped.
    pub fn append(
        &mut self,
        mut transaction: Transaction,
        shared_id: Option<String>,
    ) -> Result<String, ImportError> {
        if let Some(tail) = self.tail() {
            if transaction.start_balance != tail.end_balance {
                return Err(ImportError::ChainViolation {
                    expected: tail.end_balance,
                    found: transaction.start_balance,
                });
            }
        }
        if transaction.end_balance != transaction.start_balance + transaction.amount {
            return Err(ImportError::BalanceMismatch {
                start: transaction.start_balance,
                amount: transaction.amount,
                end: transaction.end_balance,
            });
        }

        transaction.index = self.transactions.len();
        transaction.day_index = self
            .transactions
            .values()
            .filter(|existing| existing.timestamp.date() == transaction.timestamp.date())
            .count();
        transaction.staging = Staging::default();

        let id = shared_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.transactions.insert(id.clone(), transaction);
        Ok(id)
    }

    /// Check index contiguity, per-transaction balance equations, and the
    /// balance chain over the full history.
    pub fn validate_chain(&self) -> Result<(), ImportError> {
        let list = self.transaction_list();
        for (position, tx) in list.iter().enumerate() {
            if tx.index != position {
                return Err(ImportError::BrokenIndex {
                    ledger: self.account.clone(),
                    position,
                });
            }
            if tx.end_balance != tx.start_balance + tx.amount {
                return Err(ImportError::BalanceMismatch {
                    start: tx.start_balance,
                    amount: tx.amount,
                    end: tx.end_balance,
                });
            }
            if position > 0 && tx.start_balance != list[position - 1].end_balance {
                return Err(ImportError::ChainViolation {
                    expected: list[position - 1].end_balance,
                    found: tx.start_balance,
                });
            }
        }
        Ok(())
    }

    /// Flat tabular record per transaction, with every id resolved to its
    /// registry name. This is the only contract the reporting side sees.
    /// Rows against an excluded company are left out.
    pub fn project(&self, registries: &Registries) -> Vec<ProjectedTransaction> {
        self.transaction_list()
            .into_iter()
            .filter_map(|tx| project_one(tx, registries))
            .collect()
    }
}

// ============================================================================
// TABULAR PROJECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedTransaction {
    pub index: usize,
    pub amount: i64,
    pub start_balance: i64,
    pub end_balance: i64,
    pub kind: &'static str,
    pub date: String,
    pub main_category: Option<String>,
    pub category: Option<String>,
    pub counterparty: Option<String>,
    pub counterparty_kind: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn project_one(tx: &Transaction, registries: &Registries) -> Option<ProjectedTransaction> {
    let (counterparty, counterparty_kind) = match tx.counterparty.as_deref() {
        Some(id) => {
            if let Some(meta) = registries.accounts.get(id) {
                (Some(meta.name.clone()), Some("own account".to_string()))
            } else {
                match registries.counterparty(id) {
                    Some(view) => {
                        if view.excluded() {
                            return None;
                        }
                        (
                            Some(view.name().to_string()),
                            Some(view.kind().as_str().to_string()),
                        )
                    }
                    None => (None, None),
                }
            }
        }
        None => (None, None),
    };

    let category = tx
        .category
        .as_deref()
        .and_then(|id| registries.categories.get(id));
    let main_category = category
        .and_then(|cat| registries.main_categories.get(&cat.main_category))
        .map(|main| main.name.clone());

    let location = tx
        .details
        .location
        .as_deref()
        .and_then(|id| registries.locations.get(id));
    let country = tx
        .details
        .country
        .as_deref()
        .and_then(|id| registries.countries.get(id));

    Some(ProjectedTransaction {
        index: tx.index,
        amount: tx.amount,
        start_balance: tx.start_balance,
        end_balance: tx.end_balance,
        kind: tx.kind.as_str(),
        date: tx.timestamp.format("%Y-%m-%d").to_string(),
        main_category,
        category: category.map(|cat| cat.name.clone()),
        counterparty,
        counterparty_kind,
        location: location.map(|loc| loc.name.clone()),
        country: country.map(|c| c.name.clone()),
        latitude: location.map(|loc| loc.latitude),
        longitude: location.map(|loc| loc.longitude),
    })
}

// ============================================================================
// LEDGER SET
// ============================================================================

/// Every own-account ledger of the run, loaded together so internal
/// transfers can be deduplicated across accounts.
#[derive(Debug, Default)]
pub struct LedgerSet {
    ledgers: HashMap<EntityId, Ledger>,
}

impl LedgerSet {
    pub fn new() -> Self {
        LedgerSet::default()
    }

    pub fn open_all(base: &Path, accounts: &HashMap<EntityId, AccountMeta>) -> anyhow::Result<Self> {
        let mut set = LedgerSet::new();
        for (id, meta) in accounts {
            set.insert(Ledger::open(base, id.clone(), meta.clone())?);
        }
        Ok(set)
    }

    pub fn insert(&mut self, ledger: Ledger) {
        self.ledgers.insert(ledger.account.clone(), ledger);
    }

    pub fn get(&self, account: &str) -> Option<&Ledger> {
        self.ledgers.get(account)
    }

    pub fn get_mut(&mut self, account: &str) -> Option<&mut Ledger> {
        self.ledgers.get_mut(account)
    }

    pub fn save_all(&self, base: &Path) -> anyhow::Result<()> {
        for ledger in self.ledgers.values() {
            ledger.save(base)?;
        }
        Ok(())
    }

    /// Append into one ledger, reusing the counterpart ledger's transaction
    /// identifier when the row is the second sighting of an internal
    /// transfer.
    pub fn append(
        &mut self,
        account: &str,
        transaction: Transaction,
    ) -> Result<String, ImportError> {
        if !self.ledgers.contains_key(account) {
            return Err(ImportError::UnknownAccount(account.to_string()));
        }

        let shared_id = if transaction.is_internal_transfer() {
            match transaction
                .counterparty
                .as_deref()
                .and_then(|other| self.ledgers.get(other))
            {
                Some(counterpart) => {
                    let own = &self.ledgers[account];
                    counterpart.find_transfer_mirror(
                        transaction.timestamp,
                        -transaction.amount,
                        own,
                    )
                }
                None => None,
            }
        } else {
            None
        };

        self.ledgers
            .get_mut(account)
            .expect("presence checked above")
            .append(transaction, shared_id)
    }
}
