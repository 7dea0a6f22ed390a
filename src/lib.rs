// Bankline - Core Library
// Exposes all modules for use in the CLI and tests

pub mod classifier;
pub mod enrichment;
pub mod entities;
pub mod error;
pub mod iban;
pub mod ledger;
pub mod money;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod store;

// Re-export commonly used types
pub use classifier::{Classified, Classifier, StatementRow};
pub use enrichment::{DecisionSource, Scripted, ScriptedDecisions, TerminalDecisions};
pub use entities::{
    AccountKind, AccountMeta, BankParty, Category, Company, Counterparty, CounterpartyKind,
    Country, EntityId, Location, MainCategory, PaymentProcessor, Person,
    INTERNAL_TRANSFER_CATEGORY,
};
pub use error::ImportError;
pub use ledger::{
    Details, Ledger, LedgerSet, ProjectedTransaction, Staging, Transaction, TransactionKind,
};
pub use money::{format_eur, to_minor_units, ForeignAmount, HOME_CURRENCY};
pub use pipeline::{ImportSummary, Pipeline};
pub use registry::{Profile, Registries};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
