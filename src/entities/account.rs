// Own-account configuration.
//
// Accounts are opened from configuration, never created by the pipeline.
// Two variants: a regular bank account (has an IBAN, appears in incoming
// transfer resolution) and a loan (journal against a creditor).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::counterparty::EntityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountKind {
    BankAccount {
        /// Registry id of the bank holding the account.
        bank: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iban: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<String>,
    },
    Loan {
        /// Registry id of the creditor.
        creditor: EntityId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub name: String,

    #[serde(flatten)]
    pub kind: AccountKind,

    pub active_from: NaiveDate,

    /// Set once the account is closed; a closed account still loads and
    /// projects, it just receives no new rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_to: Option<NaiveDate>,
}

impl AccountMeta {
    pub fn iban(&self) -> Option<&str> {
        match &self.kind {
            AccountKind::BankAccount { iban, .. } => iban.as_deref(),
            AccountKind::Loan { .. } => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_to.is_none()
    }
}
