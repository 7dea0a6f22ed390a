// Import pipeline - one statement row at a time.
//
// classify -> resolve -> enrich -> append, fully sequential; a row is
// appended before the next is looked at. The only suspension point is the
// enrichment workflow's blocking call into the decision source.
//
// Fatal errors abort the whole batch. Rows already appended stay in memory;
// nothing is persisted here - the caller flushes registries and ledgers only
// after the batch returns Ok (atomic per import batch).

use crate::classifier::{Classifier, StatementRow};
use crate::enrichment::{self, DecisionSource};
use crate::error::ImportError;
use crate::ledger::{LedgerSet, Transaction};
use crate::registry::Registries;
use crate::resolver;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub appended: usize,
}

pub struct Pipeline<'a> {
    classifier: Classifier,
    registries: &'a mut Registries,
    decisions: &'a mut dyn DecisionSource,
}

impl<'a> Pipeline<'a> {
    pub fn new(registries: &'a mut Registries, decisions: &'a mut dyn DecisionSource) -> Self {
        let classifier = Classifier::new(&registries.profile.fee_prefix);
        Pipeline {
            classifier,
            registries,
            decisions,
        }
    }

    /// Run one batch of statement rows into the given account's ledger.
    pub fn import(
        &mut self,
        account: &str,
        rows: &[StatementRow],
        ledgers: &mut LedgerSet,
    ) -> Result<ImportSummary, ImportError> {
        if !self.registries.accounts.contains_key(account) {
            return Err(ImportError::UnknownAccount(account.to_string()));
        }

        let mut appended = 0;
        for row in rows {
            let classified = self.classifier.classify(row)?;

            let mut tx = Transaction::new(
                classified.kind,
                classified.amount,
                classified.start_balance,
                classified.end_balance,
                classified.timestamp,
            )?;
            tx.details = classified.details;
            tx.staging = classified.staging;

            resolver::resolve(&mut tx, self.registries)?;
            enrichment::enrich(&mut tx, self.registries, self.decisions)?;

            tracing::info!(account, transaction = %tx, "appending");
            ledgers.append(account, tx)?;
            appended += 1;
        }

        tracing::info!(account, rows = appended, "batch complete");
        Ok(ImportSummary { appended })
    }
}
