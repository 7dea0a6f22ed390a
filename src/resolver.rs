// Entity and category resolution.
//
// Turns the classifier's staged evidence (raw name, IBAN, place strings)
// into registry identifiers on the transaction. Resolution precedence:
//
//   1. payment-processor indirection (substring/synonym/IBAN), then re-run
//      on the underlying free-text name
//   2. own-account IBAN        -> internal transfer, sentinel category
//   3. person IBAN             -> person, category left to keyword fallback
//   4. company IBAN            -> company, company's default category
//   5. company name/synonym    -> same as 4
//
// Anything still unresolved stays None and is routed to enrichment.

use crate::entities::INTERNAL_TRANSFER_CATEGORY;
use crate::error::ImportError;
use crate::ledger::{Transaction, TransactionKind};
use crate::registry::Registries;

/// Resolve counterparty, category and (for card rows) location ids on a
/// freshly classified transaction. Mutates the registries in one place: a
/// matched payment processor learns every newly observed IBAN.
pub fn resolve(tx: &mut Transaction, registries: &mut Registries) -> Result<(), ImportError> {
    match tx.kind {
        TransactionKind::Interest => {
            tx.counterparty = Some(registries.profile.home_bank.clone());
            tx.category = Some(registries.profile.interest_category.clone());
        }
        TransactionKind::BankFee => {
            tx.counterparty = Some(registries.profile.home_bank.clone());
            tx.category = Some(registries.profile.fee_category.clone());
        }
        TransactionKind::CardPayment | TransactionKind::CashWithdrawal => {
            if tx.kind == TransactionKind::CashWithdrawal {
                tx.category = Some(registries.profile.withdrawal_category.clone());
            }
            resolve_counterparty(tx, registries);
            resolve_location(tx, registries)?;
        }
        TransactionKind::Transfer
        | TransactionKind::IdealPayment
        | TransactionKind::PaymentRequest
        | TransactionKind::DirectDebit => {
            resolve_processor(tx, registries);
            resolve_counterparty(tx, registries);
        }
    }

    if let Some(marker) = tx.staging.bank_marker.clone() {
        tx.details.bank = registries.bank_by_marker(&marker).cloned();
    }

    // Free-text fallback: first keyword hit over the memo, in explicit
    // priority order, but never overriding a counterparty-derived category.
    if tx.category.is_none() {
        if let Some(memo) = tx.details.memo.clone() {
            tx.category = registries.category_by_keyword(&memo).cloned();
        }
    }

    Ok(())
}

/// Payment-processor indirection. When the statement names an intermediary,
/// record it, learn its newly observed IBAN, and drop the structured IBAN
/// from the evidence so the remaining resolution runs on the underlying
/// free-text name alone.
fn resolve_processor(tx: &mut Transaction, registries: &mut Registries) {
    let name = match tx.staging.name.as_deref() {
        Some(name) => name,
        None => return,
    };
    let iban = tx.staging.iban.clone();

    let processor_id = match registries.processor_matching(name, iban.as_deref()) {
        Some(id) => id.clone(),
        None => return,
    };

    tx.details.processor = Some(processor_id.clone());
    if let (Some(observed), Some(processor)) = (iban, registries.processors.get_mut(&processor_id))
    {
        if processor.add_iban(observed.clone()) {
            tracing::debug!(processor = %processor.name, iban = %observed, "learned processor iban");
        }
    }
    // the structured IBAN belongs to the processor, not the counterparty
    tx.staging.iban = None;
}

fn resolve_counterparty(tx: &mut Transaction, registries: &Registries) {
    if let Some(iban) = tx.staging.iban.as_deref() {
        if let Some(account) = registries.account_by_iban(iban) {
            tx.counterparty = Some(account.clone());
            tx.category = Some(INTERNAL_TRANSFER_CATEGORY.to_string());
            return;
        }
        if let Some(person) = registries.person_by_iban(iban) {
            tx.counterparty = Some(person.clone());
            return;
        }
        if let Some(company) = registries.company_by_iban(iban) {
            tx.counterparty = Some(company.clone());
            if tx.category.is_none() {
                tx.category = registries.companies[company].default_category.clone();
            }
            return;
        }
    }
    if let Some(name) = tx.staging.name.as_deref() {
        if let Some(company) = registries.company_by_name(name) {
            tx.counterparty = Some(company.clone());
            if tx.category.is_none() {
                tx.category = registries.companies[company].default_category.clone();
            }
        }
    }
}

/// Card rows only: match the raw place and country strings against the
/// reference registries. No match is an expected gap; two matches is a
/// data-quality fault and fatal.
fn resolve_location(tx: &mut Transaction, registries: &Registries) -> Result<(), ImportError> {
    let country = match tx.staging.country.as_deref() {
        Some(raw) => registries.match_country(raw)?.cloned(),
        // no marker on the statement means the home country
        None => Some(registries.profile.home_country.clone()),
    };
    tx.details.country = country.clone();

    if let (Some(place), Some(country_id)) = (tx.staging.place.as_deref(), country.as_deref()) {
        tx.details.location = registries.match_location(place, country_id)?.cloned();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        AccountKind, AccountMeta, Category, Company, Country, Location, PaymentProcessor, Person,
    };
    use crate::ledger::Staging;
    use chrono::NaiveDate;

    fn fixture() -> Registries {
        let mut registries = Registries::default();

        let nl = registries.insert_country(Country::new("Nederland".to_string(), "NLD".to_string()));
        registries.insert_location(Location::new("Amsterdam".to_string(), nl.clone(), 52.37, 4.90));

        registries.accounts.insert(
            "savings".to_string(),
            AccountMeta {
                name: "spaarrekening".to_string(),
                kind: AccountKind::BankAccount {
                    bank: "homebank".to_string(),
                    iban: Some("NL88SAVE0000000088".to_string()),
                    number: None,
                },
                active_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                active_to: None,
            },
        );

        let mut person = Person::new("J Jansen".to_string());
        person.add_iban("NL00BANK0123456789".to_string());
        registries.persons.insert("jansen".to_string(), person);

        let mut company = Company::new("Super Markt B.V.".to_string());
        company.add_synonym("SUPER MARKT");
        company.add_iban("NL12SUPR0000000012".to_string());
        company.default_category = Some("groceries".to_string());
        registries.companies.insert("supermarkt".to_string(), company);

        let mut processor = PaymentProcessor::new("PayFast".to_string());
        processor.ibans.push("NL11PAYF0000000001".to_string());
        registries.processors.insert("payfast".to_string(), processor);

        let mut rent = Category::new("Huur".to_string(), "wonen".to_string());
        rent.keywords.push("huur".to_string());
        registries.categories.insert("rent".to_string(), rent);

        registries.profile.home_country = nl;
        registries.profile.home_bank = "homebank".to_string();
        registries.profile.interest_category = "cat-interest".to_string();
        registries.profile.fee_category = "cat-fee".to_string();
        registries.profile.withdrawal_category = "cat-cash".to_string();
        registries
    }

    fn transfer_tx(staging: Staging) -> Transaction {
        let mut tx = Transaction::new(
            TransactionKind::Transfer,
            -1000,
            10_000,
            9_000,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
        .unwrap();
        tx.staging = staging;
        tx
    }

    #[test]
    fn test_own_account_iban_is_internal_transfer() {
        let mut registries = fixture();
        let mut tx = transfer_tx(Staging {
            iban: Some("NL88SAVE0000000088".to_string()),
            name: Some("EIGEN REKENING".to_string()),
            ..Staging::default()
        });
        resolve(&mut tx, &mut registries).unwrap();
        assert_eq!(tx.counterparty.as_deref(), Some("savings"));
        assert_eq!(tx.category.as_deref(), Some(INTERNAL_TRANSFER_CATEGORY));
    }

    #[test]
    fn test_person_iban_leaves_category_to_keyword_fallback() {
        let mut registries = fixture();
        let mut tx = transfer_tx(Staging {
            iban: Some("NL00BANK0123456789".to_string()),
            name: Some("J JANSEN".to_string()),
            ..Staging::default()
        });
        tx.details.memo = Some("huur maart".to_string());
        resolve(&mut tx, &mut registries).unwrap();
        assert_eq!(tx.counterparty.as_deref(), Some("jansen"));
        assert_eq!(tx.category.as_deref(), Some("rent"));
    }

    #[test]
    fn test_unknown_counterparty_stays_unresolved() {
        let mut registries = fixture();
        let mut tx = transfer_tx(Staging {
            iban: Some("NL99UNKN0000000099".to_string()),
            name: Some("ONBEKEND".to_string()),
            ..Staging::default()
        });
        resolve(&mut tx, &mut registries).unwrap();
        assert_eq!(tx.counterparty, None);
        assert_eq!(tx.category, None);
    }

    #[test]
    fn test_company_iban_brings_default_category() {
        let mut registries = fixture();
        let mut tx = transfer_tx(Staging {
            iban: Some("NL12SUPR0000000012".to_string()),
            ..Staging::default()
        });
        resolve(&mut tx, &mut registries).unwrap();
        assert_eq!(tx.counterparty.as_deref(), Some("supermarkt"));
        assert_eq!(tx.category.as_deref(), Some("groceries"));
    }

    #[test]
    fn test_company_resolves_by_synonym_name() {
        let mut registries = fixture();
        let mut tx = transfer_tx(Staging {
            name: Some("super markt".to_string()),
            ..Staging::default()
        });
        resolve(&mut tx, &mut registries).unwrap();
        assert_eq!(tx.counterparty.as_deref(), Some("supermarkt"));
    }

    #[test]
    fn test_processor_indirection_learns_iban_and_resolves_underlying_name() {
        let mut registries = fixture();
        // processor known by IBAN; the Naam field carries the underlying
        // counterparty, a known company synonym
        let mut tx = transfer_tx(Staging {
            iban: Some("NL11PAYF0000000001".to_string()),
            name: Some("SUPER MARKT".to_string()),
            ..Staging::default()
        });
        resolve(&mut tx, &mut registries).unwrap();

        assert_eq!(tx.details.processor.as_deref(), Some("payfast"));
        assert_eq!(tx.counterparty.as_deref(), Some("supermarkt"));
        assert_eq!(tx.category.as_deref(), Some("groceries"));
    }

    #[test]
    fn test_processor_matched_by_name_caches_new_iban() {
        let mut registries = fixture();
        let mut tx = transfer_tx(Staging {
            iban: Some("NL77PAYF0000000077".to_string()), // not yet known
            name: Some("Stichting PayFast inzake webshop".to_string()),
            ..Staging::default()
        });
        resolve(&mut tx, &mut registries).unwrap();

        assert_eq!(tx.details.processor.as_deref(), Some("payfast"));
        // self-expanding alias cache
        assert!(registries.processors["payfast"]
            .ibans
            .contains(&"NL77PAYF0000000077".to_string()));
        // the structured IBAN was the processor's, so it must not have been
        // used for counterparty resolution
        assert_eq!(tx.staging.iban, None);
    }

    #[test]
    fn test_card_payment_location_defaults_to_home_country() {
        let mut registries = fixture();
        let mut tx = Transaction::new(
            TransactionKind::CardPayment,
            -1234,
            10_000,
            8_766,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        )
        .unwrap();
        tx.staging.name = Some("SUPER MARKT".to_string());
        tx.staging.place = Some("AMSTERDAM".to_string());
        resolve(&mut tx, &mut registries).unwrap();

        assert_eq!(tx.counterparty.as_deref(), Some("supermarkt"));
        let country_id = tx.details.country.clone().unwrap();
        assert_eq!(registries.countries[&country_id].name, "Nederland");
        let location_id = tx.details.location.clone().unwrap();
        assert_eq!(registries.locations[&location_id].name, "Amsterdam");
    }

    #[test]
    fn test_cash_withdrawal_keeps_fixed_category() {
        let mut registries = fixture();
        let mut tx = Transaction::new(
            TransactionKind::CashWithdrawal,
            -5000,
            10_000,
            5_000,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
        .unwrap();
        tx.staging.name = Some("SUPER MARKT".to_string());
        resolve(&mut tx, &mut registries).unwrap();

        assert_eq!(tx.category.as_deref(), Some("cat-cash"));
        assert_eq!(tx.counterparty.as_deref(), Some("supermarkt"));
    }

    #[test]
    fn test_interest_and_fee_book_against_home_bank() {
        let mut registries = fixture();
        let mut interest = transfer_tx(Staging::default());
        interest.kind = TransactionKind::Interest;
        resolve(&mut interest, &mut registries).unwrap();
        assert_eq!(interest.counterparty.as_deref(), Some("homebank"));
        assert_eq!(interest.category.as_deref(), Some("cat-interest"));

        let mut fee = transfer_tx(Staging::default());
        fee.kind = TransactionKind::BankFee;
        resolve(&mut fee, &mut registries).unwrap();
        assert_eq!(fee.category.as_deref(), Some("cat-fee"));
    }

    #[test]
    fn test_ambiguous_location_aborts_resolution() {
        let mut registries = fixture();
        let home = registries.profile.home_country.clone();
        let mut double = Location::new("Amsterdam Noord".to_string(), home, 52.40, 4.91);
        double.add_synonym("amsterdam");
        registries.insert_location(double);

        let mut tx = Transaction::new(
            TransactionKind::CardPayment,
            -1234,
            10_000,
            8_766,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        )
        .unwrap();
        tx.staging.place = Some("AMSTERDAM".to_string());
        let err = resolve(&mut tx, &mut registries).unwrap_err();
        assert!(matches!(err, ImportError::AmbiguousLocation { .. }));
    }
}
