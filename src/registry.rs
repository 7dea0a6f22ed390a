// Reference registries.
//
// Nine whole-document collections plus the operator profile, loaded once per
// run, mutated by enrichment (and the payment-processor IBAN cache), and
// rewritten as a whole by `flush`. Injected into the classifier, resolver
// and enrichment workflow; nothing in the core reaches for ambient state.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entities::{
    AccountMeta, BankParty, Category, Company, Counterparty, Country, EntityId, Location,
    MainCategory, PaymentProcessor, Person,
};
use crate::error::ImportError;
use crate::store;

// ============================================================================
// OPERATOR PROFILE
// ============================================================================

/// Fixed reference points of the operator's own bank: who to book interest
/// and fees against, which category they carry, and the home country used
/// when a card location has no country marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Registry id of the bank running the imported accounts.
    pub home_bank: EntityId,

    /// Registry id of the home country.
    pub home_country: EntityId,

    /// Description prefix that marks a bank-fee booking.
    pub fee_prefix: String,

    pub interest_category: EntityId,
    pub fee_category: EntityId,
    pub withdrawal_category: EntityId,
}

// ============================================================================
// REGISTRIES
// ============================================================================

#[derive(Debug, Default)]
pub struct Registries {
    pub persons: HashMap<EntityId, Person>,
    pub companies: HashMap<EntityId, Company>,
    pub banks: HashMap<EntityId, BankParty>,
    pub processors: HashMap<EntityId, PaymentProcessor>,
    pub categories: HashMap<EntityId, Category>,
    pub main_categories: HashMap<EntityId, MainCategory>,
    pub locations: HashMap<EntityId, Location>,
    pub countries: HashMap<EntityId, Country>,
    pub accounts: HashMap<EntityId, AccountMeta>,
    pub profile: Profile,
}

impl Registries {
    /// Read every registry document under `base`.
    pub fn load(base: &Path) -> anyhow::Result<Self> {
        Ok(Registries {
            persons: store::open_document_or(base, "counterparties", "persons")?,
            companies: store::open_document_or(base, "counterparties", "companies")?,
            banks: store::open_document_or(base, "counterparties", "banks")?,
            processors: store::open_document_or(base, "counterparties", "processors")?,
            categories: store::open_document_or(base, "config", "categories")?,
            main_categories: store::open_document_or(base, "config", "main_categories")?,
            locations: store::open_document_or(base, "config", "locations")?,
            countries: store::open_document_or(base, "config", "countries")?,
            accounts: store::open_document_or(base, "config", "accounts")?,
            profile: store::open_document(base, "config", "profile")?,
        })
    }

    /// Rewrite every registry document under `base`.
    pub fn flush(&self, base: &Path) -> anyhow::Result<()> {
        store::save_document(base, "counterparties", "persons", &self.persons)?;
        store::save_document(base, "counterparties", "companies", &self.companies)?;
        store::save_document(base, "counterparties", "banks", &self.banks)?;
        store::save_document(base, "counterparties", "processors", &self.processors)?;
        store::save_document(base, "config", "categories", &self.categories)?;
        store::save_document(base, "config", "main_categories", &self.main_categories)?;
        store::save_document(base, "config", "locations", &self.locations)?;
        store::save_document(base, "config", "countries", &self.countries)?;
        store::save_document(base, "config", "accounts", &self.accounts)?;
        store::save_document(base, "config", "profile", &self.profile)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Counterparty lookups (resolution precedence lives in the resolver;
    // these are the individual probes it composes)
    // ------------------------------------------------------------------

    pub fn account_by_iban(&self, iban: &str) -> Option<&EntityId> {
        self.accounts
            .iter()
            .find(|(_, meta)| meta.iban() == Some(iban))
            .map(|(id, _)| id)
    }

    pub fn person_by_iban(&self, iban: &str) -> Option<&EntityId> {
        self.persons
            .iter()
            .find(|(_, person)| person.ibans.iter().any(|known| known == iban))
            .map(|(id, _)| id)
    }

    pub fn company_by_iban(&self, iban: &str) -> Option<&EntityId> {
        self.companies
            .iter()
            .find(|(_, company)| company.ibans.iter().any(|known| known == iban))
            .map(|(id, _)| id)
    }

    pub fn company_by_name(&self, raw: &str) -> Option<&EntityId> {
        self.companies
            .iter()
            .find(|(_, company)| company.matches_name(raw))
            .map(|(id, _)| id)
    }

    /// First payment processor whose name/synonym occurs in `name` or whose
    /// alias list carries `iban`.
    pub fn processor_matching(&self, name: &str, iban: Option<&str>) -> Option<&EntityId> {
        self.processors
            .iter()
            .find(|(_, processor)| processor.matches(name, iban))
            .map(|(id, _)| id)
    }

    /// First bank whose name or synonym occurs in `text` (payment-request
    /// memos name the requesting bank in passing).
    pub fn bank_by_marker(&self, text: &str) -> Option<&EntityId> {
        self.banks
            .iter()
            .find(|(_, bank)| bank.matches_marker(text))
            .map(|(id, _)| id)
    }

    /// View an id as a counterparty of whichever kind it belongs to.
    pub fn counterparty(&self, id: &str) -> Option<Counterparty<'_>> {
        if let Some(person) = self.persons.get(id) {
            return Some(Counterparty::Person(person));
        }
        if let Some(company) = self.companies.get(id) {
            return Some(Counterparty::Company(company));
        }
        if let Some(bank) = self.banks.get(id) {
            return Some(Counterparty::Bank(bank));
        }
        if let Some(processor) = self.processors.get(id) {
            return Some(Counterparty::PaymentProcessor(processor));
        }
        None
    }

    // ------------------------------------------------------------------
    // Category fallback
    // ------------------------------------------------------------------

    /// Match `memo` against every category's keyword list, scanning in
    /// explicit priority order (ascending, ties broken by name).
    pub fn category_by_keyword(&self, memo: &str) -> Option<&EntityId> {
        let mut ordered: Vec<(&EntityId, &Category)> = self.categories.iter().collect();
        ordered.sort_by(|(_, a), (_, b)| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.name.cmp(&b.name))
        });
        ordered
            .into_iter()
            .find(|(_, category)| category.matches_memo(memo))
            .map(|(id, _)| id)
    }

    // ------------------------------------------------------------------
    // Location matching
    // ------------------------------------------------------------------

    /// Resolve a raw country string. Zero matches is an expected gap
    /// (deferred to enrichment); more than one is a data-quality fault in
    /// the reference registry and fatal.
    pub fn match_country(&self, raw: &str) -> Result<Option<&EntityId>, ImportError> {
        let candidates: Vec<(&EntityId, &Country)> = self
            .countries
            .iter()
            .filter(|(_, country)| country.matches(raw))
            .collect();
        match candidates.len() {
            0 => Ok(None),
            1 => Ok(Some(candidates[0].0)),
            _ => Err(ImportError::AmbiguousCountry {
                name: raw.to_string(),
                candidates: candidates
                    .into_iter()
                    .map(|(_, country)| country.name.clone())
                    .collect(),
            }),
        }
    }

    /// Resolve a raw place string within a country. Same contract as
    /// `match_country`: zero is a gap, two is fatal.
    pub fn match_location(
        &self,
        raw: &str,
        country: &str,
    ) -> Result<Option<&EntityId>, ImportError> {
        let candidates: Vec<(&EntityId, &Location)> = self
            .locations
            .iter()
            .filter(|(_, location)| location.country == country && location.matches(raw))
            .collect();
        match candidates.len() {
            0 => Ok(None),
            1 => Ok(Some(candidates[0].0)),
            _ => {
                let country_name = self
                    .countries
                    .get(country)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| country.to_string());
                Err(ImportError::AmbiguousLocation {
                    place: raw.to_string(),
                    country: country_name,
                    candidates: candidates
                        .into_iter()
                        .map(|(_, location)| location.name.clone())
                        .collect(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Enrichment inserts
    // ------------------------------------------------------------------

    pub fn insert_person(&mut self, person: Person) -> EntityId {
        let id = crate::entities::new_entity_id();
        self.persons.insert(id.clone(), person);
        id
    }

    pub fn insert_company(&mut self, company: Company) -> EntityId {
        let id = crate::entities::new_entity_id();
        self.companies.insert(id.clone(), company);
        id
    }

    pub fn insert_location(&mut self, location: Location) -> EntityId {
        let id = crate::entities::new_entity_id();
        self.locations.insert(id.clone(), location);
        id
    }

    pub fn insert_country(&mut self, country: Country) -> EntityId {
        let id = crate::entities::new_entity_id();
        self.countries.insert(id.clone(), country);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registries_with_two_utrechts() -> Registries {
        let mut registries = Registries::default();
        let nl = registries.insert_country(Country::new("Nederland".to_string(), "NLD".to_string()));
        registries.insert_location(Location::new("Utrecht".to_string(), nl.clone(), 52.09, 5.12));
        let mut second = Location::new("Utrecht Overvecht".to_string(), nl.clone(), 52.11, 5.11);
        second.add_synonym("utrecht");
        registries.insert_location(second);
        registries.profile.home_country = nl;
        registries
    }

    #[test]
    fn test_ambiguous_location_is_fatal_and_names_candidates() {
        let registries = registries_with_two_utrechts();
        let country = registries.profile.home_country.clone();
        let err = registries.match_location("Utrecht", &country).unwrap_err();
        match err {
            ImportError::AmbiguousLocation {
                place, candidates, ..
            } => {
                assert_eq!(place, "Utrecht");
                assert_eq!(candidates.len(), 2);
                assert!(candidates.contains(&"Utrecht".to_string()));
                assert!(candidates.contains(&"Utrecht Overvecht".to_string()));
            }
            other => panic!("expected AmbiguousLocation, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_location_is_a_gap_not_an_error() {
        let registries = registries_with_two_utrechts();
        let country = registries.profile.home_country.clone();
        assert_eq!(registries.match_location("Zwolle", &country).unwrap(), None);
    }

    #[test]
    fn test_keyword_fallback_respects_priority_order() {
        let mut registries = Registries::default();
        let mut broad = Category::new("Boodschappen".to_string(), "huishouden".to_string());
        broad.keywords.push("markt".to_string());
        broad.priority = 10;
        let mut narrow = Category::new("Uit eten".to_string(), "vrije tijd".to_string());
        narrow.keywords.push("markt".to_string());
        narrow.priority = 1;
        registries.categories.insert("broad".to_string(), broad);
        registries.categories.insert("narrow".to_string(), narrow);

        // Both match; the lower priority value wins regardless of map order.
        assert_eq!(
            registries.category_by_keyword("Foodmarkt Amsterdam"),
            Some(&"narrow".to_string())
        );
    }

    #[test]
    fn test_company_lookup_by_synonym() {
        let mut registries = Registries::default();
        let mut company = Company::new("Super Markt B.V.".to_string());
        company.add_synonym("SUPER MARKT");
        let id = registries.insert_company(company);
        assert_eq!(registries.company_by_name("super markt"), Some(&id));
        assert_eq!(registries.company_by_name("onbekend"), None);
    }
}
