// Interactive enrichment - the learning loop.
//
// Whenever resolution leaves a gap (counterparty, category, location,
// country), the pipeline suspends and asks a DecisionSource what to do:
// attach the staged raw string to an existing entity found by substring
// search, or create a new entity seeded with that string. Either way exactly
// one registry entity is created or mutated and the transaction's gap is
// filled, so the next statement with the same raw string resolves silently.
//
// The decision source is the component's entire outward contract. Production
// runs use the terminal prompts; tests script a queue of canned answers.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::entities::{Company, Country, EntityId, Location, Person};
use crate::error::ImportError;
use crate::ledger::{Transaction, TransactionKind};
use crate::registry::Registries;

// ============================================================================
// DECISION SOURCE
// ============================================================================

pub trait DecisionSource {
    /// Present options for `subject`; return the chosen index.
    fn choose(&mut self, subject: &str, options: &[String]) -> Result<usize, ImportError>;

    /// Ask for one line of free text.
    fn text(&mut self, prompt: &str) -> Result<String, ImportError>;
}

/// Production source: line-oriented prompts on the terminal. Invalid input
/// re-prompts; a closed stdin surfaces as DecisionExhausted.
pub struct TerminalDecisions;

impl DecisionSource for TerminalDecisions {
    fn choose(&mut self, subject: &str, options: &[String]) -> Result<usize, ImportError> {
        println!("\nchoose a {subject}\n");
        for (index, option) in options.iter().enumerate() {
            println!(" [{index}] {option}");
        }
        println!();
        let stdin = std::io::stdin();
        loop {
            print!("choice: ");
            std::io::stdout().flush().ok();
            let mut line = String::new();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .map_err(|_| ImportError::DecisionExhausted(subject.to_string()))?;
            if read == 0 {
                return Err(ImportError::DecisionExhausted(subject.to_string()));
            }
            match line.trim().parse::<usize>() {
                Ok(choice) if choice < options.len() => return Ok(choice),
                _ => println!("input {:?} incorrect, pick one of the listed numbers", line.trim()),
            }
        }
    }

    fn text(&mut self, prompt: &str) -> Result<String, ImportError> {
        print!("{prompt}: ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|_| ImportError::DecisionExhausted(prompt.to_string()))?;
        if read == 0 {
            return Err(ImportError::DecisionExhausted(prompt.to_string()));
        }
        Ok(line.trim().to_string())
    }
}

/// Scripted source for tests: a queue of canned answers, consumed in order.
/// Running out of answers is an error, which doubles as the "no prompt
/// happened" assertion in tests.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    queue: VecDeque<Scripted>,
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Choice(usize),
    Text(String),
}

impl ScriptedDecisions {
    pub fn new(answers: Vec<Scripted>) -> Self {
        ScriptedDecisions {
            queue: answers.into(),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn choose(&mut self, subject: &str, _options: &[String]) -> Result<usize, ImportError> {
        match self.queue.pop_front() {
            Some(Scripted::Choice(choice)) => Ok(choice),
            _ => Err(ImportError::DecisionExhausted(subject.to_string())),
        }
    }

    fn text(&mut self, prompt: &str) -> Result<String, ImportError> {
        match self.queue.pop_front() {
            Some(Scripted::Text(text)) => Ok(text),
            _ => Err(ImportError::DecisionExhausted(prompt.to_string())),
        }
    }
}

// ============================================================================
// WORKFLOW
// ============================================================================

/// Fill every remaining gap on `tx`, teaching the registries as a side
/// effect. Blocks on the decision source; the pipeline halts until a
/// decision returns.
pub fn enrich(
    tx: &mut Transaction,
    registries: &mut Registries,
    decisions: &mut dyn DecisionSource,
) -> Result<(), ImportError> {
    if matches!(
        tx.kind,
        TransactionKind::CardPayment | TransactionKind::CashWithdrawal
    ) {
        if tx.details.country.is_none() {
            if let Some(raw) = tx.staging.country.clone() {
                tx.details.country = Some(resolve_country_gap(&raw, registries, decisions)?);
            }
        }
        if tx.details.location.is_none() {
            if let (Some(raw), Some(country)) =
                (tx.staging.place.clone(), tx.details.country.clone())
            {
                tx.details.location =
                    Some(resolve_location_gap(&raw, &country, registries, decisions)?);
            }
        }
    }

    if tx.counterparty.is_none() && (tx.staging.name.is_some() || tx.staging.iban.is_some()) {
        let id = resolve_counterparty_gap(tx, registries, decisions)?;
        // the attached company may bring its default category along
        if tx.category.is_none() {
            if let Some(company) = registries.companies.get(&id) {
                tx.category = company.default_category.clone();
            }
        }
        tx.counterparty = Some(id);
    }

    if tx.category.is_none() {
        tx.category = Some(resolve_category_gap(tx, registries, decisions)?);
    }

    Ok(())
}

/// Attach the raw country string to an existing country, or register a new
/// one. Either way the raw string becomes a synonym and resolves from now on.
fn resolve_country_gap(
    raw: &str,
    registries: &mut Registries,
    decisions: &mut dyn DecisionSource,
) -> Result<EntityId, ImportError> {
    loop {
        let actions = vec![
            "attach to an existing country".to_string(),
            "register a new country".to_string(),
        ];
        match decisions.choose(&format!("action for unknown country {raw:?}"), &actions)? {
            0 => {
                let query = decisions.text("country search")?;
                let mut matches: Vec<(EntityId, String)> = registries
                    .countries
                    .iter()
                    .filter(|(_, country)| {
                        country.name.to_lowercase().contains(&query.to_lowercase())
                    })
                    .map(|(id, country)| (id.clone(), country.name.clone()))
                    .collect();
                matches.sort_by(|(_, a), (_, b)| a.cmp(b));
                if matches.is_empty() {
                    continue;
                }
                let labels: Vec<String> = matches.iter().map(|(_, name)| name.clone()).collect();
                let picked = decisions.choose("country", &labels)?;
                let (id, _) = &matches[picked];
                if let Some(country) = registries.countries.get_mut(id) {
                    country.add_synonym(raw);
                }
                return Ok(id.clone());
            }
            _ => {
                let name = decisions.text("country name")?;
                let code = decisions.text("iso 3166-1 alpha-3 code")?;
                let mut country = Country::new(name, code);
                country.add_synonym(raw);
                return Ok(registries.insert_country(country));
            }
        }
    }
}

fn resolve_location_gap(
    raw: &str,
    country: &str,
    registries: &mut Registries,
    decisions: &mut dyn DecisionSource,
) -> Result<EntityId, ImportError> {
    loop {
        let actions = vec![
            "attach to an existing location".to_string(),
            "register a new location".to_string(),
        ];
        match decisions.choose(&format!("action for unknown location {raw:?}"), &actions)? {
            0 => {
                let query = decisions.text("location search")?;
                let mut matches: Vec<(EntityId, String)> = registries
                    .locations
                    .iter()
                    .filter(|(_, location)| {
                        location.country == country
                            && location.name.to_lowercase().contains(&query.to_lowercase())
                    })
                    .map(|(id, location)| (id.clone(), location.name.clone()))
                    .collect();
                matches.sort_by(|(_, a), (_, b)| a.cmp(b));
                if matches.is_empty() {
                    continue;
                }
                let labels: Vec<String> = matches.iter().map(|(_, name)| name.clone()).collect();
                let picked = decisions.choose("location", &labels)?;
                let (id, _) = &matches[picked];
                if let Some(location) = registries.locations.get_mut(id) {
                    location.add_synonym(raw);
                }
                return Ok(id.clone());
            }
            _ => {
                let name = decisions.text("location name")?;
                let latitude = decisions
                    .text("latitude")?
                    .parse::<f64>()
                    .unwrap_or_default();
                let longitude = decisions
                    .text("longitude")?
                    .parse::<f64>()
                    .unwrap_or_default();
                let mut location = Location::new(name, country.to_string(), latitude, longitude);
                location.add_synonym(raw);
                return Ok(registries.insert_location(location));
            }
        }
    }
}

fn resolve_counterparty_gap(
    tx: &Transaction,
    registries: &mut Registries,
    decisions: &mut dyn DecisionSource,
) -> Result<EntityId, ImportError> {
    let staged_name = tx.staging.name.clone().unwrap_or_default();
    let staged_iban = tx.staging.iban.clone();

    loop {
        let actions = vec![
            "attach to an existing counterparty".to_string(),
            "create a new person".to_string(),
            "create a new company".to_string(),
        ];
        let subject = format!("action for unresolved counterparty {staged_name:?}");
        match decisions.choose(&subject, &actions)? {
            0 => {
                let query = decisions.text("counterparty search")?;
                let folded = query.to_lowercase();

                let mut people: Vec<(EntityId, String)> = registries
                    .persons
                    .iter()
                    .filter(|(_, person)| person.name.to_lowercase().contains(&folded))
                    .map(|(id, person)| (id.clone(), format!("person {}", person.name)))
                    .collect();
                people.sort_by(|(_, a), (_, b)| a.cmp(b));

                let mut companies: Vec<(EntityId, String)> = registries
                    .companies
                    .iter()
                    .filter(|(_, company)| company.name.to_lowercase().contains(&folded))
                    .map(|(id, company)| (id.clone(), format!("company {}", company.name)))
                    .collect();
                companies.sort_by(|(_, a), (_, b)| a.cmp(b));

                let matches: Vec<(EntityId, String)> =
                    people.into_iter().chain(companies).collect();
                if matches.is_empty() {
                    continue;
                }
                let labels: Vec<String> = matches.iter().map(|(_, label)| label.clone()).collect();
                let picked = decisions.choose("counterparty", &labels)?;
                let (id, _) = &matches[picked];

                // teach the chosen entity the staged evidence
                if let Some(person) = registries.persons.get_mut(id) {
                    if let Some(iban) = &staged_iban {
                        person.add_iban(iban.clone());
                    }
                } else if let Some(company) = registries.companies.get_mut(id) {
                    if !staged_name.is_empty() {
                        company.add_synonym(&staged_name);
                    }
                    if let Some(iban) = &staged_iban {
                        company.add_iban(iban.clone());
                    }
                }
                return Ok(id.clone());
            }
            1 => {
                let name = decisions.text("person name")?;
                let mut person = Person::new(name);
                if let Some(iban) = &staged_iban {
                    person.add_iban(iban.clone());
                }
                return Ok(registries.insert_person(person));
            }
            _ => {
                let name = decisions.text("company name")?;
                let mut company = Company::new(name);
                if !staged_name.is_empty() {
                    company.add_synonym(&staged_name);
                }
                if let Some(iban) = &staged_iban {
                    company.add_iban(iban.clone());
                }
                return Ok(registries.insert_company(company));
            }
        }
    }
}

/// Pick a category from the registry. When the transaction's counterparty is
/// a company without a default category yet, the choice is remembered as
/// that company's default.
fn resolve_category_gap(
    tx: &Transaction,
    registries: &mut Registries,
    decisions: &mut dyn DecisionSource,
) -> Result<EntityId, ImportError> {
    let mut options: Vec<(EntityId, String)> = registries
        .categories
        .iter()
        .map(|(id, category)| (id.clone(), category.name.clone()))
        .collect();
    options.sort_by(|(_, a), (_, b)| a.cmp(b));

    let labels: Vec<String> = options.iter().map(|(_, name)| name.clone()).collect();
    let picked = decisions.choose("category", &labels)?;
    let (chosen, _) = &options[picked];

    if let Some(company) = tx
        .counterparty
        .as_deref()
        .and_then(|id| registries.companies.get_mut(id))
    {
        if company.default_category.is_none() {
            company.default_category = Some(chosen.clone());
        }
    }
    Ok(chosen.clone())
}
