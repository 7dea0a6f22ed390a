// Locations and countries for card transactions.
//
// Both grow only through enrichment. Synonyms are the raw statement
// spellings (casefolded); the canonical name is what the projection shows.

use serde::{Deserialize, Serialize};

use super::counterparty::EntityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,

    /// ISO 3166-1 alpha-3 code, e.g. "NLD".
    pub iso_3166_1_alpha_3: String,

    /// Casefolded abbreviations and spellings seen on statements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl Country {
    pub fn new(name: String, iso_3166_1_alpha_3: String) -> Self {
        Country {
            name,
            iso_3166_1_alpha_3,
            synonyms: Vec::new(),
        }
    }

    pub fn add_synonym(&mut self, raw: &str) {
        let folded = raw.to_lowercase();
        if !self.synonyms.contains(&folded) {
            self.synonyms.push(folded);
        }
    }

    pub fn matches(&self, raw: &str) -> bool {
        let folded = raw.to_lowercase();
        self.name.to_lowercase() == folded || self.synonyms.iter().any(|s| *s == folded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,

    pub country: EntityId,

    pub latitude: f64,
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl Location {
    pub fn new(name: String, country: EntityId, latitude: f64, longitude: f64) -> Self {
        Location {
            name,
            country,
            latitude,
            longitude,
            synonyms: Vec::new(),
        }
    }

    pub fn add_synonym(&mut self, raw: &str) {
        let folded = raw.to_lowercase();
        if !self.synonyms.contains(&folded) {
            self.synonyms.push(folded);
        }
    }

    pub fn matches(&self, raw: &str) -> bool {
        let folded = raw.to_lowercase();
        self.name.to_lowercase() == folded || self.synonyms.iter().any(|s| *s == folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_matches_name_and_synonym() {
        let mut country = Country::new("Nederland".to_string(), "NLD".to_string());
        country.add_synonym("NLD");
        assert!(country.matches("nederland"));
        assert!(country.matches("nld"));
        assert!(!country.matches("BEL"));
    }

    #[test]
    fn test_location_matches_synonym_casefolded() {
        let mut location = Location::new("Amsterdam".to_string(), "nl".to_string(), 52.37, 4.90);
        location.add_synonym("AMSTERDAM ZO");
        assert!(location.matches("Amsterdam"));
        assert!(location.matches("amsterdam zo"));
        assert!(!location.matches("Rotterdam"));
    }
}
