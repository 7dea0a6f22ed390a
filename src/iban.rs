// IBAN recognition inside free text.
//
// Payment-request memos embed the counter-IBAN without delimiters, sometimes
// with stray spaces. The scan uppercases the text, strips all spaces, and
// tries one pattern per country until one hits.

use std::sync::OnceLock;

use regex::Regex;

/// Per-country IBAN shapes, tried in order.
const PATTERNS: &[&str] = &[
    r"NL\d{2}[A-Z]{4}\d{10}",        // Netherlands
    r"BE\d{14}",                     // Belgium
    r"AT\d{18}",                     // Austria
    r"CZ\d{22}",                     // Czechia
    r"FR\d{12}[0-9A-Z]{11}\d{2}",    // France
    r"DE\d{20}",                     // Germany
    r"IT\d{2}[A-Z]\d{10}[0-9A-Z]{12}", // Italy
    r"LU\d{5}[0-9A-Z]{13}",          // Luxembourg
    r"ES\d{22}",                     // Spain
    r"GB\d{2}[A-Z]{4}\d{14}",        // United Kingdom
    r"CH\d{7}[0-9A-Z]{12}",          // Switzerland
];

fn patterns() -> &'static [Regex] {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).expect("iban pattern"))
            .collect()
    })
}

/// Find the first IBAN embedded in `text`, if any.
pub fn find_iban(text: &str) -> Option<String> {
    let squeezed: String = text.to_uppercase().replace(' ', "");
    for re in patterns() {
        if let Some(found) = re.find(&squeezed) {
            return Some(found.as_str().to_string());
        }
    }
    None
}
