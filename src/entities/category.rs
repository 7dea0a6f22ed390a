// Categories - a two-level hierarchy with keyword-based fallback matching.
//
// Every Category belongs to exactly one MainCategory. Keyword lists feed the
// free-text fallback in the resolver; the scan order is the explicit
// `priority` field, ascending, so overlapping keyword lists categorize
// deterministically.

use serde::{Deserialize, Serialize};

use super::counterparty::EntityId;

/// Well-known id of the category marking transfers between two of the
/// operator's own accounts. The ledger keys its cross-account deduplication
/// on this value.
pub const INTERNAL_TRANSFER_CATEGORY: &str = "internal-transfer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainCategory {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,

    pub main_category: EntityId,

    /// Case-insensitive substrings matched against a transaction memo when
    /// no counterparty-derived category exists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Keyword-fallback scan position. Lower scans first; ties break on the
    /// category name.
    #[serde(default)]
    pub priority: u32,
}

impl Category {
    pub fn new(name: String, main_category: EntityId) -> Self {
        Category {
            name,
            main_category,
            keywords: Vec::new(),
            priority: 0,
        }
    }

    /// Does any keyword occur in `memo` (case-insensitive)?
    pub fn matches_memo(&self, memo: &str) -> bool {
        let folded = memo.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| folded.contains(&keyword.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let mut category = Category::new("Huur".to_string(), "wonen".to_string());
        category.keywords.push("huur".to_string());
        assert!(category.matches_memo("Huur maart 2024"));
        assert!(category.matches_memo("HUUR"));
        assert!(!category.matches_memo("boodschappen"));
    }

    #[test]
    fn test_no_keywords_never_matches() {
        let category = Category::new("Overig".to_string(), "overig".to_string());
        assert!(!category.matches_memo("anything at all"));
    }
}
