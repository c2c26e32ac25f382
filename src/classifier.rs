//! Object-type classification from item names.
//!
//! The category decides which items may touch (same category) and which must keep
//! the clearance distance (different categories). Classification is a pure
//! function of the name over a fixed, priority-ordered keyword table.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Physical category of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Box,
    Pallet,
    Drum,
    Rack,
    Machinery,
    Hazmat,
    Custom,
}

impl Category {
    /// Stable identifier used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Category::Box => "box",
            Category::Pallet => "pallet",
            Category::Drum => "drum",
            Category::Rack => "rack",
            Category::Machinery => "machinery",
            Category::Hazmat => "hazmat",
            Category::Custom => "custom",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Keyword table in priority order. The first row with a matching keyword wins.
///
/// "pallet" comes before the generic "box" keywords, so a "Pallet Box" is a pallet.
pub const KEYWORD_TABLE: &[(Category, &[&str])] = &[
    (Category::Pallet, &["pallet", "skid"]),
    (Category::Box, &["box", "carton", "package", "crate"]),
    (Category::Drum, &["drum", "barrel", "container"]),
    (Category::Rack, &["rack", "shelf", "frame"]),
    (Category::Machinery, &["machinery", "equipment", "machine"]),
    (Category::Hazmat, &["hazmat", "chemical", "dangerous"]),
];

/// Maps an item name to its category.
///
/// Case-insensitive substring match against [`KEYWORD_TABLE`]; no match yields
/// [`Category::Custom`].
///
/// # Examples
/// ```
/// use warehouse_optimizer::classifier::{classify, Category};
///
/// assert_eq!(classify("Drum B"), Category::Drum);
/// assert_eq!(classify("Pallet Box"), Category::Pallet);
/// assert_eq!(classify("Widget"), Category::Custom);
/// ```
pub fn classify(name: &str) -> Category {
    let lowered = name.to_lowercase();
    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_keyword_to_its_row() {
        for (category, keywords) in KEYWORD_TABLE {
            for kw in *keywords {
                assert_eq!(
                    classify(kw),
                    *category,
                    "keyword '{}' should classify as {}",
                    kw,
                    category
                );
            }
        }
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        assert_eq!(classify("Box A"), Category::Box);
        assert_eq!(classify("SHIPPING CARTON 40x60"), Category::Box);
        assert_eq!(classify("oil_barrel_200l"), Category::Drum);
        assert_eq!(classify("Steel Shelf Unit"), Category::Rack);
    }

    #[test]
    fn earlier_rows_win_on_overlapping_keywords() {
        assert_eq!(classify("Pallet Box"), Category::Pallet);
        assert_eq!(classify("Box Skid"), Category::Pallet);
        assert_eq!(classify("Chemical Drum"), Category::Drum);
        assert_eq!(classify("Machine Crate"), Category::Box);
        assert_eq!(classify("Rack Container"), Category::Drum);
        assert_eq!(classify("Equipment Box"), Category::Box);
        assert_eq!(classify("Hazmat Box"), Category::Box);
        assert_eq!(classify("Equipment Frame"), Category::Rack);
        assert_eq!(classify("Dangerous Machinery"), Category::Machinery);
    }

    #[test]
    fn unmatched_and_empty_names_are_custom() {
        assert_eq!(classify("Widget"), Category::Custom);
        assert_eq!(classify(""), Category::Custom);
    }

    #[test]
    fn classification_is_deterministic() {
        let names = ["Drum B", "Pallet Box", "Mystery", "hazmat kit"];
        let first: Vec<_> = names.iter().map(|n| classify(n)).collect();
        let second: Vec<_> = names.iter().map(|n| classify(n)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn category_serializes_as_snake_case_code() {
        let json = serde_json::to_string(&Category::Machinery).unwrap();
        assert_eq!(json, "\"machinery\"");
        assert_eq!(Category::Hazmat.to_string(), "hazmat");
    }
}
