//! Keyword categorizer
//!
//! Maps a free-text item name to a grocery category by substring
//! containment against a fixed, ordered keyword table. The first keyword
//! found in the lower-cased input wins, so table order is part of the
//! contract: "almond milk" resolves through `milk` (listed first), not
//! through `almond milk`.

/// Ordered (keyword, category) table. Scanned front to back.
pub const CATEGORY_TABLE: &[(&str, &str)] = &[
    ("milk", "dairy"),
    ("almond milk", "dairy"),
    ("yogurt", "dairy"),
    ("cheese", "dairy"),
    ("apple", "produce"),
    ("apples", "produce"),
    ("banana", "produce"),
    ("bananas", "produce"),
    ("bread", "bakery"),
    ("water", "beverages"),
    ("toothpaste", "personal_care"),
    ("chocolate", "snacks"),
];

/// Categorize an item by name.
///
/// Returns `None` when no keyword occurs in the input.
pub fn categorize(item: &str) -> Option<&'static str> {
    let lower = item.to_lowercase();
    CATEGORY_TABLE
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, category)| *category)
}
