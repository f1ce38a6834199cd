//! Rule-based intent parser
//!
//! Turns an utterance into a [`ParsedCommand`]. Pattern classes are tried in
//! a fixed order (search, remove, add) and every pattern is anchored at both
//! ends, so command words in the middle of a sentence never match. When no
//! pattern matches the whole trimmed text becomes an add of quantity 1,
//! which makes [`parse`] total.
//!
//! Quantity tokens: an add may carry a quantity right after the verb, either
//! ASCII digits or a number word from one to ten, followed by whitespace.
//! Anything glued to the token ("two-percent", "2apples") stays part of the
//! item. A token that is recognized as a quantity but cannot be used
//! (overflow, or zero) is dropped and the quantity falls back to 1. That
//! token never becomes part of the item.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Types
// ============================================================================

/// A structured command extracted from an utterance. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum ParsedCommand {
    Add { item: String, quantity: u32 },
    Remove { item: String },
    Search {
        item: String,
        #[serde(rename = "max")]
        max_price: Option<f64>,
    },
}

impl ParsedCommand {
    /// Short intent label: add, remove or search
    pub fn intent(&self) -> &'static str {
        match self {
            ParsedCommand::Add { .. } => "add",
            ParsedCommand::Remove { .. } => "remove",
            ParsedCommand::Search { .. } => "search",
        }
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Number words accepted as a quantity token
const QUANTITY_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

lazy_static! {
    static ref SEARCH_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)^(?:find|search\s+for)\s+(?P<item>.+?)(?:\s+under\s+\$?(?P<max>[0-9]+(?:\.[0-9]+)?))?$").unwrap(),
    ];
    static ref REMOVE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)^(?:please\s*)?remove\s+(?P<item>.+)$").unwrap(),
        Regex::new(r"(?i)^delete\s+(?P<item>.+)$").unwrap(),
    ];
    static ref ADD_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)^(?:please\s*)?add\s+(?:(?P<qty>[0-9]+|one|two|three|four|five|six|seven|eight|nine|ten)\s+)?(?P<item>.+)$").unwrap(),
        Regex::new(r"(?i)^(?:i\s+want\s+to\s+buy|i\s+need|buy|get)\s+(?:(?P<qty>[0-9]+|one|two|three|four|five|six|seven|eight|nine|ten)\s+)?(?P<item>.+)$").unwrap(),
    ];
}

// ============================================================================
// Parsing
// ============================================================================

/// Look up a number word (one..ten), case-insensitively
pub fn word_to_num(word: &str) -> Option<u32> {
    let lower = word.trim().to_lowercase();
    QUANTITY_WORDS
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, n)| *n)
}

/// Resolve a captured quantity token. Unusable tokens resolve to 1.
fn resolve_quantity(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return 1;
    };
    let parsed = raw.parse::<u32>().ok().or_else(|| word_to_num(raw));
    match parsed {
        Some(n) if n >= 1 => n,
        _ => {
            debug!("Discarding unusable quantity token {:?}", raw);
            1
        }
    }
}

fn first_match<'t>(patterns: &[Regex], text: &'t str) -> Option<Captures<'t>> {
    patterns.iter().find_map(|re| re.captures(text))
}

fn item_of(caps: &Captures<'_>) -> String {
    caps.name("item")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Parse an utterance into a command. Never fails.
pub fn parse(text: &str) -> ParsedCommand {
    let t = text.trim();

    if let Some(caps) = first_match(&SEARCH_PATTERNS, t) {
        let max_price = caps
            .name("max")
            .and_then(|m| m.as_str().parse::<f64>().ok());
        return ParsedCommand::Search {
            item: item_of(&caps),
            max_price,
        };
    }

    if let Some(caps) = first_match(&REMOVE_PATTERNS, t) {
        return ParsedCommand::Remove {
            item: item_of(&caps),
        };
    }

    if let Some(caps) = first_match(&ADD_PATTERNS, t) {
        return ParsedCommand::Add {
            item: item_of(&caps),
            quantity: resolve_quantity(caps.name("qty").map(|m| m.as_str())),
        };
    }

    debug!("No pattern matched, treating utterance as add");
    ParsedCommand::Add {
        item: t.to_string(),
        quantity: 1,
    }
}

// ============================================================================
// Tests
// ============================================================================
