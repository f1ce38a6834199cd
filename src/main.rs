//! `shop` - command line front end for the shopping assistant
//!
//! # Usage
//! - `shop say add two apples` interprets an utterance and applies it
//! - `shop add|remove|list|suggest|search` call one operation directly
//! - `shop request` reads one JSON request from stdin and answers with one
//!   JSON object on stdout
//!
//! # Request format (stdin)
//! `{"action": "say", "text": "remove milk"}`. Other actions: `parse`,
//! `add` (`item`, `quantity`), `remove` (`id`), `list`, `suggest`, `search`
//! (`q`, `brand`, `max`).
//!
//! Logs go to stderr, controlled by `RUST_LOG`.

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use shopping_assistant::config::{Config, Storage};
use shopping_assistant::intent::{self, ParsedCommand};
use shopping_assistant::{
    Assistant, AssistantError, CatalogSource, Clock, ConfigError, CozoStore, HistoryLog,
    ListEntry, ListStore, MemoryStore, Product, Reason, Reply, SearchQuery, StoreError,
    Suggestion, SystemClock,
};
use std::io::{self, Read};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read stdin: {0}")]
    StdinRead(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),
}

// ============================================================================
// Command Line
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "shop", version, about = "Voice/text shopping list assistant")]
struct Cli {
    /// Directory holding shopping.db (default: ~/.shopping-assistant)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Product catalog JSON file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Keep list and history in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interpret an utterance and apply it
    Say {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Show how an utterance is interpreted, without applying it
    Parse {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Add an item to the list
    Add {
        item: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a list entry by id
    Remove { id: u64 },
    /// Show the list, newest first
    List,
    /// Suggest items to add
    Suggest,
    /// Search the product catalog
    Search {
        /// Name contains
        #[arg(long)]
        q: Option<String>,
        /// Brand contains
        #[arg(long)]
        brand: Option<String>,
        /// Maximum price; ignored if not a number
        #[arg(long)]
        max: Option<String>,
    },
    /// Read one JSON request from stdin
    Request,
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// A single operation, from the command line or a JSON request
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Request {
    Say {
        text: String,
    },
    Parse {
        text: String,
    },
    Add {
        #[serde(default)]
        item: String,
        #[serde(default)]
        quantity: Option<u32>,
    },
    Remove {
        #[serde(default)]
        id: Option<u64>,
    },
    List,
    Suggest,
    Search {
        #[serde(default)]
        q: Option<String>,
        #[serde(default)]
        brand: Option<String>,
        /// Number or text; anything unparseable means no limit
        #[serde(default)]
        max: Option<serde_json::Value>,
    },
}

impl Command {
    /// The equivalent request; `None` for `request`, which reads stdin
    fn into_request(self) -> Option<Request> {
        Some(match self {
            Command::Say { text } => Request::Say {
                text: text.join(" "),
            },
            Command::Parse { text } => Request::Parse {
                text: text.join(" "),
            },
            Command::Add { item, quantity } => Request::Add {
                item,
                quantity: Some(quantity),
            },
            Command::Remove { id } => Request::Remove { id: Some(id) },
            Command::List => Request::List,
            Command::Suggest => Request::Suggest,
            Command::Search { q, brand, max } => Request::Search {
                q,
                brand,
                max: max.map(serde_json::Value::String),
            },
            Command::Request => return None,
        })
    }
}

/// What an operation produced
#[derive(Debug)]
enum Outcome {
    Reply(Reply),
    Parsed(ParsedCommand),
    Added { id: u64, item: String, quantity: u32 },
    Removed(usize),
    Items(Vec<ListEntry>),
    Suggestions(Vec<Suggestion>),
    Results(Vec<Product>),
}

/// Suggestion with its human-readable reason
#[derive(Debug, Serialize)]
struct SuggestionView<'a> {
    #[serde(flatten)]
    suggestion: &'a Suggestion,
    description: String,
}

/// JSON written to stdout
#[derive(Debug, Default, Serialize)]
struct Response<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a ParsedCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<&'a [ListEntry]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestions: Option<Vec<SuggestionView<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [Product]>,
}

impl Outcome {
    fn to_response(&self) -> Response<'_> {
        let ok = Response {
            ok: true,
            ..Default::default()
        };
        match self {
            Outcome::Reply(reply) => Response {
                message: Some(reply.message.clone()),
                command: Some(&reply.command),
                id: reply.id,
                removed: reply.removed,
                results: match reply.command {
                    ParsedCommand::Search { .. } => Some(reply.results.as_slice()),
                    _ => None,
                },
                ..ok
            },
            Outcome::Parsed(command) => Response {
                command: Some(command),
                ..ok
            },
            Outcome::Added { id, .. } => Response { id: Some(*id), ..ok },
            Outcome::Removed(count) => Response {
                removed: Some(*count),
                ..ok
            },
            Outcome::Items(items) => Response {
                items: Some(items.as_slice()),
                ..ok
            },
            Outcome::Suggestions(suggestions) => Response {
                suggestions: Some(
                    suggestions
                        .iter()
                        .map(|s| SuggestionView {
                            suggestion: s,
                            description: s.reason.describe(),
                        })
                        .collect(),
                ),
                ..ok
            },
            Outcome::Results(results) => Response {
                results: Some(results.as_slice()),
                ..ok
            },
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

fn max_price_text(max: Option<serde_json::Value>) -> Option<String> {
    match max? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn execute<S, C, K>(
    assistant: &mut Assistant<S, C, K>,
    request: Request,
) -> Result<Outcome, AssistantError>
where
    S: ListStore + HistoryLog,
    C: Clock,
    K: CatalogSource,
{
    match request {
        Request::Say { text } => Ok(Outcome::Reply(assistant.handle_utterance(&text)?)),
        Request::Parse { text } => Ok(Outcome::Parsed(intent::parse(&text))),
        Request::Add { item, quantity } => {
            let quantity = quantity.unwrap_or(1);
            let id = assistant.add_item(&item, quantity)?;
            Ok(Outcome::Added {
                id,
                item: item.trim().to_string(),
                quantity,
            })
        }
        Request::Remove { id } => Ok(Outcome::Removed(assistant.remove_by_id(id)?)),
        Request::List => Ok(Outcome::Items(assistant.list()?)),
        Request::Suggest => Ok(Outcome::Suggestions(assistant.suggest()?)),
        Request::Search { q, brand, max } => {
            let max = max_price_text(max);
            let query = SearchQuery::from_raw(q.as_deref(), brand.as_deref(), max.as_deref());
            Ok(Outcome::Results(assistant.search(&query)?))
        }
    }
}

fn read_request() -> Result<Request, CliError> {
    let mut input_json = String::new();
    io::stdin().read_to_string(&mut input_json)?;
    debug!("Received request: {}", input_json);
    Ok(serde_json::from_str(&input_json)?)
}

fn run(cli: Cli, json: bool) -> Result<(), CliError> {
    let config = Config::resolve(cli.data_dir, cli.catalog, cli.ephemeral)?;

    let request = match cli.command.into_request() {
        Some(request) => request,
        None => read_request()?,
    };
    info!("Handling {:?}", request);

    // Parsing touches no state; answer before opening the store
    let outcome = match request {
        Request::Parse { text } => Outcome::Parsed(intent::parse(&text)),
        request => {
            let catalog = config.catalog();
            match &config.storage {
                Storage::Memory => {
                    let mut assistant = Assistant::new(MemoryStore::new(), SystemClock, catalog);
                    execute(&mut assistant, request)?
                }
                Storage::Sqlite(path) => {
                    let mut assistant =
                        Assistant::new(CozoStore::open(path)?, SystemClock, catalog);
                    execute(&mut assistant, request)?
                }
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string(&outcome.to_response())?);
    } else {
        render(&outcome);
    }
    Ok(())
}

// ============================================================================
// Text Rendering
// ============================================================================

fn render_product(p: &Product) {
    println!("  {} {} ${:.2}", p.name.bold(), p.brand.dimmed(), p.price);
}

fn render_command(command: &ParsedCommand) {
    let detail = match command {
        ParsedCommand::Add { item, quantity } => format!("item={:?} quantity={}", item, quantity),
        ParsedCommand::Remove { item } => format!("item={:?}", item),
        ParsedCommand::Search { item, max_price } => match max_price {
            Some(max) => format!("item={:?} max={}", item, max),
            None => format!("item={:?}", item),
        },
    };
    println!("{} {}", command.intent().bold(), detail);
}

fn render(outcome: &Outcome) {
    match outcome {
        Outcome::Reply(reply) => {
            println!("{}", reply.message.green());
            reply.results.iter().for_each(render_product);
        }
        Outcome::Parsed(command) => render_command(command),
        Outcome::Added { id, item, quantity } => {
            println!("{} (#{})", format!("Added {} × {} to your list.", quantity, item).green(), id);
        }
        Outcome::Removed(0) => println!("{}", "Nothing removed.".yellow()),
        Outcome::Removed(n) => println!("{}", format!("Removed {} item(s).", n).green()),
        Outcome::Items(items) if items.is_empty() => println!("Your list is empty."),
        Outcome::Items(items) => {
            for entry in items {
                println!(
                    "{:>4}  {} x{}  {}",
                    format!("#{}", entry.id).dimmed(),
                    entry.item.bold(),
                    entry.quantity,
                    entry.category.as_deref().unwrap_or("uncategorized").dimmed()
                );
            }
        }
        Outcome::Suggestions(suggestions) if suggestions.is_empty() => {
            println!("No suggestions right now.")
        }
        Outcome::Suggestions(suggestions) => {
            for s in suggestions {
                let description = s.reason.describe();
                let reason = match s.reason {
                    Reason::Frequent => description.green(),
                    Reason::Seasonal => description.yellow(),
                    Reason::SubstituteFor(_) => description.blue(),
                };
                println!(
                    "  {} [{}] {}",
                    s.item.bold(),
                    s.category.as_deref().unwrap_or("-"),
                    reason
                );
            }
        }
        Outcome::Results(results) if results.is_empty() => println!("No matching products."),
        Outcome::Results(results) => results.iter().for_each(render_product),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    // Initialize tracing if RUST_LOG is set
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json || matches!(cli.command, Command::Request);

    if let Err(e) = run(cli, json) {
        error!("Error: {}", e);
        if json {
            let output = Response {
                error: Some(e.to_string()),
                ..Default::default()
            };
            println!("{}", serde_json::to_string(&output).unwrap_or_default());
        } else {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
