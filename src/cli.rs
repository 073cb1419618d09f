use std::cmp;
use std::error::Error;
use std::time::Duration;

use aigloss_rs::simplify::{self, DEFAULT_MAX_PARAGRAPHS};
use aigloss_rs::summary::DEFAULT_HOST;
use aigloss_rs::{
    BufferRegion, DisplayState, GlossaryEntry, GlossaryIndex, ResultRenderer, SearchController,
    SummaryConfig, WikipediaClient,
};
use atty::Stream;
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aigloss-rs", about = "AI用語辞書: glossary and encyclopedia summaries", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Operations on the embedded glossary.
    #[command(subcommand)]
    Term(TermCommand),
    /// Look a term up in the encyclopedia summary API.
    Search {
        /// Term to search for. Surrounding whitespace is ignored.
        term: String,
        /// Print the rendered result region instead of plain text.
        #[arg(long)]
        html: bool,
        /// Encyclopedia host, scheme included.
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,
        /// Per-request timeout in seconds.
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
    /// Serve the glossary page and search endpoints over HTTP.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// CSS framework used by the page: tailwind or bootstrap.
        #[arg(long, default_value = "tailwind")]
        theme: aigloss_rs::web::WebTheme,
        /// Public base URL used for canonical links.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        base_url: String,
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,
    },
}

#[derive(Subcommand, Debug)]
enum TermCommand {
    /// Look up term IDs for exact matches.
    Get {
        /// One or more terms to look up.
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// List terms that start with the provided prefix.
    Prefix {
        /// Prefix to search for.
        prefix: String,
        /// Maximum number of matches to return.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the full glossary entry for a term.
    Show {
        /// Term, slug or term ID to display.
        query: String,
        /// Interpret the query as a term ID.
        #[arg(long)]
        by_id: bool,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Term(TermCommand::Get { terms }) => handle_get(terms, cli.json),
        Command::Term(TermCommand::Prefix { prefix, limit }) => {
            handle_prefix(prefix, limit, cli.json)
        }
        Command::Term(TermCommand::Show { query, by_id }) => handle_show(query, by_id, cli.json),
        Command::Search {
            term,
            html,
            host,
            timeout_secs,
        } => {
            init_tracing("warn");
            let config = SummaryConfig {
                host,
                timeout: Duration::from_secs(timeout_secs.max(1)),
                ..SummaryConfig::default()
            };
            handle_search(term, config, html, cli.json)
        }
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            theme,
            base_url,
            host,
        } => {
            init_tracing("info");
            let config = aigloss_rs::web::WebConfig {
                addr,
                theme,
                base_url,
                summary: SummaryConfig {
                    host,
                    ..SummaryConfig::default()
                },
            };
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(aigloss_rs::web::serve(config))?;
            Ok(())
        }
    }
}

/// Logs go to stderr so `--json` output stays machine readable. `RUST_LOG` overrides.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_get(terms: Vec<String>, as_json: bool) -> Result<(), Box<dyn Error>> {
    let results: Vec<(String, Option<u32>)> = terms
        .into_iter()
        .map(|term| {
            let id = GlossaryIndex::get(term.trim());
            (term, id)
        })
        .collect();

    if as_json {
        let payload: Vec<_> = results
            .iter()
            .map(|(term, id)| json!({ "term": term, "term_id": id }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_lookup_table(&results);
    }
    Ok(())
}

fn handle_prefix(prefix: String, limit: usize, as_json: bool) -> Result<(), Box<dyn Error>> {
    let limit = cmp::max(1, limit);
    let matches = GlossaryIndex::prefix(&prefix, limit);

    if as_json {
        let payload = json!({
            "prefix": prefix,
            "limit": limit,
            "results": matches.iter().map(|(term, id)| {
                json!({"term": term, "term_id": id})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_prefix_table(&prefix, &matches);
    }
    Ok(())
}

fn handle_show(query: String, by_id: bool, as_json: bool) -> Result<(), Box<dyn Error>> {
    let entry = if by_id {
        let id: u32 = query
            .parse()
            .map_err(|_| format!("Failed to parse term ID from {query:?}"))?;
        GlossaryIndex::entry_by_id(id).ok_or_else(|| format!("No entry found for term ID {id}"))?
    } else {
        let query = query.trim();
        GlossaryIndex::entry_by_term(query)
            .or_else(|| GlossaryIndex::entry_by_slug(query))
            .ok_or_else(|| format!("No entry found for term {query:?}"))?
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entry_to_json(&entry))?);
    } else {
        print_entry(&entry);
    }
    Ok(())
}

fn handle_search(
    raw: String,
    config: SummaryConfig,
    as_html: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let client = WikipediaClient::new(config)?;
    let mut controller = SearchController::new(ResultRenderer::default(), BufferRegion::new());
    let runtime = tokio::runtime::Runtime::new()?;
    let state = runtime.block_on(controller.submit(&client, &raw)).clone();
    let region = controller.into_region();

    if matches!(state, DisplayState::Idle) {
        return Err("Search term cannot be empty".into());
    }
    if as_json {
        let payload = json!({
            "state": state.kind(),
            "term": state.term().map(|term| term.as_str()),
            "summary": state.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if as_html {
        println!("{}", region.html());
        return Ok(());
    }
    match &state {
        DisplayState::Result { summary, .. } => {
            println!("{}", summary.title);
            let body = simplify::paragraphs(&summary.extract, DEFAULT_MAX_PARAGRAPHS).join("\n\n");
            if body.is_empty() {
                println!("\n情報を取得できませんでした。");
            } else {
                render_markdown_block("概要", &body);
            }
            if let Some(url) = &summary.page_url {
                println!("\n{url}");
            }
            Ok(())
        }
        DisplayState::Empty { term } => {
            println!("「{term}」に関する情報がWikipediaで見つかりませんでした。");
            Ok(())
        }
        _ => Err("情報の取得中にエラーが発生しました。しばらくしてから再度お試しください。".into()),
    }
}

fn print_lookup_table(rows: &[(String, Option<u32>)]) {
    if rows.is_empty() {
        println!("No terms provided.");
        return;
    }
    let width = rows
        .iter()
        .map(|(term, _)| term.chars().count())
        .max()
        .unwrap_or(4)
        .max("TERM".len());
    println!("{:<width$}  {}", "TERM", "TERM_ID", width = width);
    println!("{:-<width$}  {}", "", "-------", width = width);
    for (term, id) in rows {
        let value = id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<missing>".to_string());
        println!("{:<width$}  {}", term, value, width = width);
    }
}

fn print_prefix_table(prefix: &str, rows: &[(String, u32)]) {
    if rows.is_empty() {
        println!("No terms matched prefix \"{prefix}\".");
        return;
    }
    let width = rows
        .iter()
        .map(|(term, _)| term.chars().count())
        .max()
        .unwrap_or(prefix.len())
        .max("TERM".len());
    println!("Matches for prefix \"{prefix}\":");
    println!("{:<width$}  {}", "TERM", "TERM_ID", width = width);
    println!("{:-<width$}  {}", "", "-------", width = width);
    for (term, id) in rows {
        println!("{:<width$}  {}", term, id, width = width);
    }
}

fn entry_to_json(entry: &GlossaryEntry<'_>) -> serde_json::Value {
    json!({
        "term_id": entry.term_id(),
        "slug": entry.slug(),
        "term": entry.term(),
        "reading": entry.reading(),
        "category": entry.category(),
        "summary": entry.summary(),
        "detail": entry.detail(),
        "related": entry.related().collect::<Vec<_>>(),
    })
}

fn print_entry(entry: &GlossaryEntry<'_>) {
    println!("Term: {} (ID {})", entry.term(), entry.term_id());
    println!("Slug: {}", entry.slug());
    if let Some(reading) = entry.reading() {
        println!("Reading: {reading}");
    }
    if let Some(category) = entry.category() {
        println!("Category: {category}");
    }
    println!("\n{}", entry.summary());
    if let Some(detail) = entry.detail() {
        render_markdown_block("Detail", &detail);
    }
    let related: Vec<_> = entry.related().collect();
    if !related.is_empty() {
        println!("\nRelated: {}", related.join(", "));
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
