mod db;
mod fetch;
mod locations;
mod parser;

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::parser::classify::ComponentType;

#[derive(Parser)]
#[command(name = "serp_scraper", about = "SERP fetcher and component parser")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the query queue
    Init {
        /// Queries to enqueue
        queries: Vec<String>,
        /// File with one query per line
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Canonical location name applied to every added query
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Fetch result pages for unvisited queries
    Fetch {
        /// Max queries to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Parse fetched pages into components
    Parse {
        /// Max pages to parse (default: all unparsed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch + parse in one pipeline
    Run {
        /// Max queries to fetch+parse
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show pipeline statistics
    Stats,
    /// Per-page component summary table
    Overview {
        /// Only pages containing this component type (e.g. "nested")
        #[arg(short = 't', long = "type")]
        cmpt_type: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Dump parsed components as JSON lines
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Download the geo-targeting locations table
    Locations {
        /// Where to keep the CSV
        #[arg(short, long, default_value = "data/locations")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { queries, file, location } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let mut pairs: Vec<(String, Option<String>)> = queries
                .into_iter()
                .map(|q| (q, location.clone()))
                .collect();
            if let Some(path) = file {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                pairs.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(|l| (l.to_string(), location.clone())),
                );
            }
            if pairs.is_empty() {
                println!("No queries given. Pass them inline or with --file.");
                return Ok(());
            }
            let inserted = db::insert_queries(&conn, &pairs)?;
            println!("Enqueued {} new queries ({} given)", inserted, pairs.len());
            Ok(())
        }
        Commands::Fetch { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let queries = db::fetch_unvisited(&conn, limit)?;
            if queries.is_empty() {
                println!("No unvisited queries. Run 'init' first or all queries are fetched.");
                return Ok(());
            }
            println!("Fetching {} pages (streaming to DB)...", queries.len());
            let stats = fetch::fetch_serps_streaming(&conn, queries).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Parse { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unparsed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unparsed pages. Run 'fetch' first.");
                return Ok(());
            }
            println!("Parsing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let queries = db::fetch_unvisited(&conn, limit)?;
            if queries.is_empty() {
                println!("No unvisited queries. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} pages (streaming to DB)...", queries.len());
            let stats = fetch::fetch_serps_streaming(&conn, queries).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: parse
            let t_parse = Instant::now();
            let unparsed = db::fetch_unparsed(&conn, None)?;
            if unparsed.is_empty() {
                println!("Nothing to parse (all fetched pages had errors).");
                return Ok(());
            }
            println!("Parsing {} pages...", unparsed.len());
            let counts = process_pages(&conn, &unparsed)?;
            println!("Parsed in {:.1}s", t_parse.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Overview { cmpt_type, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, cmpt_type.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No parsed pages found.");
                return Ok(());
            }

            println!(
                "{:>5} | {:<32} | {:>5} | {:>7} | {:>4} | {:>6} | {:>7}",
                "serp", "Query", "Cmpts", "General", "Ads", "Nested", "Unknown"
            );
            println!("{}", "-".repeat(84));
            for r in &rows {
                println!(
                    "{:>5} | {:<32} | {:>5} | {:>7} | {:>4} | {:>6} | {:>7}",
                    r.serp_id,
                    truncate(&r.query, 32),
                    r.components,
                    r.general,
                    r.ads,
                    r.nested,
                    r.unknown
                );
            }
            println!("\n{} pages", rows.len());
            Ok(())
        }
        Commands::Export { out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let records = db::fetch_export_records(&conn)?;
            if records.is_empty() {
                println!("No parsed components to export.");
                return Ok(());
            }
            match out {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    for record in &records {
                        writeln!(file, "{}", serde_json::to_string(record)?)?;
                    }
                    println!("Exported {} components to {}", records.len(), path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut out = stdout.lock();
                    for record in &records {
                        writeln!(out, "{}", serde_json::to_string(record)?)?;
                    }
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Queries:    {}", s.queries);
            println!("Visited:    {}", s.visited);
            println!("Unvisited:  {}", s.unvisited);
            println!("Fetched:    {}", s.fetched);
            println!("Errors:     {}", s.errors);
            println!("Parsed:     {}", s.parsed);
            println!("Components: {}", s.components);
            Ok(())
        }
        Commands::Locations { dir } => {
            let path = locations::ensure_locations_data(&dir).await?;
            println!("Locations data: {}", path.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    pages: usize,
    components: usize,
    sub_items: usize,
    unknown: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} components ({} sub-items, {} unknown) from {} pages.",
            self.components, self.sub_items, self.unknown, self.pages,
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[db::SerpPage],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts { pages: 0, components: 0, sub_items: 0, unknown: 0 };

    for chunk in pages.chunks(200) {
        let results: Vec<db::ParsedSerp> = chunk.par_iter().map(parser::process_page).collect();

        for parsed in &results {
            counts.components += parsed.components.len();
            counts.sub_items += parsed.components.iter().map(|c| c.sub_items.len()).sum::<usize>();
            counts.unknown += parsed
                .components
                .iter()
                .filter(|c| c.cmpt_type == ComponentType::Unknown)
                .count();
        }

        db::save_parsed(conn, &results)?;
        counts.pages += results.len();
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
