mod browser;
mod error;
mod parser;
mod scraper;
mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::parser::level::Level;
use crate::scraper::ScrapeConfig;
use crate::store::{ProcessedRow, PROCESSED_COLUMNS};

#[derive(Parser)]
#[command(name = "engvid_scraper", about = "engVid lesson catalog scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a browser over the lesson listing and save it as CSV
    Scrape(ScrapeArgs),
    /// Split the level out of a saved CSV and show the result
    Process {
        /// CSV written by `scrape`
        #[arg(short, long, default_value = store::DEFAULT_CSV_PATH)]
        input: PathBuf,
        #[command(flatten)]
        process: ProcessArgs,
    },
    /// Scrape, then process the freshly written file
    Run {
        #[command(flatten)]
        scrape: ScrapeArgs,
        #[command(flatten)]
        process: ProcessArgs,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Lesson listing to load
    #[arg(long, default_value = scraper::LESSONS_URL)]
    url: String,
    /// Where to write the CSV
    #[arg(short, long, default_value = store::DEFAULT_CSV_PATH)]
    output: PathBuf,
    /// Seconds to wait for the lesson cards to render
    #[arg(long, default_value_t = scraper::RENDER_TIMEOUT.as_secs())]
    timeout: u64,
    /// Show the browser window instead of running headless
    #[arg(long)]
    show_browser: bool,
}

impl ScrapeArgs {
    fn config(&self) -> ScrapeConfig {
        ScrapeConfig {
            url: self.url.clone(),
            render_timeout: Duration::from_secs(self.timeout),
            headless: !self.show_browser,
            ..ScrapeConfig::default()
        }
    }
}

#[derive(Args)]
struct ProcessArgs {
    /// Rows to display
    #[arg(short = 'n', long, default_value = "50")]
    limit: usize,
    /// Also save the processed table to this CSV
    #[arg(long)]
    save: Option<PathBuf>,
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
        Commands::Scrape(args) => scrape(&args).await.map(|_| ()),
        Commands::Process { input, process } => process_file(&input, &process),
        Commands::Run { scrape: args, process } => {
            let t_scrape = Instant::now();
            let written = scrape(&args).await?;
            println!("Scraped in {}", format_duration(t_scrape.elapsed()));

            if written == 0 {
                println!("Nothing to process (no lessons were saved).");
                return Ok(());
            }
            process_file(&args.output, &process)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Scrape the listing and write it out. Returns the number of rows saved.
async fn scrape(args: &ScrapeArgs) -> anyhow::Result<usize> {
    println!("Saving to {}", args.output.display());

    let outcome = scraper::scrape_lessons(&args.config())
        .await
        .context("Scrape failed")?;

    println!(
        "Found {} lessons ({} ok, {} skipped).",
        outcome.total,
        outcome.rows.len(),
        outcome.faults.len()
    );
    if !outcome.faults.is_empty() {
        let ordinals: Vec<String> = outcome.faults.iter().map(|f| f.ordinal.to_string()).collect();
        println!("Skipped cards: #{}", ordinals.join(", #"));
    }

    let written = store::write_lessons(&args.output, &outcome.rows)?;
    if written == 0 {
        println!("No lessons found; nothing saved.");
    } else {
        println!("Saved {} lessons to {}", written, args.output.display());
    }
    Ok(written)
}

fn process_file(input: &Path, args: &ProcessArgs) -> anyhow::Result<()> {
    let rows = store::read_lessons(input)?;
    let processed = parser::process_rows(rows);

    print_level_counts(&processed);
    print_table(&processed, args.limit);

    if let Some(path) = &args.save {
        let saved = store::write_processed(path, &processed)?;
        println!("Saved {} processed rows to {}", saved, path.display());
    }
    Ok(())
}

fn print_level_counts(rows: &[ProcessedRow]) {
    let mut counts: BTreeMap<Level, usize> = Level::ALL.iter().map(|l| (*l, 0)).collect();
    for row in rows {
        *counts.entry(row.level).or_default() += 1;
    }
    let summary: Vec<String> = counts
        .iter()
        .map(|(level, n)| format!("{}: {}", level, n))
        .collect();
    tracing::info!("Levels: {}", summary.join(", "));
}

fn print_table(rows: &[ProcessedRow], limit: usize) {
    if rows.is_empty() {
        println!("No lessons in file.");
    } else {
        println!(
            "{:>4} | {:<36} | {:<12} | {:<40} | {}",
            "ID", "Titulo", "Nivel", "Detalles", "URL"
        );
        println!("{}", "-".repeat(120));

        for r in rows.iter().take(limit) {
            println!(
                "{:>4} | {:<36} | {:<12} | {:<40} | {}",
                r.id,
                truncate(&r.title, 36),
                r.level.as_str(),
                truncate(&r.details, 40),
                r.url
            );
        }
    }

    println!("\n[{} rows x {} columns]", rows.len(), PROCESSED_COLUMNS.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Compact elapsed time: `4.2s`, `3m 07s`, `1h 02m 05s`.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs / 60 % 60) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, m) => format!("{m}m {:02}s", secs % 60),
        (h, m) => format!("{h}h {m:02}m {:02}s", secs % 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("Pronunciación", 20), "Pronunciación");
        assert_eq!(truncate("Pronunciación avanzada", 10), "Pronunc...");
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h 00m 00s");
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["engvid_scraper", "run"]).unwrap();
        match cli.command {
            Commands::Run { scrape, process } => {
                assert_eq!(scrape.url, scraper::LESSONS_URL);
                assert_eq!(scrape.output, PathBuf::from(store::DEFAULT_CSV_PATH));
                assert_eq!(scrape.config().render_timeout, Duration::from_secs(20));
                assert!(scrape.config().headless);
                assert_eq!(process.limit, 50);
                assert!(process.save.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn process_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        let rows = vec![store::LessonRow {
            id: 1,
            title: "Reported speech".into(),
            details: "Grammar | 2-Intermediate".into(),
            url: "https://www.engvid.com/reported-speech/".into(),
        }];
        store::write_lessons(&input, &rows).unwrap();

        let args = ProcessArgs {
            limit: 50,
            save: Some(output.clone()),
        };
        process_file(&input, &args).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("1,Reported speech,Grammar |,https://www.engvid.com/reported-speech/,Intermediate"));
    }
}
