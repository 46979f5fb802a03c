use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use propsuggest::cancel::{cancel_on_interrupt, CancelToken};
use propsuggest::config::{INTERRUPTED_EXIT_CODE, PROGRESS_INTERVAL};
use propsuggest::error::ReadError;
use propsuggest::export::write_rules_csv;
use propsuggest::input::{open_entities, DumpFormat};
use propsuggest::models::Entity;
use propsuggest::rules::RuleGenerator;
use propsuggest::stats::ReadStats;
use propsuggest::tabular::write_entities_csv;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "propsuggest")]
#[command(about = "Compute property suggestion rules from Wikibase entity dumps")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a dump into flat entity rows
    Convert(ConvertArgs),
    /// Compute suggestion rules from a dump or a converted row file
    Rules(RulesArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Path to the input (.json, .xml or .csv, optionally .bz2)
    #[arg(short, long)]
    input: String,

    /// Input format (detected from the file name if omitted)
    #[arg(long, value_enum)]
    format: Option<DumpFormat>,

    /// Decode threads (1 = serial, dump order preserved)
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Stop after this many entities (for testing)
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct ConvertArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output path for the entity rows
    #[arg(short, long)]
    output: String,
}

#[derive(Args)]
struct RulesArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output path for the rules CSV
    #[arg(short, long)]
    output: String,
}

fn make_spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(msg.to_string());
    Ok(pb)
}

/// Opens the input and applies `--limit`, updating `pb` as entities arrive.
///
/// The returned counter holds the entities actually handed on. With parallel decoding
/// the reader may decode a few past the limit, so it can trail [`ReadStats::entities`].
fn entity_stream(
    source: &SourceArgs,
    cancel: CancelToken,
    stats: &Arc<ReadStats>,
    pb: &ProgressBar,
) -> Result<(impl Iterator<Item = Result<Entity, ReadError>>, Arc<AtomicU64>)> {
    let stream = open_entities(
        &source.input,
        source.format,
        source.threads,
        cancel,
        Arc::clone(stats),
    )?;
    let limit = source
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
    if source.limit.is_some() {
        info!(limit, "Limiting run");
    }

    let pb = pb.clone();
    let taken = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&taken);
    let stream = stream.take(limit).inspect(move |entity| {
        if entity.is_err() {
            return;
        }
        let seen = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % PROGRESS_INTERVAL == 0 {
            pb.set_message(format!("{} entities", seen));
        }
    });
    Ok((stream, taken))
}

fn print_read_summary(stats: &ReadStats, used: u64, elapsed: Duration) {
    println!();
    println!("=== Summary ===");
    println!("Elapsed time:       {:.2}s", elapsed.as_secs_f64());
    println!();
    println!("Entities read:      {}", stats.entities());
    println!("Entities used:      {}", used);
    println!("Claims read:        {}", stats.claims());
    println!("Claims dropped:     {}", stats.claims_dropped());
    println!("Snaks dropped:      {}", stats.snaks_dropped());
    println!("Records skipped:    {}", stats.records_skipped());
}

fn run_convert(args: ConvertArgs, cancel: CancelToken) -> Result<()> {
    let start = Instant::now();
    let stats = Arc::new(ReadStats::new());
    let pb = make_spinner("Converting entities ...")?;

    let (entities, taken) = entity_stream(&args.source, cancel, &stats, &pb)?;
    let rows = write_entities_csv(Path::new(&args.output), entities);
    pb.finish_and_clear();
    let rows = rows.context("Conversion aborted; no entity file written")?;

    print_read_summary(&stats, taken.load(Ordering::Relaxed), start.elapsed());
    println!("Rows written:       {}", rows);
    Ok(())
}

fn run_rules(args: RulesArgs, cancel: CancelToken) -> Result<()> {
    let start = Instant::now();
    let stats = Arc::new(ReadStats::new());
    let pb = make_spinner("Counting property co-occurrences ...")?;

    let mut generator = RuleGenerator::new();
    let counted = entity_stream(&args.source, cancel, &stats, &pb).and_then(|(entities, _)| {
        for entity in entities {
            generator.observe(&entity?);
        }
        Ok(())
    });
    pb.finish_and_clear();
    counted.context("Reading entities failed; no rules written")?;

    let counting_duration = start.elapsed();
    info!(
        duration_secs = counting_duration.as_secs_f64(),
        entities = generator.entities_observed(),
        "Counting complete"
    );
    let generator_entities = generator.entities_observed();
    let skipped_item_values = generator.skipped_item_values();

    let written = write_rules_csv(Path::new(&args.output), generator.into_rules())?;

    print_read_summary(&stats, generator_entities, start.elapsed());
    println!("Item values skipped: {}", skipped_item_values);
    println!("Rules written:      {}", written);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let cancel = CancelToken::new();
    if let Err(e) = cancel_on_interrupt(cancel.clone()) {
        warn!(error = %e, "Ctrl-C handling unavailable");
    }

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args, cancel),
        Commands::Rules(args) => run_rules(args, cancel),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) if e.downcast_ref::<ReadError>().is_some_and(ReadError::is_cancelled) => {
            eprintln!("Interrupted: {:#}", e);
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
