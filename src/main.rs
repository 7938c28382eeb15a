use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use spanmask::audit::{self, AuditRecord};
use spanmask::document::{self, DocumentText};
use spanmask::render::preview_page;
use spanmask::span::char_len;
use spanmask::{
    ChunkOutcome, CommandOracle, EntityOracle, MaskStyle, RedactionConfig, Redactor, ReplayOracle,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "spanmask")]
#[command(about = "Mask names, organizations and identifiers in extracted document text")]
#[command(version)]
struct Args {
    /// UTF-8 text file to redact (form feeds mark page breaks)
    input: PathBuf,

    /// Maximum chunk size in characters sent to the oracle [env: CHUNK_SIZE]
    #[arg(long, allow_negative_numbers = true)]
    chunk_size: Option<i64>,

    /// Mask style: asterisks or tags [env: MASK_STYLE]
    #[arg(long)]
    mask_style: Option<MaskStyle>,

    /// Oracle calls allowed in flight at once [env: MAX_CONCURRENT_CALLS]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Program run once per chunk: request JSON on stdin, response on stdout
    #[arg(long, conflicts_with = "replay", required_unless_present = "replay")]
    oracle_cmd: Option<String>,

    /// Extra argument for the oracle program (repeatable)
    #[arg(long = "oracle-arg", requires = "oracle_cmd")]
    oracle_args: Vec<String>,

    /// JSON file of recorded oracle responses keyed by chunk offset
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Masked text output path [default: <input>_masked.txt]
    #[arg(long)]
    masked_out: Option<PathBuf>,

    /// Highlighted HTML preview path [default: <input>_preview.html]
    #[arg(long)]
    preview_out: Option<PathBuf>,

    /// Audit JSON path [default: <input>_audit.json]
    #[arg(long)]
    audit_out: Option<PathBuf>,

    /// Suppress console progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    let mut config = RedactionConfig::from_env()?;
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(mask_style) = args.mask_style {
        config.mask_style = mask_style;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent_calls = concurrency;
    }
    // WHY: a bad chunk size or concurrency must fail before the input is read
    // or any oracle process is spawned
    config.validate()?;

    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }
    let document = document::read_document(&args.input).await?;

    if let Some(replay_path) = &args.replay {
        let oracle = ReplayOracle::load(replay_path).await?;
        info!(recordings = oracle.len(), "Loaded replay oracle");
        run(&args, &config, &document, oracle).await
    } else if let Some(program) = &args.oracle_cmd {
        let timeout = Duration::from_secs(config.call_timeout_secs);
        let oracle = CommandOracle::new(program.clone(), args.oracle_args.clone(), timeout);
        run(&args, &config, &document, oracle).await
    } else {
        anyhow::bail!("Either --oracle-cmd or --replay is required")
    }
}

async fn run<O: EntityOracle>(
    args: &Args,
    config: &RedactionConfig,
    document: &DocumentText,
    oracle: O,
) -> Result<()> {
    let redactor = Redactor::new(config, oracle)?;

    let text = &document.full_text;
    let chunk_size = usize::try_from(config.chunk_size).unwrap_or(usize::MAX);
    let expected_chunks = char_len(text).div_ceil(chunk_size) as u64;

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(expected_chunks);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} chunks {msg}",
            )?,
        );
        bar
    };

    let outcome = redactor
        .redact_with_progress(text, |report| {
            if let ChunkOutcome::Failed(failure) = &report.outcome {
                progress.set_message(format!("offset {} failed", report.offset));
                warn!(offset = report.offset, "Chunk contributed no entities: {}", failure);
            }
            progress.inc(1);
        })
        .await?;
    progress.finish_and_clear();

    let masked_path = args
        .masked_out
        .clone()
        .unwrap_or_else(|| audit::masked_output_path(&args.input));
    let preview_path = args
        .preview_out
        .clone()
        .unwrap_or_else(|| audit::preview_output_path(&args.input));
    let audit_path = args
        .audit_out
        .clone()
        .unwrap_or_else(|| audit::audit_output_path(&args.input));

    let title = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    audit::write_artifact(&masked_path, &outcome.masked).await?;
    let preview = preview_page(&title, &outcome.highlighted, &outcome.report);
    audit::write_artifact(&preview_path, &preview).await?;
    AuditRecord::new(&args.input, config, document, &outcome.report)
        .save(&audit_path)
        .await?;

    let report = &outcome.report;
    println!("spanmask v{} - redaction complete", env!("CARGO_PKG_VERSION"));
    println!("  Chunks processed: {}", report.chunks_processed);
    if report.chunks_failed > 0 {
        println!("  Chunks failed: {}", report.chunks_failed);
    }
    println!("  Entities detected: {}", report.entities.len());
    println!("  Spans masked: {}", report.resolved.len());
    println!("  Masked text: {}", masked_path.display());
    println!("  Preview: {}", preview_path.display());
    println!("  Audit log: {}", audit_path.display());

    info!(
        chunks = report.chunks_processed,
        failed = report.chunks_failed,
        masked = report.resolved.len(),
        "Redaction run completed"
    );
    Ok(())
}
