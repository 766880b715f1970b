//! chunkview - Entry Point

use chunkview::integration::{format_assembly, format_metrics, render_plain_text, PlainLines};
use chunkview::model::AppError;
use chunkview::render::{Assembly, ProgressiveRenderer};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// chunkview - progressively render a slice of a large text document
#[derive(Parser, Debug)]
#[command(name = "chunkview")]
#[command(version)]
#[command(about = "Render the visible part of a large document chunk by chunk")]
pub struct Args {
    /// Path to the document
    pub file: PathBuf,

    /// Vertical scroll offset, in line-height units
    #[arg(short, long, default_value_t = 0.0)]
    pub scroll: f64,

    /// Viewport height, in line-height units
    #[arg(long, default_value_t = 400.0)]
    pub height: f64,

    /// Also prefetch the chunks around the viewport
    #[arg(long)]
    pub prefetch: bool,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Lines per chunk (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_size: Option<u32>,

    /// Render worker threads (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Defaults → Config File → Env Vars → CLI Args
    let config = {
        let config_file = chunkview::config::load_config_with_precedence(args.config.clone())?;
        let merged = chunkview::config::merge_config(config_file);
        let with_env = chunkview::config::apply_env_overrides(merged)?;
        chunkview::config::apply_cli_overrides(
            with_env,
            args.chunk_size.map(|n| n as usize),
            args.concurrency.map(|n| n as usize),
        )
    };

    chunkview::logging::init(&config.log_file_path)?;
    info!(config = ?config, "Configuration loaded and resolved");

    run(&args, config.engine_config()?)?;
    Ok(())
}

fn run(args: &Args, config: chunkview::config::EngineConfig) -> Result<(), AppError> {
    let text = std::fs::read_to_string(&args.file)?;
    let engine: ProgressiveRenderer<PlainLines> = ProgressiveRenderer::new(config, render_plain_text)?;
    let chunks = engine.prepare_document(text);
    info!(file = %args.file.display(), chunks, "Document loaded");

    let range = engine.calculate_visible_range(args.scroll, args.height);
    let (progress_tx, progress_rx) = crossbeam_channel::unbounded::<f64>();
    let queued = engine.render_progressively(
        range,
        |initial: Assembly<PlainLines>| {
            info!(
                pending = initial.pending_count(),
                chunks = initial.chunk_count(),
                "Initial assembly ready"
            );
        },
        move |_assembly, fraction| {
            // The receiver only goes away once main is done reporting.
            let _ = progress_tx.send(fraction);
        },
    );
    engine.wait_idle();

    let mut stderr = std::io::stderr().lock();
    for fraction in progress_rx.try_iter() {
        writeln!(stderr, "progress: {:>3.0}%", fraction * 100.0)?;
    }

    if args.prefetch {
        let prefetched = engine.prefetch_nearby_chunks();
        engine.wait_idle();
        writeln!(stderr, "prefetched {} chunks", prefetched)?;
    }

    let assembly = engine.assemble(range);
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(format_assembly(&assembly).as_bytes())?;
    writeln!(
        stderr,
        "lines {}..{} of {}, {} units queued, {}",
        range.start_line,
        range.end_line(),
        engine.total_lines(),
        queued,
        format_metrics(&engine.metrics())
    )?;
    Ok(())
}
