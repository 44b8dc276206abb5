use anyhow::{Context, Result};
use clap::Parser;
use claimscreen::{
    cli::Cli, emitter::ResultEmitter, pipeline::Screener, source::CsvRecordSource,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `RUST_LOG` refines the default level
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = args.resolve_config().context("Invalid configuration")?;

    let source = CsvRecordSource::from_path(&args.input, &config.columns)
        .with_context(|| format!("Failed to open input {}", args.input.display()))?;
    let header = source.header().to_vec();

    let output = File::create(&args.output)
        .with_context(|| format!("Failed to create output {}", args.output.display()))?;
    let mut emitter = ResultEmitter::new(BufWriter::new(output), &header)?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "streaming claims (expects sort by HCPCS code, then claim month)"
    );

    let screener = Screener::new(config)?;
    let summary = screener
        .run(source, &mut emitter)
        .with_context(|| format!("Screening {} failed", args.input.display()))?;

    emitter
        .into_inner()?
        .flush()
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    if !args.quiet {
        eprintln!();
        eprint!("{}", summary.render_text());
        eprintln!(
            "Saved {} outlier rows to {}",
            summary.rows_flagged,
            args.output.display()
        );
    }

    if let Some(path) = &args.summary_json {
        let json = summary.to_json().context("Failed to serialize summary")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
    }

    Ok(())
}
