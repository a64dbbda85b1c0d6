//! Main entry point for the gdtf-extract CLI application.
//!
//! Prints the flattened attributes of one GDTF file as `name=value` lines.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufWriter, Write};
use tracing_subscriber::EnvFilter;

use gdtf_extract::{AttributeMap, Cli, extract};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .init();

    let attributes =
        extract(&cli.file).with_context(|| format!("failed to extract attributes from {}", cli.file))?;

    tracing::info!(file = %cli.file, attributes = attributes.len(), "extraction complete");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_attributes(&mut out, &attributes, cli.sorted)?;
    out.flush()?;

    Ok(())
}

/// Write one `name=value` line per attribute.
fn write_attributes<W: Write>(out: &mut W, attributes: &AttributeMap, sorted: bool) -> io::Result<()> {
    let mut pairs: Vec<_> = attributes.iter().collect();
    if sorted {
        pairs.sort_by(|a, b| a.0.cmp(b.0));
    }
    for (name, value) in pairs {
        writeln!(out, "{}={}", name, value)?;
    }
    Ok(())
}
