// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk: document transformation pipeline.
//
// Entry point. Initialises logging, loads configuration, runs one request
// and writes the result. Failures are printed as a JSON error report on
// stderr with exit status 1.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blattwerk_core::error::Result;
use blattwerk_core::{ErrorReport, PipelineConfig};
use blattwerk_pipeline::{InputFile, PipelineOrchestrator, PipelineRequest};
use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Blattwerk failed");
            eprintln!("{}", ErrorReport::from(&err).to_json());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::from_env()?,
    };
    let orchestrator = PipelineOrchestrator::new(config)?;

    let (request, output) = build_request(cli.command).await?;
    let bytes = orchestrator.execute(request).await?;

    tokio::fs::write(&output, &bytes).await?;
    tracing::info!(path = %output.display(), bytes = bytes.len(), "Output written");
    Ok(())
}

/// Read the named inputs and pair the request with its destination.
async fn build_request(command: Command) -> Result<(PipelineRequest, PathBuf)> {
    let built = match command {
        Command::Merge { inputs, output } => (
            PipelineRequest::Merge {
                files: read_all(&inputs).await?,
                preset: output.preset,
            },
            output.output,
        ),
        Command::Split { input, pages, output } => (
            PipelineRequest::Split {
                file: InputFile::read(&input).await?,
                range: pages,
                preset: output.preset,
            },
            output.output,
        ),
        Command::Reorder { input, order, output } => (
            PipelineRequest::Reorder {
                file: InputFile::read(&input).await?,
                order,
                preset: output.preset,
            },
            output.output,
        ),
        Command::Compress { input, output, preset } => (
            PipelineRequest::Compress {
                file: InputFile::read(&input).await?,
                preset,
            },
            output,
        ),
        Command::Ocr { input, output } => (
            PipelineRequest::Ocrize {
                file: InputFile::read(&input).await?,
                preset: output.preset,
            },
            output.output,
        ),
        Command::Images { inputs, output } => (
            PipelineRequest::ImagesToPdf {
                files: read_all(&inputs).await?,
                preset: output.preset,
            },
            output.output,
        ),
    };
    Ok(built)
}

async fn read_all(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(InputFile::read(Path::new(path)).await?);
    }
    Ok(files)
}
