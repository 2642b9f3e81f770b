// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use blattwerk_core::CompressionPreset;
use clap::{Args, Parser, Subcommand};

/// Merge, split, reorder, compress and OCR PDF documents.
#[derive(Parser, Debug)]
#[command(name = "blattwerk")]
#[command(version)]
#[command(about = "Transform PDF documents and scanned images", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// JSON pipeline configuration
    ///
    /// Without this flag, `BLATTWERK_CONFIG` and `BLATTWERK_GS` are consulted.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Concatenate PDFs in the order given
    Merge {
        #[arg(required = true, value_name = "FILE")]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Keep only the pages named by a range such as "1-3,5,8-10"
    Split {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        /// 1-based pages and inclusive ranges, comma separated
        #[arg(short, long, value_name = "RANGE")]
        pages: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Rearrange pages by a JSON array of 0-based indices, e.g. "[2,0,1]"
    Reorder {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        #[arg(long, value_name = "JSON")]
        order: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Recompress a PDF with Ghostscript
    Compress {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        /// Output file path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// screen, ebook, printer, prepress or default
        #[arg(long, value_name = "PRESET", default_value = "default")]
        preset: CompressionPreset,
    },

    /// Add an invisible text layer to a scanned PDF or image
    Ocr {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Put each image on its own page
    Images {
        #[arg(required = true, value_name = "IMAGE")]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Destination and optional compression pass shared by most subcommands.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Compress the result: screen, ebook, printer, prepress or default
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<CompressionPreset>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn split_takes_range_and_preset() {
        let cli = Cli::try_parse_from([
            "blattwerk", "split", "in.pdf", "--pages", "1-3,5", "-o", "out.pdf", "--preset", "screen",
        ])
        .unwrap();
        match cli.command {
            Command::Split { input, pages, output } => {
                assert_eq!(input, PathBuf::from("in.pdf"));
                assert_eq!(pages, "1-3,5");
                assert_eq!(output.preset, Some(CompressionPreset::Screen));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_preset_is_a_usage_error() {
        let err = Cli::try_parse_from(["blattwerk", "compress", "in.pdf", "-o", "out.pdf", "--preset", "tiny"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn compress_without_preset_uses_ghostscript_defaults() {
        let cli = Cli::try_parse_from(["blattwerk", "compress", "in.pdf", "-o", "out.pdf"]).unwrap();
        match cli.command {
            Command::Compress { preset, .. } => assert_eq!(preset, CompressionPreset::Default),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["blattwerk", "merge", "a.pdf", "b.pdf", "-o", "m.pdf", "-v", "--config", "c.json"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
    }
}
