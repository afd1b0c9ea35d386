//! # Stred - A Structural Stream Editor
//!
//! Edits files with structural-regex commands over a piece-table
//! buffer, so even huge files are never loaded whole.
//!
//! ## Quick Start
//!
//! ```bash
//! # print every line containing "error"
//! stred -e ',x/.*\n/ g/error/ p' log.txt
//!
//! # read commands from stdin
//! stred notes.txt
//! ```

use clap::Parser as ArgParser;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stred_buffer::TextBuffer;
use stred_core::{Config, Outcome, Parser, Session};

/// Stred - a structural stream editor
#[derive(ArgParser, Debug)]
#[command(name = "stred")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to edit
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Commands to run instead of reading them from stdin
    #[arg(short, long, value_name = "SCRIPT")]
    expression: Vec<String>,

    /// Configuration file to use instead of the default
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting stred v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let buffer = TextBuffer::from_file(&args.file)?;
    let mut session = Session::new(buffer).with_config(config);

    if args.expression.is_empty() {
        let stdin = std::io::stdin();
        run(&mut session, Parser::new(BufReader::new(stdin.lock())))
    } else {
        run(&mut session, Parser::from_script(args.expression.join("\n")))
    }
}

fn run<R: std::io::BufRead>(session: &mut Session, mut parser: Parser<R>) -> anyhow::Result<()> {
    loop {
        let Some(command) = parser.parse_command()? else {
            return Ok(());
        };
        match session.run(&command) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Terminate) => return Ok(()),
            // a failed command aborts itself, not the session
            Err(err) => {
                tracing::error!("{err}");
                eprintln!("?: {err}");
            }
        }
    }
}
