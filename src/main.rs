mod blobs;
mod blobstore;
mod commands;
mod core;
mod finalize;
mod index;
mod release;
mod ui;
mod utils;

use clap::{ArgAction, Parser, Subcommand};
use core::error::{ReleaseError, print_error};
use finalize::FinalizeOptions;
use std::path::PathBuf;

/// Finalize dev releases into immutable, uniquely versioned final releases
#[derive(Parser)]
#[command(name = "relfin")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// Log more (-v info, -vv debug); RELFIN_LOG overrides
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Finalize release content
  #[command(subcommand)]
  Finalize(FinalizeCommands),
}

#[derive(Subcommand)]
enum FinalizeCommands {
  /// Create a final release from a dev release tarball
  Release {
    /// Path of the dev release tarball
    tarball: PathBuf,
    /// Run every check but write and upload nothing
    #[arg(long)]
    dry_run: bool,
    /// Final release name (default: the dev release's name)
    #[arg(long)]
    name: Option<String>,
    /// Final release version (default: next free version)
    #[arg(long)]
    version: Option<String>,
    /// Output the result in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();
  core::logging::init(cli.verbose);

  let repo_root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => handle_error(ReleaseError::message(format!("Failed to get current directory: {}", e))),
  };

  // Open the release repository once; every command runs inside one
  let repo = match core::context::ReleaseRepo::build(&repo_root) {
    Ok(repo) => repo,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Finalize(FinalizeCommands::Release {
      tarball,
      dry_run,
      name,
      version,
      json,
    }) => {
      let options = FinalizeOptions {
        dry_run,
        name_override: name,
        version_override: version,
      };
      commands::run_finalize_release(&repo, &tarball, options, json)
    }
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: ReleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
