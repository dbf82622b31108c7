//! CLI command definitions.
//!
//! Each subcommand maps to one operation against the generation
//! pipeline.

use clap::{Parser, Subcommand};

pub mod queues;
pub mod submit;
pub mod validate;

/// AppForge - prompt-to-deployment application generation
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "AppForge - prompt-to-deployment application generation")]
#[command(long_about = r#"
AppForge turns a natural-language prompt into a generated, built and
deployed application, driving the whole journey through durable job
queues with automated repair on build failure.

WORKFLOWS:
  submit    → Submit a prompt and follow the run to completion
  validate  → Validate a Technical Specification file
  queues    → Show queue configuration and counters

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Pipeline failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a prompt and stream progress until the run settles
    Submit(submit::SubmitArgs),

    /// Validate a Technical Specification JSON file
    Validate(validate::ValidateArgs),

    /// Show the pipeline queues and their default policies
    Queues(queues::QueuesArgs),
}
