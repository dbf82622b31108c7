//! Validate command - check a specification file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use forge_spec::{SpecValidator, TechnicalSpecification};

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a Technical Specification JSON file
    #[arg(short, long)]
    file: PathBuf,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating specification: {}", args.file.display());

    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    println!("📋 Validating specification...");
    let spec = TechnicalSpecification::from_json(&raw)
        .context("specification does not parse as the schema")?;
    let result = SpecValidator::validate(&spec);

    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    if result.valid {
        println!("   ✅ {} is valid", spec.name);
        println!(
            "      {} page(s), {} data model(s), {} api route(s)",
            spec.pages.len(),
            spec.data_models.len(),
            spec.api_routes.len()
        );
        Ok(())
    } else {
        println!("   ❌ Validation failed:");
        for error in &result.errors {
            println!("      - {}", error);
        }
        anyhow::bail!("Spec validation failed: {}", result.error_summary())
    }
}
