//! Queues command - show queue policies and counters.

use anyhow::Result;
use clap::Args;

use forge_queue::QueueRegistry;

#[derive(Args)]
pub struct QueuesArgs {
    /// Emit machine-readable JSON instead of the table
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: QueuesArgs) -> Result<()> {
    let registry = QueueRegistry::with_defaults();

    if args.json {
        let report: Vec<serde_json::Value> = registry
            .counts()
            .into_iter()
            .map(|(kind, counts)| {
                serde_json::json!({
                    "queue": kind.as_str(),
                    "counts": counts,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📦 Pipeline queues:");
    println!(
        "   {:<15} {:>11} {:>9} {:>12} {:>11}",
        "queue", "concurrency", "priority", "max attempts", "timeout"
    );
    for (kind, _) in registry.counts() {
        let queue = registry.queue(kind)?;
        let config = queue.config();
        let timeout = config
            .job_timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "none".to_string());
        println!(
            "   {:<15} {:>11} {:>9} {:>12} {:>11}",
            kind.as_str(),
            config.concurrency,
            config.default_priority,
            config.default_max_attempts,
            timeout
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_table_and_json_render() {
        assert!(execute(QueuesArgs { json: false }).await.is_ok());
        assert!(execute(QueuesArgs { json: true }).await.is_ok());
    }
}
