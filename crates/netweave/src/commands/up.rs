//! `netweave up` - create the webapp topology against the simulated backend

use colored::Colorize;
use netweave::topology;
use netweave_cloud::RetryConfig;
use netweave_cloud_sim::SimBackend;
use netweave_core::{ApplyOptions, ApplyOutcome, NodeStatus, Provisioner};
use std::time::Duration;

pub struct UpArgs {
    pub max_concurrency: Option<usize>,
    pub no_rollback: bool,
    pub retries: Option<u32>,
    pub latency_ms: u64,
    pub fail: Option<String>,
}

pub async fn handle_up(args: UpArgs) -> anyhow::Result<()> {
    let mut graph = topology::webapp_topology()?;
    let plan = graph.plan()?;
    println!("{} {}", "Applying:".bold(), plan.summary());

    let backend = SimBackend::new().with_latency(Duration::from_millis(args.latency_ms));
    if let Some(id) = &args.fail {
        backend.fail_create(id.clone());
        println!("{}", format!("  (injecting create failure for '{}')", id).yellow());
    }

    let options = ApplyOptions {
        max_concurrency: args.max_concurrency,
        rollback_on_failure: !args.no_rollback,
        retry: args.retries.map(|max_attempts| RetryConfig {
            max_attempts,
            ..Default::default()
        }),
        ..Default::default()
    };
    let report = Provisioner::new(options).apply(&mut graph, &backend).await?;

    println!();
    for node in graph.nodes() {
        let line = match node.status {
            NodeStatus::Created => format!(
                "  ✓ {} {} ({})",
                node.kind,
                node.id,
                node.output("ref").and_then(|v| v.as_str()).unwrap_or("?")
            )
            .green(),
            NodeStatus::RolledBack => format!("  ↩ {} {} (rolled back)", node.kind, node.id).yellow(),
            NodeStatus::Failed => format!("  ✗ {} {}", node.kind, node.id).red(),
            _ => format!("  - {} {} ({})", node.kind, node.id, node.status).dimmed(),
        };
        println!("{}", line);
    }

    println!();
    match report.outcome {
        ApplyOutcome::Applied => {
            println!(
                "{} {} resources created in {}ms",
                "✓".green().bold(),
                report.created.len(),
                report.duration_ms
            );
            if let Some(dns) = graph
                .node("web-alb")
                .and_then(|n| n.output("dns_name"))
                .and_then(|v| v.as_str())
            {
                println!("  {} {}", "Load balancer:".bold(), dns.cyan());
            }
        }
        ApplyOutcome::RolledBack => {
            for failure in &report.failures {
                println!(
                    "{} create of {} '{}' failed after {} attempt(s): {}",
                    "✗".red().bold(),
                    failure.kind,
                    failure.node_id,
                    failure.attempts,
                    failure.error
                );
            }
            println!("{}", "All created resources were rolled back.".yellow());
        }
        ApplyOutcome::RollbackFailed => {
            for failure in &report.failures {
                println!(
                    "{} create of {} '{}' failed: {}",
                    "✗".red().bold(),
                    failure.kind,
                    failure.node_id,
                    failure.error
                );
            }
            for failure in &report.rollback_failures {
                println!(
                    "{} rollback of '{}' failed: {}",
                    "‼".red().bold(),
                    failure.node_id,
                    failure.error
                );
            }
            println!(
                "{}",
                "Rollback incomplete - resources may be orphaned!".red().bold()
            );
        }
        ApplyOutcome::Partial => {
            for failure in &report.failures {
                println!(
                    "{} create of {} '{}' failed: {}",
                    "✗".red().bold(),
                    failure.kind,
                    failure.node_id,
                    failure.error
                );
            }
            println!(
                "{}",
                "Stopped with rollback disabled; created resources remain.".yellow()
            );
        }
    }

    if !report.is_success() {
        anyhow::bail!("provisioning did not complete");
    }
    Ok(())
}
