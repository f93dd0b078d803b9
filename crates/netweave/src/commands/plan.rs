//! `netweave plan` - show the layered creation order without side effects

use colored::Colorize;
use netweave::topology;

pub fn handle_plan() -> anyhow::Result<()> {
    let graph = topology::webapp_topology()?;
    let plan = graph.plan()?;

    println!("{}", "Creation plan".bold());
    for (index, layer) in plan.layers().iter().enumerate() {
        println!();
        println!("  {} {}", "Layer".cyan(), index.to_string().cyan());
        for id in layer {
            let node = graph.get(id)?;
            println!("    {} {}", format!("[{}]", node.kind).dimmed(), id);
        }
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
    Ok(())
}
