//! `netweave graph` - dump the dependency graph for Graphviz

use netweave::topology;

pub fn handle_graph() -> anyhow::Result<()> {
    let graph = topology::webapp_topology()?;
    // Render with: netweave graph | dot -Tpng -o topology.png
    println!("{}", graph.to_dot());
    Ok(())
}
