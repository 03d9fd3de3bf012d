//! Functional block analysis example
//!
//! Usage: cargo run --example functional_block -- <project dir> <schematic> <component> [radius]

use circuitgraph::{GraphService, GraphSettings};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(project), Some(schematic), Some(component)) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: functional_block <project dir> <schematic> <component> [radius]");
        std::process::exit(2);
    };
    let radius = args.next().map(|r| r.parse()).transpose()?;

    let service = GraphService::new(GraphSettings::from_env());
    let project = PathBuf::from(project);
    let schematic = PathBuf::from(schematic);

    let graph = service.build_or_get_graph(&project, &schematic).await?;
    let stats = graph.graph.stats();
    println!(
        "{}: {} components, {} nets ({} power)",
        schematic.display(),
        stats.component_count,
        stats.net_count,
        stats.power_net_count
    );

    for ignore_power in [false, true] {
        let block = service
            .get_neighborhood(&project, &schematic, &component, ignore_power, radius)
            .await?;
        if !block.success {
            println!("{} not found", component);
            return Ok(());
        }

        println!("\nradius {} around {} (ignore power: {})", block.radius, block.start, ignore_power);
        for member in &block.neighborhood {
            println!("  [{}] {:?} {}", member.depth, member.kind, member.id);
        }
    }

    Ok(())
}
