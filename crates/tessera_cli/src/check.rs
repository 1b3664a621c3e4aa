//! `tessera check`: validates the project configuration and, optionally, a
//! network file, without mapping anything.

use tessera_fabric::Fabric;

use crate::pipeline::{load_graph, load_project_config};
use crate::{CheckArgs, GlobalArgs};

/// Runs the `tessera check` command.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_project_config(global, true)?;
    let fabric = Fabric::from_config(&config.machine)?;

    if !global.quiet {
        let machine = &config.machine;
        eprintln!(
            "   Machine {}x{} ({} chip(s), {} application core(s){})",
            machine.width,
            machine.height,
            fabric.len(),
            fabric.application_core_count(),
            if machine.wrap_around { ", wrap-around" } else { "" },
        );
        eprintln!("    Budget {} per core", machine.core_budget());
        let mapping = &config.mapping;
        eprintln!(
            "   Mapping {:?} partitioner, {:?} placer, {:?} router, {:?} keys ({} bits)",
            mapping.partitioner,
            mapping.placer,
            mapping.router,
            mapping.key_allocator,
            config.keys.width_bits,
        );
    }

    if let Some(ref path) = args.network {
        let graph = load_graph(path)?;
        if !global.quiet {
            eprintln!(
                "   Network {} unit(s), {} connection(s), {} atom(s)",
                graph.units().len(),
                graph.connections().len(),
                graph.total_atoms()
            );
        }
    }

    if !global.quiet {
        eprintln!("        Ok");
    }
    Ok(0)
}
