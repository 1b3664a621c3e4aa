//! `tessera map`: maps a network onto the configured machine and prints the
//! placements, routing keys, table usage and tags.

use tessera_common::SliceId;
use tessera_diagnostics::DiagnosticSink;
use tessera_fabric::Fabric;
use tessera_graph::ApplicationGraph;
use tessera_map::{Mapping, StageTimings};

use crate::pipeline::{load_graph, load_project_config, render_diagnostics};
use crate::{GlobalArgs, MapArgs, ReportFormat};

/// Runs the `tessera map` command.
///
/// Returns exit code 0 when mapping succeeds and 1 when a stage fails.
pub fn run(args: &MapArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_project_config(global, false)?;
    if args.validate {
        config.mapping.validate_routes = true;
    }
    if args.timings {
        config.reports.timings = true;
    }

    let graph = load_graph(&args.network)?;
    let mut fabric = Fabric::from_config(&config.machine)?;
    let sink = DiagnosticSink::new();
    let result = tessera_map::map_graph(&graph, &mut fabric, &config, &sink);
    render_diagnostics(&sink, args.format, global, config.reports.enabled);

    let mapping = match result {
        Ok(mapping) => mapping,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(1);
        }
    };

    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&mapping)?),
        ReportFormat::Text => print_mapping(&graph, &mapping),
    }
    if let Some(ref timings) = mapping.timings {
        if !global.quiet {
            print_timings(timings);
        }
    }
    Ok(0)
}

fn unit_label(graph: &ApplicationGraph, mapping: &Mapping, slice: SliceId) -> String {
    mapping
        .partitioned
        .slice(slice)
        .and_then(|s| graph.unit(s.unit))
        .map(|u| u.label.clone())
        .unwrap_or_else(|| format!("{slice}"))
}

fn print_mapping(graph: &ApplicationGraph, mapping: &Mapping) {
    println!("placements:");
    for slice in mapping.partitioned.slices() {
        let location = mapping
            .placements
            .get(slice.id)
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} atoms {:<12} -> {location}",
            unit_label(graph, mapping, slice.id),
            slice.atoms.to_string(),
        );
    }

    println!("keys:");
    for pc in mapping.partitioned.connections() {
        let Some(key) = mapping.keys.get(pc.id) else {
            continue;
        };
        let label = graph
            .connection(pc.connection)
            .map(|c| c.label.as_str())
            .unwrap_or("?");
        println!(
            "  {:<20} from {:<20} key {:#010x} mask {:#010x} ({} target(s))",
            label,
            unit_label(graph, mapping, pc.source),
            key.key,
            key.mask,
            pc.targets.len()
        );
    }

    println!("routing tables:");
    for (chip, table) in mapping.routing_tables.iter() {
        if !table.is_empty() {
            println!("  chip {chip}: {} entr(ies)", table.len());
        }
    }

    if !mapping.tags.is_empty() {
        println!("tags:");
        for tag in &mapping.tags.notification {
            println!(
                "  notification {} for {} -> {}:{}",
                tag.tag,
                graph.unit(tag.unit).map(|u| u.label.as_str()).unwrap_or("?"),
                tag.host,
                tag.port
            );
        }
        for tag in &mapping.tags.reverse {
            println!(
                "  reverse {} port {} -> {}",
                tag.tag, tag.port, tag.destination
            );
        }
    }

    println!("fingerprint: {}", mapping.fingerprint());
}

/// Prints per-stage wall times to stderr.
pub fn print_timings(timings: &StageTimings) {
    for (stage, elapsed) in &timings.stages {
        eprintln!("  {stage:>12} {:>10.3} ms", elapsed.as_secs_f64() * 1e3);
    }
    eprintln!("  {:>12} {:>10.3} ms", "total", timings.total().as_secs_f64() * 1e3);
}
