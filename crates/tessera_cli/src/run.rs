//! `tessera run`: maps, loads and runs a network on the virtual board, then
//! stops it and prints the run summary and provenance.

use tessera_diagnostics::DiagnosticSink;
use tessera_exec::{RunLength, RunSummary, Simulator, VirtualBoardExecutor};
use tessera_map::StageTimings;

use crate::map::print_timings;
use crate::pipeline::{load_graph, load_project_config, render_diagnostics};
use crate::{GlobalArgs, ReportFormat, RunArgs};

/// Runs the `tessera run` command.
///
/// Returns exit code 0 when the run completes and 1 when mapping, loading
/// or execution fails.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_project_config(global, false)?;
    if !config.machine.virtual_board {
        return Err("no board transport is available from the command line; \
                    set `machine.virtual_board = true`"
            .into());
    }
    if args.provenance {
        config.reports.provenance = true;
    }
    if args.timings {
        config.reports.timings = true;
    }

    let graph = load_graph(&args.network)?;
    let length = match args.duration {
        Some(ms) => RunLength::Bounded(ms),
        None => RunLength::Unbounded,
    };
    if !global.quiet {
        eprintln!("   Running {} for {length}", args.network.display());
    }

    let mut sim = Simulator::new(config, VirtualBoardExecutor::new());
    let sink = DiagnosticSink::new();
    let result = sim.run(&graph, length, &sink);
    // The simulator already drops notes when reports are disabled.
    render_diagnostics(&sink, args.format, global, true);

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_retryable() {
                eprintln!("   = help: the board did not respond; the run may be retried");
            }
            sim.stop()?;
            return Ok(1);
        }
    };

    match args.format {
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?)
        }
        ReportFormat::Text => print_summary(&summary),
    }
    if !global.quiet {
        for timings in [&summary.mapping_timings, &summary.execution_timings]
            .into_iter()
            .flatten()
        {
            print_timings(timings);
        }
    }

    sim.stop()?;
    if !global.quiet {
        eprintln!("   Stopped");
    }
    Ok(0)
}

fn print_summary(summary: &RunSummary) {
    match summary.time_steps {
        Some(steps) => println!("time steps: {steps}"),
        None => println!("time steps: unbounded"),
    }
    println!("slices: {}", summary.slices);
    println!("chips used: {}", summary.chips_used);
    println!("routing entries: {}", summary.routing_entries);
    println!("images: {}", summary.images);
    println!("fingerprint: {}", summary.fingerprint);
    if !summary.provenance.is_empty() {
        println!("provenance:");
        for item in &summary.provenance {
            println!(
                "  {} {:<24} {:<12} {}",
                item.location, item.image, item.name, item.value
            );
        }
    }
}

fn timings_json(timings: Option<&StageTimings>) -> serde_json::Value {
    match timings {
        Some(t) => t
            .stages
            .iter()
            .map(|(stage, elapsed)| {
                (
                    stage.to_string(),
                    serde_json::Value::from(elapsed.as_secs_f64() * 1e3),
                )
            })
            .collect::<serde_json::Map<_, _>>()
            .into(),
        None => serde_json::Value::Null,
    }
}

fn summary_json(summary: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "fingerprint": summary.fingerprint.to_string(),
        "time_steps": summary.time_steps,
        "slices": summary.slices,
        "chips_used": summary.chips_used,
        "routing_entries": summary.routing_entries,
        "images": summary.images,
        "provenance": summary.provenance,
        "mapping_timings_ms": timings_json(summary.mapping_timings.as_ref()),
        "execution_timings_ms": timings_json(summary.execution_timings.as_ref()),
    })
}
