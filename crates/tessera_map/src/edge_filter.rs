//! Pruning partitioned connections that can never carry traffic.

use tessera_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tessera_graph::{ApplicationGraph, PartitionedGraph};

/// Drops every target slice the connectivity rule cannot reach from the
/// source slice, then removes partitioned connections left with no target.
///
/// Never adds connections and never fails. Returns the number of
/// partitioned connections removed.
pub fn filter_edges(
    graph: &ApplicationGraph,
    partitioned: &mut PartitionedGraph,
    sink: &DiagnosticSink,
) -> usize {
    let mut pruned_targets = 0usize;
    let kept_targets: Vec<_> = partitioned
        .connections()
        .iter()
        .map(|pc| {
            let Some(connection) = graph.connection(pc.connection) else {
                return Vec::new();
            };
            let Some(source) = partitioned.slice(pc.source) else {
                return Vec::new();
            };
            pc.targets
                .iter()
                .copied()
                .filter(|&t| {
                    let keep = partitioned
                        .slice(t)
                        .is_some_and(|target| connection.rule.may_connect(source.atoms, target.atoms));
                    if !keep {
                        pruned_targets += 1;
                    }
                    keep
                })
                .collect()
        })
        .collect();

    for (pc, targets) in partitioned.connections_mut().iter_mut().zip(kept_targets) {
        pc.targets = targets;
    }
    let removed = partitioned.retain_connections(|pc| !pc.targets.is_empty());

    tracing::debug!(removed, pruned_targets, "filtered partitioned connections");
    if pruned_targets > 0 {
        sink.emit(Diagnostic::note(
            DiagnosticCode::CONNECTIONS_PRUNED,
            format!(
                "pruned {pruned_targets} unreachable slice targets; {removed} partitioned connections removed"
            ),
        ));
    }
    removed
}
