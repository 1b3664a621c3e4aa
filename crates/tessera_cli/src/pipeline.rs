//! Shared helpers for CLI commands: project config resolution, network
//! loading and diagnostic rendering.

use std::path::{Path, PathBuf};

use tessera_config::{TesseraConfig, CONFIG_FILE_NAME};
use tessera_diagnostics::{DiagnosticRenderer, DiagnosticSink, Severity, TerminalRenderer};
use tessera_graph::ApplicationGraph;

use crate::network::load_network;
use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest directory containing `tessera.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Loads the configuration named by `--config`, or the nearest `tessera.toml`.
///
/// `--config` may name either the file itself or the directory holding it.
/// With `required` unset, a missing project file yields the defaults.
pub fn load_project_config(
    global: &GlobalArgs,
    required: bool,
) -> Result<TesseraConfig, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let path = PathBuf::from(config_path);
        let config = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            tessera_config::load_config_from_str(&content)?
        } else {
            tessera_config::load_config(&path)?
        };
        return Ok(config);
    }

    let cwd = std::env::current_dir()?;
    match find_project_root(&cwd) {
        Some(root) => {
            tracing::debug!(root = %root.display(), "using project configuration");
            Ok(tessera_config::load_config(&root)?)
        }
        None if required => Err(format!(
            "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
            cwd.display()
        )
        .into()),
        None => {
            tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
            Ok(TesseraConfig::default())
        }
    }
}

/// Reads a network file and builds its application graph.
pub fn load_graph(path: &Path) -> Result<ApplicationGraph, Box<dyn std::error::Error>> {
    let network = load_network(path)?;
    let graph = network.build_graph()?;
    tracing::info!(
        units = graph.units().len(),
        connections = graph.connections().len(),
        atoms = graph.total_atoms(),
        "loaded network"
    );
    Ok(graph)
}

/// Prints accumulated diagnostics in the requested format.
///
/// Both formats write to stderr; stdout carries only the command's result.
/// Notes are dropped unless `notes` is set.
pub fn render_diagnostics(
    sink: &DiagnosticSink,
    format: ReportFormat,
    global: &GlobalArgs,
    notes: bool,
) {
    let mut diagnostics = sink.take_all();
    diagnostics.retain(|d| notes || d.severity != Severity::Note);
    if diagnostics.is_empty() {
        return;
    }

    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &diagnostics {
                if global.quiet && !diag.severity.is_error() {
                    continue;
                }
                eprintln!("{}", renderer.render(diag));
            }
            if !global.quiet {
                let warnings = diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Warning)
                    .count();
                let errors = diagnostics.iter().filter(|d| d.severity.is_error()).count();
                eprintln!("   Result: {errors} error(s), {warnings} warning(s)");
            }
        }
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(&diagnostics).unwrap_or_else(|_| "[]".to_string());
            eprintln!("{json}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            color: false,
            config,
        }
    }

    #[test]
    fn find_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn config_flag_accepts_file_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&file, "[machine]\nwidth = 3\nheight = 1\n").unwrap();

        let from_file =
            load_project_config(&global(Some(file.display().to_string())), true).unwrap();
        assert_eq!(from_file.machine.width, 3);

        let from_dir =
            load_project_config(&global(Some(dir.path().display().to_string())), true).unwrap();
        assert_eq!(from_dir, from_file);
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&file, "[machine]\nwidth = 0\n").unwrap();
        assert!(load_project_config(&global(Some(file.display().to_string())), true).is_err());
    }

    #[test]
    fn load_graph_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("net.toml");
        std::fs::write(
            &file,
            "[[unit]]\nlabel = \"a\"\natoms = 10\nimage = \"a.aplx\"\n",
        )
        .unwrap();
        let graph = load_graph(&file).unwrap();
        assert_eq!(graph.total_atoms(), 10);
        assert!(load_graph(&dir.path().join("missing.toml")).is_err());
    }
}
