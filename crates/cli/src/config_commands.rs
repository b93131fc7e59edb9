use std::path::{Path, PathBuf};

use {
    anyhow::{Result, bail},
    massmover_config::{MassMoverConfig, Severity, find_config_file, load_config, search_dirs},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load the configuration named on the command line, or discover one.
///
/// An explicit file, or a file found in an explicit directory, must parse.
/// A file discovered in the standard locations falls back to defaults.
pub fn load(explicit: Option<&Path>) -> Result<(MassMoverConfig, Option<PathBuf>)> {
    match explicit {
        Some(dir) if dir.is_dir() => match find_config_file(&[dir.to_path_buf()]) {
            Some(path) => Ok((load_config(&path)?, Some(path))),
            None => Ok((MassMoverConfig::default(), None)),
        },
        Some(path) => Ok((load_config(path)?, Some(path.to_path_buf()))),
        None => Ok(discover(&search_dirs())),
    }
}

/// First loadable config in `dirs`, or defaults.
///
/// Runs before logging is set up, so a broken file is reported on stderr.
fn discover(dirs: &[PathBuf]) -> (MassMoverConfig, Option<PathBuf>) {
    let Some(path) = find_config_file(dirs) else {
        return (MassMoverConfig::default(), None);
    };
    match load_config(&path) {
        Ok(cfg) => (cfg, Some(path)),
        Err(e) => {
            eprintln!("{YELLOW}warning{RESET} {}: {e}; using defaults", path.display());
            (MassMoverConfig::default(), Some(path))
        },
    }
}

pub fn handle_check(config: &MassMoverConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let diagnostics = massmover_config::validate(config);
    for d in &diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;

    if !diagnostics.is_empty() {
        eprintln!();
    }
    if diagnostics.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        bail!("configuration has {errors} error(s)");
    }
    Ok(())
}
