use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{env_subst::substitute_env, schema::MassMoverConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "massmover.toml",
    "massmover.yaml",
    "massmover.yml",
    "massmover.json",
];

/// Environment variable overriding the user-global config directory.
pub const CONFIG_DIR_ENV: &str = "MASSMOVER_CONFIG_DIR";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<MassMoverConfig> {
    debug!(path = %path.display(), "loading config");
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Directories searched for a config file, in order.
///
/// 1. `.` (working directory)
/// 2. `$MASSMOVER_CONFIG_DIR` or `~/.config/massmover/`
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    dirs.extend(config_dir());
    dirs
}

/// First config file found in `dirs`, in directory then file-name order.
pub fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.is_file())
}

/// Returns the user-global config directory (`~/.config/massmover/`), or the
/// `MASSMOVER_CONFIG_DIR` override when set.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("", "", "massmover").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<MassMoverConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("massmover.toml");
        std::fs::write(
            &path,
            "[menu]\nlabel = \"Pull everyone\"\n[relocation]\nmove_invoker_last = false\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.menu.label, "Pull everyone");
        assert!(!cfg.relocation.move_invoker_last);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("massmover.yaml");
        std::fs::write(&yaml, "logging:\n  level: debug\n").unwrap();
        assert_eq!(load_config(&yaml).unwrap().logging.level, "debug");

        let json = dir.path().join("massmover.json");
        std::fs::write(&json, r#"{"relocation":{"reason":"moved"}}"#).unwrap();
        assert_eq!(load_config(&json).unwrap().relocation.reason, "moved");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("massmover.ini");
        std::fs::write(&path, "").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn discovery_prefers_earlier_directories() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(
            first.path().join("massmover.json"),
            r#"{"menu":{"label":"first"}}"#,
        )
        .unwrap();
        std::fs::write(
            second.path().join("massmover.toml"),
            "[menu]\nlabel = \"second\"\n",
        )
        .unwrap();
        let found =
            find_config_file(&[first.path().to_path_buf(), second.path().to_path_buf()]).unwrap();
        assert_eq!(found, first.path().join("massmover.json"));
        assert_eq!(load_config(&found).unwrap().menu.label, "first");
    }

    #[test]
    fn file_names_are_checked_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("massmover.yml"), "").unwrap();
        std::fs::write(dir.path().join("massmover.toml"), "").unwrap();
        assert_eq!(
            find_config_file(&[dir.path().to_path_buf()]),
            Some(dir.path().join("massmover.toml"))
        );
    }

    #[test]
    fn working_directory_is_searched_first() {
        assert_eq!(search_dirs().first(), Some(&PathBuf::from(".")));
    }
}
