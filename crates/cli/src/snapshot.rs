//! Server snapshots on disk.

use std::path::Path;

use {
    anyhow::{Context, Result, bail},
    massmover_channels::{MemoryDirectory, ServerSnapshot},
    tracing::debug,
};

/// Parse a snapshot file; the format follows the extension.
pub fn read_snapshot(path: &Path) -> Result<ServerSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let snapshot: ServerSnapshot = match ext {
        "json" => serde_json::from_str(&raw)?,
        "toml" => toml::from_str(&raw)?,
        "yaml" | "yml" => serde_yaml::from_str(&raw)?,
        _ => bail!("unsupported snapshot format: .{ext}"),
    };
    debug!(
        path = %path.display(),
        channels = snapshot.channels.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

pub fn load_directory(path: &Path) -> Result<MemoryDirectory> {
    let snapshot = read_snapshot(path)?;
    MemoryDirectory::from_snapshot(snapshot)
        .with_context(|| format!("invalid snapshot {}", path.display()))
}
