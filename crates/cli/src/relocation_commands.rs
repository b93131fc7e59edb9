use std::path::PathBuf;

use {
    anyhow::Result,
    clap::Args,
    massmover_channels::MemoryDirectory,
    massmover_common::{ChannelId, OccupantId},
    massmover_config::MassMoverConfig,
    massmover_relocation::{Invoker, MassMover, Report, Settings, StepOutcome, resolve_scope},
    serde_json::{Value, json},
};

use crate::snapshot::load_directory;

#[derive(Args)]
pub struct TargetArgs {
    /// Server snapshot (.json, .toml, or .yaml).
    #[arg(long)]
    pub snapshot: PathBuf,
    /// Channel the occupants are moved into.
    #[arg(long)]
    pub target: ChannelId,
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn handle_scope(config: &MassMoverConfig, args: &TargetArgs) -> Result<()> {
    let dir = load_directory(&args.snapshot)?;
    let settings = Settings::from_config(&config.relocation);
    let scope = resolve_scope(&dir, dir.connection(), args.target, settings.scope)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(scope.as_slice())?);
    } else {
        for channel in &scope {
            println!("{channel}");
        }
    }
    Ok(())
}

pub fn handle_move(
    config: &MassMoverConfig,
    args: &TargetArgs,
    invoker: Option<u16>,
    unattended: bool,
) -> Result<()> {
    let dir = load_directory(&args.snapshot)?;
    let connection = dir.connection();
    let invoker = match (invoker, unattended) {
        (_, true) => Invoker::Unattended,
        (Some(id), false) => Invoker::Occupant(OccupantId(id)),
        (None, false) => Invoker::Local,
    };

    let mover = MassMover::new(dir, Settings::from_config(&config.relocation));
    let report = mover.on_channel_action_triggered(connection, args.target, invoker);
    let output = render(&report, mover.directory());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text(&report, mover.directory());
    }

    if let Some(reason) = &report.abort {
        anyhow::bail!("mass move aborted: {reason}");
    }
    Ok(())
}

fn step(outcome: &StepOutcome) -> Value {
    match outcome {
        StepOutcome::Skipped => json!({ "status": "skipped" }),
        StepOutcome::Moved { count } => json!({ "status": "moved", "count": count }),
        StepOutcome::Failed { count, error } => json!({
            "status": "failed",
            "count": count,
            "code": error.code(),
            "error": error.to_string(),
        }),
    }
}

/// Report plus the occupant placement after the run, as JSON.
fn render(report: &Report, dir: &MemoryDirectory) -> Value {
    let phases: Vec<String> = report.phases.iter().map(ToString::to_string).collect();
    let placement: serde_json::Map<String, Value> = dir
        .placement()
        .into_iter()
        .map(|(occupant, channel)| (occupant.to_string(), json!(channel)))
        .collect();
    json!({
        "connection": report.connection,
        "target": report.target,
        "state": report.state().to_string(),
        "phases": phases,
        "scope": report.scope,
        "occupants": report.occupants,
        "unreadable_channels": report.unreadable_channels,
        "invoker": report.invoker,
        "moved": report.moved(),
        "batch": report.dispatch.as_ref().map(|d| step(&d.batch)),
        "invoker_move": report.dispatch.as_ref().map(|d| step(&d.invoker)),
        "abort": report.abort.as_ref().map(ToString::to_string),
        "placement": placement,
    })
}

fn print_text(report: &Report, dir: &MemoryDirectory) {
    let list = |ids: &[String]| ids.join(" ");
    let scope: Vec<String> = report.scope.iter().map(ToString::to_string).collect();
    let occupants: Vec<String> = report.occupants.iter().map(ToString::to_string).collect();

    println!("state:     {}", report.state());
    println!("scope:     {}", list(&scope));
    println!("occupants: {}", list(&occupants));
    if !report.unreadable_channels.is_empty() {
        let unreadable: Vec<String> = report
            .unreadable_channels
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("unreadable: {}", list(&unreadable));
    }
    println!("moved:     {}", report.moved());
    if let Some(dispatch) = &report.dispatch {
        for error in dispatch.errors() {
            println!("rejected:  {error}");
        }
    }
    println!("placement:");
    for (occupant, channel) in dir.placement() {
        println!("  {occupant} -> {channel}");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        massmover_channels::FaultPlan,
        massmover_common::ConnectionId,
    };

    use super::*;

    fn run(dir: MemoryDirectory, invoker: Invoker) -> Value {
        let mover = MassMover::new(dir, Settings::default());
        let report = mover.on_channel_action_triggered(ConnectionId(1), ChannelId(2), invoker);
        render(&report, mover.directory())
    }

    fn chain() -> MemoryDirectory {
        MemoryDirectory::new(ConnectionId(1), Some(OccupantId(1)))
            .with_channel(1u64, 0u64, &[1])
            .with_channel(2u64, 1u64, &[2])
            .with_channel(3u64, 2u64, &[3])
    }

    #[test]
    fn rendered_report_shows_both_phases_and_placement() {
        let out = run(chain(), Invoker::Local);
        assert_eq!(out["state"], "done");
        assert_eq!(out["scope"], json!([2, 1, 3]));
        assert_eq!(out["moved"], 3);
        assert_eq!(out["batch"], json!({ "status": "moved", "count": 2 }));
        assert_eq!(out["invoker_move"], json!({ "status": "moved", "count": 1 }));
        assert_eq!(out["placement"], json!({ "1": 2, "2": 2, "3": 2 }));
        assert!(out["abort"].is_null());
    }

    #[test]
    fn rejected_batch_carries_the_host_code() {
        let dir = chain().with_faults(FaultPlan {
            relocate_batch: Some(0x0a08),
            ..FaultPlan::default()
        });
        let out = run(dir, Invoker::Local);
        assert_eq!(out["batch"]["status"], "failed");
        assert_eq!(out["batch"]["code"], 0x0a08);
        assert_eq!(out["placement"]["2"], 2);
        assert_eq!(out["placement"]["3"], 3);
    }

    #[test]
    fn abort_is_rendered() {
        let dir = chain().with_faults(FaultPlan {
            self_id: true,
            ..FaultPlan::default()
        });
        let out = run(dir, Invoker::Local);
        assert_eq!(out["state"], "aborted");
        assert!(out["abort"].as_str().unwrap().contains("invoking client"));
        assert!(out["batch"].is_null());
    }
}
