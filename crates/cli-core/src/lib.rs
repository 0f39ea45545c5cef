// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! CLI core: argument parsing, churn workload and event reporting for `mapev`.
//!
//! `run` loads a map declaration document, creates one in-memory map per
//! declared map, starts their garbage-collection controllers, applies a
//! deterministic churn workload (updates with a periodic `delete_all`) and
//! prints each map's events followed by the controller statistics.

mod render;

pub use render::{render_event_table, render_stats_table};

use clap::builder::PossibleValue;
use clap::{Arg, ArgAction, ArgMatches, Command};
use futures::StreamExt;
use mapev_api::{DumpMode, Error as ApiError, EventStreamItem, MapEventsService, StreamOptions};
use mapev_config::{MapEventsDocument, MapName};
use mapev_controller::{ControllerManager, start_event_buffer_gc};
use mapev_engine::Map;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Keys cycle through this many slots, so updates overwrite earlier keys.
const CHURN_KEY_SPACE: u32 = 97;
/// A `delete_all` runs every this many operations.
const CHURN_DELETE_ALL_EVERY: usize = 50;

/// Output format of the event listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned text table.
    #[default]
    Table,
    /// One JSON document per map.
    Json,
}

/// Parsed command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Map declaration document (`.json`, `.yaml` or `.yml`).
    pub config: Option<PathBuf>,
    /// Number of churn operations applied to each map.
    pub ops: usize,
    /// Restrict the run to one map.
    pub map: Option<String>,
    /// Listing format.
    pub output: OutputFormat,
    /// Stream events while the workload runs.
    pub follow: bool,
    /// Which buffered events the listing includes.
    pub dump_mode: DumpMode,
    /// Print the configuration JSON schema and exit.
    pub print_schema: bool,
}

/// Builds the base clap command.
#[must_use]
pub fn base_command() -> Command {
    Command::new("mapev")
        .about("Record, list and stream BPF map mutation events")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf))
                .required_unless_present("print-schema")
                .help("Path to the map declaration file (.json, .yaml, or .yml)"),
        )
        .arg(
            Arg::new("ops")
                .long("ops")
                .num_args(1)
                .value_parser(clap::value_parser!(usize))
                .default_value("1000")
                .help("Number of churn operations applied to each map"),
        )
        .arg(
            Arg::new("map")
                .short('m')
                .long("map")
                .num_args(1)
                .help("Only run against this map"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser([PossibleValue::new("table"), PossibleValue::new("json")])
                .default_value("table")
                .help("Listing format (table, json)"),
        )
        .arg(
            Arg::new("follow")
                .short('f')
                .long("follow")
                .action(ArgAction::SetTrue)
                .help("Stream events while the workload runs and report what each stream saw"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Include expired events that were not compacted yet"),
        )
        .arg(
            Arg::new("print-schema")
                .long("print-schema")
                .action(ArgAction::SetTrue)
                .help("Print the JSON schema of the configuration file and exit"),
        )
        .after_help("Examples:\n  mapev --config maps.yaml --ops 5000\n  mapev -c maps.yaml -m lb4-services -o json --follow")
}

/// Extracts [`CliArgs`] from matches of [`base_command`].
#[must_use]
pub fn parse_args(m: &ArgMatches) -> CliArgs {
    let output = match m.get_one::<String>("output").map(String::as_str) {
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Table,
    };
    CliArgs {
        config: m.get_one::<PathBuf>("config").cloned(),
        ops: m.get_one::<usize>("ops").copied().unwrap_or(1000),
        map: m.get_one::<String>("map").cloned(),
        output,
        follow: m.get_flag("follow"),
        dump_mode: if m.get_flag("all") {
            DumpMode::All
        } else {
            DumpMode::Valid
        },
        print_schema: m.get_flag("print-schema"),
    }
}

/// Runs `mapev` on a new multi-threaded runtime, writing the report to `out`.
pub fn run(args: CliArgs, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    if args.print_schema {
        writeln!(out, "{}", serde_json::to_string_pretty(&MapEventsDocument::json_schema())?)?;
        return Ok(());
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mapev")
        .build()?;
    runtime.block_on(run_async(args, out))
}

/// Runs `mapev` on the current runtime, writing the report to `out`.
pub async fn run_async(args: CliArgs, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = &args.config else {
        return Err("--config is required".into());
    };
    let document = MapEventsDocument::from_file(config)?;

    let selected = match &args.map {
        Some(name) => {
            let name = MapName::parse(name)?;
            if !document.maps.contains_key(&name) {
                return Err(format!("map {name} is not declared in {}", config.display()).into());
            }
            vec![name]
        }
        None => document.maps.keys().cloned().collect(),
    };

    let service = MapEventsService::new();
    let manager = ControllerManager::try_current()?;
    let mut maps = Vec::with_capacity(selected.len());
    for name in selected {
        let Some(spec) = document.maps.get(&name) else {
            continue;
        };
        let map: Map<u32, u64> = Map::from_spec(name, spec);
        service.register(Arc::new(map.clone()))?;
        _ = start_event_buffer_gc(&manager, &map)?;
        maps.push(map);
    }

    let mut followers = Vec::new();
    if args.follow {
        for map in maps.iter().filter(|map| map.events_enabled()) {
            let stream = service.stream_map_events(map.name().as_str(), StreamOptions { dump: true })?;
            let name = map.name().clone();
            followers.push(tokio::spawn(async move {
                let items = stream.collect::<Vec<_>>().await;
                (name, items)
            }));
        }
    }

    for map in &maps {
        let failures = churn(map, args.ops);
        tracing::info!(map = %map.name(), ops = args.ops, failures, "churn workload applied");
    }

    for map in &maps {
        match service.get_map_events(map.name().as_str(), args.dump_mode) {
            Ok(list) => match args.output {
                OutputFormat::Table => {
                    writeln!(out, "Map {} ({} events)", list.map, list.events.len())?;
                    write!(out, "{}", render_event_table(&list))?;
                    writeln!(out)?;
                }
                OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&list)?)?,
            },
            Err(ApiError::EventsNotEnabled { map }) => {
                writeln!(out, "events buffer not enabled for map {map}")?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    for map in &maps {
        _ = map.close();
    }
    for follower in followers {
        let (name, items) = follower.await?;
        match args.output {
            OutputFormat::Table => {
                let events = items
                    .iter()
                    .map(|item| match item {
                        EventStreamItem::Events(records) => records.len(),
                        EventStreamItem::Closed(_) => 0,
                    })
                    .sum::<usize>();
                let reason = items.iter().find_map(|item| match item {
                    EventStreamItem::Closed(reason) => Some(reason.to_string()),
                    EventStreamItem::Events(_) => None,
                });
                writeln!(
                    out,
                    "Stream {name}: {events} events, closed: {}",
                    reason.as_deref().unwrap_or("open")
                )?;
            }
            OutputFormat::Json => {
                for item in &items {
                    writeln!(out, "{}", serde_json::to_string(item)?)?;
                }
            }
        }
    }

    let stats = manager.shutdown().await;
    if args.output == OutputFormat::Table && !stats.is_empty() {
        writeln!(out)?;
        write!(out, "{}", render_stats_table(&stats))?;
    }
    Ok(())
}

/// Applies `ops` deterministic operations to `map`: updates over a small key
/// space, with a `delete_all` every few operations. Returns the number of
/// operations the map rejected.
pub fn churn(map: &Map<u32, u64>, ops: usize) -> usize {
    let mut failures = 0;
    for op in 0..ops {
        let outcome = if op > 0 && op % CHURN_DELETE_ALL_EVERY == 0 {
            map.delete_all()
        } else {
            let key = u32::try_from(op).unwrap_or(u32::MAX) % CHURN_KEY_SPACE;
            map.update(key, op as u64)
        };
        if outcome.is_err() {
            failures += 1;
        }
    }
    failures
}
