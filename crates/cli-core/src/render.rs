// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Plain-text tables for events and controller statistics.

use chrono::SecondsFormat;
use mapev_api::MapEventList;
use mapev_controller::ControllerStats;
use std::collections::BTreeMap;
use std::fmt::Write as _;

const EVENT_HEADERS: [&str; 6] = ["Timestamp", "Action", "Key", "Value", "State", "Error"];
const STATS_HEADERS: [&str; 6] = ["Controller", "Runs", "Failures", "Items", "Last duration", "Last error"];

/// Renders the events of one map as an aligned table, one row per event.
#[must_use]
pub fn render_event_table(list: &MapEventList) -> String {
    let rows = list
        .events
        .iter()
        .map(|record| {
            [
                record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                record.action.to_string(),
                record.key.clone(),
                record.value.clone().unwrap_or_default(),
                record.state.to_string(),
                record.error.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&EVENT_HEADERS, &rows)
}

/// Renders controller statistics, one row per controller.
#[must_use]
pub fn render_stats_table(stats: &BTreeMap<String, ControllerStats>) -> String {
    let rows = stats
        .iter()
        .map(|(name, stats)| {
            [
                name.clone(),
                stats.runs.to_string(),
                stats.failures.to_string(),
                stats.items.to_string(),
                stats
                    .last_duration
                    .map(|d| format!("{d:?}"))
                    .unwrap_or_default(),
                stats.last_error.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&STATS_HEADERS, &rows)
}

fn render_table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(|header| header.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, &widths, headers.iter().copied());
    for row in rows {
        write_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

fn write_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let mut line = String::new();
    for (index, (cell, width)) in cells.zip(widths).enumerate() {
        if index > 0 {
            line.push_str("  ");
        }
        _ = write!(line, "{cell:<width$}");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
