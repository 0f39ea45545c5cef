// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Record BPF map mutations under a churn workload and report their events.

use mapev_cli_core::{base_command, parse_args, run};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = base_command().get_matches();
    let args = parse_args(&matches);

    let stdout = std::io::stdout();
    let result = run(args, &mut stdout.lock());
    if let Err(err) = &result {
        tracing::error!(error = %err, "mapev failed");
    }
    result
}
