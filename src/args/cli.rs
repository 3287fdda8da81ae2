use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::parsers::{parse_bool_env, parse_duration_arg};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Generate HTTP traffic from templated request jobs described in a TOML or JSON file."
)]
pub struct CliArgs {
    /// Jobs file (.toml or .json). Defaults to ./trafficgen.toml, then ./trafficgen.json
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable debug diagnostics (client config errors, per-request logs)
    #[arg(
        long,
        short,
        env = "TRAFFICGEN_VERBOSE",
        default_value = "false",
        value_parser = parse_bool_env,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub verbose: bool,

    /// Seed for User-Agent and proxy picks, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// How often traffic totals are logged (supports ms/s/m/h)
    #[arg(long = "report-interval", default_value = "10s", value_parser = parse_duration_arg)]
    pub report_interval: Duration,
}
