// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(
        short = 'd',
        long = "directory",
        default_value = "samples",
        help = "Directory containing *.black and *.white sample files"
    )]
    pub directory: PathBuf,

    #[arg(
        short = 't',
        long = "target",
        help = "Target, e.g. http://127.0.0.1 or https://10.0.0.2:8443"
    )]
    pub target: String,

    #[arg(
        short = 'n',
        long = "threads",
        default_value_t = 10,
        help = "Concurrent worker count"
    )]
    pub threads: usize,

    #[arg(short = 'o', long = "output", help = "Write a CSV report to this path")]
    pub output: Option<PathBuf>,

    #[arg(long = "json", help = "Write a JSON report to this path")]
    pub json: Option<PathBuf>,

    #[arg(
        short = 's',
        long = "split",
        help = "Copy samples into <dir>/expected and <dir>/unexpected by verdict"
    )]
    pub split: Option<PathBuf>,

    #[arg(
        long = "loss-rate",
        default_value_t = 0.0,
        help = "Simulated packet loss probability (0.0-1.0)"
    )]
    pub loss_rate: f64,

    #[arg(
        long = "max-retries",
        default_value_t = 3,
        help = "Delivery attempts per sample"
    )]
    pub max_retries: u32,

    #[arg(
        long = "timeout",
        default_value = "10,30",
        help = "Connect,read timeouts in seconds"
    )]
    pub timeout: String,

    #[arg(
        short = 'C',
        long = "custom-code",
        default_value_t = 403,
        help = "Status code the WAF answers with when blocking"
    )]
    pub custom_code: u16,

    #[arg(
        short = 'R',
        long = "rst-detect",
        help = "Treat an abrupt connection reset as a block"
    )]
    pub rst_detect: bool,

    #[arg(
        short = 'K',
        long = "keyword",
        help = "Response body/reason substring that marks a block page"
    )]
    pub keyword: Option<String>,

    #[arg(
        long = "client-transport",
        help = "Deliver through the HTTP client instead of raw sockets"
    )]
    pub client_transport: bool,

    #[arg(long = "debug", help = "Per-sample result lines instead of a progress bar")]
    pub debug: bool,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::parse_from(["wafprobe", "-t", "http://127.0.0.1"]);
        assert_eq!(cli.directory, PathBuf::from("samples"));
        assert_eq!(cli.threads, 10);
        assert_eq!(cli.max_retries, 3);
        assert_eq!(cli.timeout, "10,30");
        assert_eq!(cli.custom_code, 403);
        assert_eq!(cli.loss_rate, 0.0);
        assert!(!cli.rst_detect);
        assert!(cli.keyword.is_none());
    }

    #[test]
    fn target_is_required() {
        assert!(Cli::try_parse_from(["wafprobe"]).is_err());
    }

    #[test]
    fn detection_flags_parse() {
        let cli = Cli::parse_from([
            "wafprobe", "-t", "waf:8080", "-C", "406", "-R", "-K", "Forbidden",
        ]);
        assert_eq!(cli.custom_code, 406);
        assert!(cli.rst_detect);
        assert_eq!(cli.keyword.as_deref(), Some("Forbidden"));
    }
}
