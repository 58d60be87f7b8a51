use clap::Parser;
use std::path::PathBuf;

pub const MIN_REFRESH_MS: u64 = 500;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "vcdash",
    version,
    about = "A terminal dashboard for Kubernetes clusters running Volcano batch workloads."
)]
pub struct CliArgs {
    /// Refresh interval in milliseconds
    #[arg(long, default_value_t = 2_000)]
    pub refresh_ms: u64,

    /// Start filtered to a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Start with all namespaces selected
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write diagnostics to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Number of trailing log lines fetched per refresh
    #[arg(long, default_value_t = 500)]
    pub tail_lines: i64,

    /// How long a fetched snapshot is reused, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub cache_ms: u64,
}

impl CliArgs {
    pub fn refresh_interval_ms(&self) -> u64 {
        self.refresh_ms.max(MIN_REFRESH_MS)
    }

    /// Namespace filter the dashboard opens with.
    pub fn initial_namespace(&self) -> Option<String> {
        if self.all_namespaces {
            None
        } else {
            self.namespace.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn defaults_match_dashboard_cadence() {
        let args = CliArgs::parse_from(["vcdash"]);
        assert_eq!(args.refresh_interval_ms(), 2_000);
        assert_eq!(args.tail_lines, 500);
        assert_eq!(args.cache_ms, 5_000);
        assert_eq!(args.initial_namespace(), None);
    }

    #[test]
    fn refresh_interval_has_a_floor() {
        let args = CliArgs::parse_from(["vcdash", "--refresh-ms", "100"]);
        assert_eq!(args.refresh_interval_ms(), 500);
    }

    #[test]
    fn all_namespaces_wins_over_namespace() {
        let args = CliArgs::parse_from(["vcdash", "-n", "ml", "-A"]);
        assert_eq!(args.initial_namespace(), None);
        let args = CliArgs::parse_from(["vcdash", "-n", "ml"]);
        assert_eq!(args.initial_namespace(), Some("ml".to_string()));
    }
}
