//! Command-line flags for the iris-server binary.

use clap::{Parser, ValueEnum};

/// Enumerates supported `PlatformMode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformMode {
    /// Detect the host platform from the environment.
    Auto,
    /// Force the X11 command-bridge backends.
    X11,
    /// Serve without any action capabilities (platform info only).
    Headless,
}

#[derive(Debug, Parser)]
#[command(
    name = "iris-server",
    about = "Desktop-automation gatekeeper serving JSON-RPC over stdio",
    version
)]
pub struct Cli {
    #[arg(
        long = "platform",
        env = "IRIS_PLATFORM",
        value_enum,
        default_value = "auto",
        help = "Platform backend selection"
    )]
    pub platform: PlatformMode,

    #[arg(
        long = "verdict-cache-capacity",
        env = "IRIS_VERDICT_CACHE_CAPACITY",
        default_value_t = 1024,
        help = "Bounded entry count of the safety verdict cache"
    )]
    pub verdict_cache_capacity: usize,

    #[arg(
        long = "retry-max-attempts",
        env = "IRIS_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        help = "Attempts the provider retry policy makes for idempotent operations"
    )]
    pub retry_max_attempts: u32,

    #[arg(
        long = "list-tools",
        default_value_t = false,
        help = "Print the tool registry as JSON and exit"
    )]
    pub list_tools: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn unit_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn unit_defaults_match_documented_values() {
        let cli = Cli::parse_from(["iris-server"]);
        assert_eq!(cli.platform, PlatformMode::Auto);
        assert_eq!(cli.verdict_cache_capacity, 1024);
        assert_eq!(cli.retry_max_attempts, 3);
        assert!(!cli.list_tools);
    }

    #[test]
    fn unit_platform_flag_parses_variants() {
        let cli = Cli::parse_from(["iris-server", "--platform", "headless"]);
        assert_eq!(cli.platform, PlatformMode::Headless);
        let cli = Cli::parse_from(["iris-server", "--platform", "x11"]);
        assert_eq!(cli.platform, PlatformMode::X11);
    }
}
