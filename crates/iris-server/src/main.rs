use std::io::{BufReader, Write};

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use iris_providers::{detect_platform, PlatformDescriptor, ProviderFactory, RetryPolicy};
use iris_safety::{RuleSet, SafetyValidator};
use iris_server::{serve, Dispatcher, ToolRegistry};

mod cli;

use cli::{Cli, PlatformMode};

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if cli.list_tools {
        let registry = ToolRegistry::builtin();
        let tools = registry
            .tools()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect::<Vec<_>>();
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &json!({ "tools": tools }))?;
        writeln!(stdout)?;
        return Ok(());
    }

    let descriptor = match cli.platform {
        PlatformMode::Auto => detect_platform(),
        PlatformMode::X11 => PlatformDescriptor::x11(),
        PlatformMode::Headless => PlatformDescriptor::headless(),
    };
    tracing::info!(?descriptor, "starting iris-server");

    let retry = RetryPolicy {
        max_attempts: cli.retry_max_attempts,
        ..RetryPolicy::default()
    };
    let providers = ProviderFactory::new(retry).build(&descriptor);
    let validator = SafetyValidator::with_rules(RuleSet::builtin(), cli.verdict_cache_capacity);
    let mut dispatcher = Dispatcher::with_validator(providers, validator);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();
    let report = serve(&mut reader, &mut writer, &mut dispatcher)?;
    tracing::info!(
        processed = report.processed_frames,
        errors = report.error_count,
        "transport closed"
    );
    Ok(())
}
