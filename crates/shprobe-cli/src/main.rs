mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shprobe_types::HarnessConfig;

/// shprobe -- black-box pty test harness for interactive shells.
#[derive(Parser, Debug)]
#[command(name = "shprobe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scenarios against the shell under test
    Run {
        /// Path to a shprobe.toml config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Shell executable to test (overrides the config file)
        #[arg(long)]
        shell: Option<PathBuf>,

        /// Run only the named scenario
        #[arg(long)]
        scenario: Option<String>,

        /// Stop after the first failing scenario
        #[arg(long)]
        fail_fast: bool,
    },

    /// List available scenarios
    List,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing with env filter (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            shell,
            scenario,
            fail_fast,
        } => {
            let mut config = HarnessConfig::load(config.as_deref())?;
            if let Some(shell) = shell {
                config.shell = shell;
            }
            if fail_fast {
                config.fail_fast = true;
            }
            config.validate()?;

            let reporter = scenarios::run_scenarios(&config, scenario.as_deref());
            std::process::exit(reporter.finalize());
        }
        Commands::List => {
            for scenario in scenarios::SCENARIOS {
                println!("{:<10} {}", scenario.name, scenario.description);
            }
            Ok(())
        }
    }
}
