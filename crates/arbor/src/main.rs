//! `arbor`: offline driver for the arborist report merge engine.
//!
//! Every command runs without network access. `replay` drives a full session
//! from a JSON script whose turns carry canned collaborator outputs.

use arbor_logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "arbor", about = "Arborist report merge engine and service router")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split an utterance into section-scoped segments
    Segment {
        /// The utterance
        text: String,

        /// Section that owns unscoped text
        #[arg(long, default_value = "area_description")]
        cursor: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route a service request deterministically
    Classify {
        /// The utterance
        text: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the backstop confidence gate to a guess
    Gate {
        /// Guessed service (correction, section_summary, outline, report_draft, none)
        #[arg(long)]
        service: String,

        /// Guessed section
        #[arg(long)]
        section: Option<String>,

        /// Guess confidence
        #[arg(long)]
        confidence: f64,

        /// Acceptance threshold (defaults to the configured one)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Run a scripted session and print every turn packet
    Replay {
        /// Path to the replay script (JSON)
        script: PathBuf,

        /// Engine config (TOML); defaults to <ARBOR_HOME>/config.toml when present
        #[arg(long)]
        config: Option<PathBuf>,

        /// Record the session to an NDJSON tape
        #[arg(long)]
        tape: Option<PathBuf>,

        /// Hash spoken text in the tape (otherwise recorded as-is)
        #[arg(long)]
        redact: bool,
    },

    /// Show the resolved engine configuration
    Config {
        /// Engine config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Segment { json, .. } => *json,
        Commands::Classify { json, .. } => *json,
        Commands::Config { json, .. } => *json,
        Commands::Gate { .. } | Commands::Replay { .. } => true,
    }
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Segment { text, cursor, json } => {
            cli::segment::run(cli::segment::SegmentArgs { text, cursor, json })
        }
        Commands::Classify { text, json } => {
            cli::classify::run(cli::classify::ClassifyArgs { text, json })
        }
        Commands::Gate {
            service,
            section,
            confidence,
            threshold,
        } => cli::gate::run(cli::gate::GateArgs {
            service,
            section,
            confidence,
            threshold,
        }),
        Commands::Replay {
            script,
            config,
            tape,
            redact,
        } => cli::replay::run(cli::replay::ReplayArgs {
            script,
            config,
            tape,
            redact,
        }),
        Commands::Config { config, json } => {
            cli::config::run(cli::config::ConfigArgs { config, json })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let json_mode = command_wants_json(&cli.command);
    let _log_guard = init_logging(LogConfig {
        app_name: "arbor",
        verbose: cli.verbose,
        json_mode,
    });

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::output::print_json_error(&err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_gate_args_parse() {
        let cli = Cli::parse_from([
            "arbor",
            "gate",
            "--service",
            "outline",
            "--section",
            "risks",
            "--confidence",
            "0.7",
        ]);
        match cli.command {
            Commands::Gate {
                service,
                section,
                confidence,
                threshold,
            } => {
                assert_eq!(service, "outline");
                assert_eq!(section.as_deref(), Some("risks"));
                assert_eq!(confidence, 0.7);
                assert!(threshold.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_json_mode_detection() {
        let cli = Cli::parse_from(["arbor", "-v", "segment", "risks: none", "--json"]);
        assert!(cli.verbose);
        assert!(command_wants_json(&cli.command));

        let cli = Cli::parse_from(["arbor", "classify", "draft the report"]);
        assert!(!command_wants_json(&cli.command));
    }
}
