//! `arbor config`: engine configuration resolution and display.
//!
//! Resolution order: `--config <path>`, then `<ARBOR_HOME>/config.toml` when it
//! exists, then built-in defaults. Environment overrides apply last.

use crate::cli::output::{print_json, print_table};
use anyhow::Context;
use arbor_logging::{arbor_home, default_config_path};
use arbor_report::config::{ENV_BACKSTOP_MIN_CONF, ENV_MODEL_ID};
use arbor_report::EngineConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
    pub json: bool,
}

/// Where the engine configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Home(PathBuf),
    Defaults,
}

impl ConfigSource {
    fn describe(&self) -> String {
        match self {
            ConfigSource::Explicit(path) => format!("{} (--config)", path.display()),
            ConfigSource::Home(path) => path.display().to_string(),
            ConfigSource::Defaults => "built-in defaults".to_string(),
        }
    }
}

pub fn locate_config(explicit: Option<&Path>) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }
    let home_config = default_config_path();
    if home_config.exists() {
        ConfigSource::Home(home_config)
    } else {
        ConfigSource::Defaults
    }
}

pub fn load_config(source: &ConfigSource) -> anyhow::Result<EngineConfig> {
    let config = match source {
        ConfigSource::Explicit(path) | ConfigSource::Home(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config {}", path.display()))?,
        ConfigSource::Defaults => EngineConfig::default(),
    };
    let config = config
        .apply_env_overrides()
        .context("Invalid engine config override in environment")?;
    debug!(
        source = %source.describe(),
        threshold = config.backstop_threshold,
        "Engine config resolved"
    );
    Ok(config)
}

pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<EngineConfig> {
    load_config(&locate_config(explicit))
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let source = locate_config(args.config.as_deref());
    let config = load_config(&source)?;

    if args.json {
        return print_json(&serde_json::json!({
            "home": arbor_home().to_string_lossy(),
            "source": source.describe(),
            "engine": config,
        }));
    }

    println!("ARBOR CONFIGURATION");
    println!("===================");
    println!();
    println!("Home:   {}", arbor_home().display());
    println!("Source: {}", source.describe());
    println!();
    print_table(
        &["Setting", "Value"],
        vec![
            vec![
                "backstop_threshold".to_string(),
                config.backstop_threshold.to_string(),
            ],
            vec!["model_id".to_string(), config.model_id.clone()],
            vec!["undo_depth".to_string(), config.undo_depth.to_string()],
            vec![
                "statement_policy".to_string(),
                config.statement_policy.to_string(),
            ],
            vec![
                "correction_policy".to_string(),
                config.correction_policy.to_string(),
            ],
            vec![
                "prefilter.normalize_units".to_string(),
                config.prefilter.normalize_units.to_string(),
            ],
            vec![
                "prefilter.drop_unchanged".to_string(),
                config.prefilter.drop_unchanged.to_string(),
            ],
            vec![
                "prefilter.drop_not_provided".to_string(),
                config.prefilter.drop_not_provided.to_string(),
            ],
        ],
    );
    println!();
    println!("Overrides: {}, {}", ENV_BACKSTOP_MIN_CONF, ENV_MODEL_ID);
    Ok(())
}
