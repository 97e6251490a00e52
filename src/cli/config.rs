use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::output::{emit, OutputFormat};
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (default)
    Show,

    /// Show which file the configuration was read from
    Path,
}

#[derive(Serialize)]
struct ConfigSource {
    path: Option<String>,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let human = serde_yaml::to_string(ctx.config()).context("Failed to render config")?;
            emit(output, ctx.config(), |_| human)
        }
        ConfigAction::Path => {
            let source = ConfigSource {
                path: ctx.config_path().map(|path| path.display().to_string()),
            };
            emit(output, &source, |source| match &source.path {
                Some(path) => path.clone(),
                None => "(defaults)".to_string(),
            })
        }
    }
}
