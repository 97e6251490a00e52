use clap::Subcommand;

use super::config::ConfigArgs;
use super::demo::DemoArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay recorded observer events through a live capture and search them
    Replay(ReplayArgs),

    /// Run selection, correlation and handoff end to end in memory
    Demo(DemoArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
