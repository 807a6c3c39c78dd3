mod burrow;
mod log_level;
mod run;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::Url;

pub use self::log_level::LogLevel;
use crate::{
    api::home_assistant,
    cli::{burrow::BurrowArgs, run::RunArgs},
    config::Configuration,
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub async fn run(self, log_level: &LogLevel) -> Result {
        match self.command {
            Command::Run(args) => args.run(log_level).await,
            Command::Burrow(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: steer the charger until interrupted.
    #[clap(name = "run")]
    Run(Box<RunArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}

#[derive(Parser)]
pub struct HomeAssistantConnectionArgs {
    /// Home Assistant API access token.
    #[clap(long = "home-assistant-access-token", env = "HOME_ASSISTANT_ACCESS_TOKEN")]
    pub access_token: String,

    /// Home Assistant API base URL. For example: `http://localhost:8123/api`.
    #[clap(long = "home-assistant-api-base-url", env = "HOME_ASSISTANT_API_BASE_URL")]
    pub base_url: Url,
}

impl HomeAssistantConnectionArgs {
    pub fn try_new_client(&self) -> Result<home_assistant::Api> {
        home_assistant::Api::try_new(&self.access_token, self.base_url.clone())
    }
}

#[derive(Parser)]
pub struct ConfigurationArgs {
    /// Configuration file, re-read on `SIGHUP`.
    #[clap(long = "config", env = "CONFIG_PATH", default_value = "smart-ev-charging.toml")]
    pub path: PathBuf,
}

impl ConfigurationArgs {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Configuration> {
        Configuration::read_from(&self.path)
    }
}
