#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod config;
mod core;
mod prelude;
mod quantity;
mod tables;

use clap::{Parser, crate_version};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, reload};

use crate::{
    cli::{Args, LogLevel},
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    let (level_filter, level_handle) = reload::Layer::new(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(level_filter)
        .with(fmt::layer().without_time().compact())
        .init();
    info!(version = crate_version!(), "starting…");

    Args::parse().run(&LogLevel::new(level_handle)).await?;

    info!("done!");
    Ok(())
}
