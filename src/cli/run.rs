use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use reqwest::Url;
use tokio::{
    signal::unix::{SignalKind, signal},
    time::{Interval, MissedTickBehavior, interval, sleep},
};

use crate::{
    api::{easee, heartbeat, home_assistant},
    cli::{ConfigurationArgs, HomeAssistantConnectionArgs, LogLevel},
    config::{self, Configuration},
    core::{actuator::Actuator, controller::Controller, watch::Watcher},
    prelude::*,
};

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    connection: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    configuration: ConfigurationArgs,

    /// Do not control the charger, only log what would have been done.
    #[clap(long)]
    scout: bool,

    /// Delay before the first tick, gives Home Assistant time to settle after a restart.
    #[clap(long, env = "STARTUP_DELAY", default_value = "5s")]
    startup_delay: humantime::Duration,

    /// How often the watched entities are checked for changes between the regular ticks.
    #[clap(long, env = "WATCH_INTERVAL", default_value = "5s")]
    watch_interval: humantime::Duration,

    /// Delay between turning on the main switch and re-reading the charger status.
    #[clap(long, env = "SETTLE_DELAY", default_value = "3s")]
    settle_delay: humantime::Duration,

    /// Heartbeat URL that gets pinged after each tick.
    #[clap(long = "heartbeat-url", env = "HEARTBEAT_URL")]
    heartbeat_url: Option<Url>,
}

impl RunArgs {
    pub async fn run(self, log_level: &LogLevel) -> Result {
        let home_assistant = self.connection.try_new_client()?;
        let configuration = self.configuration.read()?;
        log_level.set_debug(configuration.debug_logging);
        config::log_unused_entities(&configuration);

        let mut daemon = Daemon {
            home_assistant: &home_assistant,
            actuator: Actuator { settle_delay: self.settle_delay.into() },
            controller: Controller::default(),
            watcher: Watcher::default(),
            scout: self.scout,
            heartbeat_url: self.heartbeat_url.as_ref(),
            configuration,
        };

        let mut hangup = signal(SignalKind::hangup()).context("failed to listen to `SIGHUP`")?;
        let mut terminate =
            signal(SignalKind::terminate()).context("failed to listen to `SIGTERM`")?;

        info!(startup_delay = %self.startup_delay, scout = self.scout, "waiting…");
        sleep(self.startup_delay.into()).await;

        let mut poll_interval = new_interval(daemon.configuration.poll_interval());
        let mut watch_interval = new_interval(self.watch_interval.into());

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    daemon.poll().await;
                }
                _ = watch_interval.tick() => {
                    daemon.watch().await;
                }
                _ = hangup.recv() => {
                    if daemon.reload(&self.configuration, log_level) {
                        poll_interval = new_interval(daemon.configuration.poll_interval());
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                _ = terminate.recv() => {
                    info!("terminated");
                    break;
                }
            }
        }

        info!("stopped");
        Ok(())
    }
}

struct Daemon<'a> {
    home_assistant: &'a home_assistant::Api,
    configuration: Configuration,
    actuator: Actuator,
    controller: Controller,
    watcher: Watcher,
    scout: bool,
    heartbeat_url: Option<&'a Url>,
}

impl Daemon<'_> {
    /// Regular tick.
    async fn poll(&mut self) {
        match self.home_assistant.get_states().await {
            Ok(states) => {
                // Refresh the observations so that this tick's inputs do not re-trigger the watcher.
                let _ = self.watcher.has_changed(
                    &self.configuration,
                    &states,
                    self.controller.controls().solar_enabled,
                );
                self.tick(&states).await;
            }
            Err(error) => {
                error!("failed to fetch the states, keeping the previous report: {error:#}");
            }
        }
        heartbeat::send(self.heartbeat_url).await;
    }

    /// Tick early when a watched entity has changed.
    async fn watch(&mut self) {
        let states = match self.home_assistant.get_states().await {
            Ok(states) => states,
            Err(error) => {
                warn!("failed to fetch the states for watching: {error:#}");
                return;
            }
        };
        if self.watcher.has_changed(
            &self.configuration,
            &states,
            self.controller.controls().solar_enabled,
        ) {
            info!("watched entity changed, ticking early");
            self.tick(&states).await;
        }
    }

    #[instrument(skip_all)]
    async fn tick(&mut self, states: &home_assistant::EntityStates) {
        let charger = easee::Charger::new(
            self.home_assistant,
            &self.configuration.charger_device_id,
            &self.configuration.entities.status,
            self.configuration.entities.main_switch.as_deref(),
            self.scout,
        );
        let report = self
            .controller
            .tick(&self.configuration, states, &charger, &self.actuator, Utc::now())
            .await;
        if !self.configuration.publish.enabled {
            return;
        }
        for (entity_id, state) in report.to_states(&self.configuration.publish) {
            if let Err(error) = self.home_assistant.set_state(&entity_id, &state).await {
                warn!(%entity_id, "failed to publish: {error:#}");
            }
        }
    }

    /// Re-read the configuration file and replace the current one wholesale.
    ///
    /// Returns whether the configuration has been replaced.
    fn reload(&mut self, args: &ConfigurationArgs, log_level: &LogLevel) -> bool {
        info!(path = %args.path().display(), "reloading the configuration…");
        match args.read() {
            Ok(configuration) => {
                log_level.set_debug(configuration.debug_logging);
                config::log_unused_entities(&configuration);
                self.configuration = configuration;
                true
            }
            Err(error) => {
                error!("failed to reload, keeping the previous configuration: {error:#}");
                false
            }
        }
    }
}

fn new_interval(period: Duration) -> Interval {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
