use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::{
    api::easee,
    cli::{ConfigurationArgs, HomeAssistantConnectionArgs},
    core::{actuator::ChargerControl, controller::Controller, reader::unresolved_controls},
    prelude::*,
    tables::{build_decision_table, build_snapshot_table},
};

#[derive(Parser)]
pub struct BurrowArgs {
    #[command(subcommand)]
    command: BurrowCommand,
}

impl BurrowArgs {
    pub async fn run(self) -> Result {
        match self.command {
            BurrowCommand::Snapshot(args) => args.run().await,
            BurrowCommand::Status(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
pub enum BurrowCommand {
    /// Read the inputs and show what would be decided, without touching the charger.
    Snapshot(BurrowSnapshotArgs),

    /// Read the charger status back through Home Assistant.
    Status(BurrowStatusArgs),
}

#[derive(Parser)]
pub struct BurrowSnapshotArgs {
    #[clap(flatten)]
    connection: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    configuration: ConfigurationArgs,
}

impl BurrowSnapshotArgs {
    async fn run(self) -> Result {
        let configuration = self.configuration.read()?;
        let states = self.connection.try_new_client()?.get_states().await?;
        info!(n_states = states.len(), "fetched");

        let unresolved = unresolved_controls(&configuration.controls.entities, &states);
        ensure!(unresolved.is_empty(), "control entities are missing: {unresolved:?}");

        let mut controller = Controller::default();
        let snapshot = controller.read(&configuration, &states);
        println!("{}", build_snapshot_table(&snapshot));
        let decision = controller.decide(&configuration, &snapshot, Utc::now());
        println!("{}", build_decision_table(&decision));
        Ok(())
    }
}

#[derive(Parser)]
pub struct BurrowStatusArgs {
    #[clap(flatten)]
    connection: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    configuration: ConfigurationArgs,
}

impl BurrowStatusArgs {
    async fn run(self) -> Result {
        let configuration = self.configuration.read()?;
        let home_assistant = self.connection.try_new_client()?;
        let charger = easee::Charger::new(
            &home_assistant,
            &configuration.charger_device_id,
            &configuration.entities.status,
            configuration.entities.main_switch.as_deref(),
            true,
        );
        let status = charger.status().await?;
        info!(%status, is_unreachable = status.is_unreachable(), "gotcha");
        Ok(())
    }
}
