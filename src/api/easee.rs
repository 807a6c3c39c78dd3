//! [Easee](https://www.home-assistant.io/integrations/easee/) charger controlled through Home Assistant services.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    api::home_assistant,
    core::{actuator::ChargerControl, status::ChargerStatus},
    prelude::*,
    quantity::current::Amperes,
};

pub struct Charger<'a> {
    home_assistant: &'a home_assistant::Api,
    device_id: &'a str,
    status_entity_id: &'a str,
    main_switch_entity_id: Option<&'a str>,

    /// Log the commands instead of sending them.
    scout: bool,
}

impl<'a> Charger<'a> {
    pub const fn new(
        home_assistant: &'a home_assistant::Api,
        device_id: &'a str,
        status_entity_id: &'a str,
        main_switch_entity_id: Option<&'a str>,
        scout: bool,
    ) -> Self {
        Self { home_assistant, device_id, status_entity_id, main_switch_entity_id, scout }
    }

    async fn call(&self, domain: &str, service: &str, data: Value) -> Result {
        if self.scout {
            info!(domain, service, %data, "scouting, not calling");
            return Ok(());
        }
        self.home_assistant.call_service(domain, service, &data).await
    }

    async fn action_command(&self, action: &str) -> Result {
        self.call(
            "easee",
            "action_command",
            json!({ "device_id": self.device_id, "action_command": action }),
        )
        .await
    }
}

#[async_trait]
impl ChargerControl for Charger<'_> {
    /// Override the charger's own schedule and start charging.
    ///
    /// Without the override, a schedule set in the Easee app keeps the charger waiting.
    #[instrument(skip_all)]
    async fn start(&self) -> Result {
        self.action_command("override_schedule").await?;
        self.action_command("start").await
    }

    #[instrument(skip_all)]
    async fn pause(&self) -> Result {
        self.action_command("pause").await
    }

    #[instrument(skip_all, fields(current = ?current))]
    async fn set_dynamic_current_limit(&self, current: Amperes) -> Result {
        self.call(
            "easee",
            "set_charger_dynamic_limit",
            json!({ "device_id": self.device_id, "current": current.0 }),
        )
        .await
    }

    async fn status(&self) -> Result<ChargerStatus> {
        let state = self.home_assistant.get_state(self.status_entity_id).await?;
        Ok(ChargerStatus::from_state(&state.state))
    }

    #[instrument(skip_all)]
    async fn turn_on_main_switch(&self) -> Result {
        let Some(entity_id) = self.main_switch_entity_id else {
            bail!("the main switch is not configured");
        };
        self.call("switch", "turn_on", json!({ "entity_id": entity_id })).await
    }
}
