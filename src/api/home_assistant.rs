mod state;

use std::time::Duration;

use reqwest::{
    Client,
    Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use self::state::{EntityState, EntityStates, NewState};
use crate::prelude::*;

/// Home Assistant REST API client.
pub struct Api {
    client: Client,
    base_url: Url,
}

impl Api {
    /// Create a client. The base URL includes the `/api` path, for example: `http://localhost:8123/api`.
    pub fn try_new(access_token: &str, base_url: Url) -> Result<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))?;
        authorization.set_sensitive(true);
        let client = Client::builder()
            .user_agent("smart-ev-charging")
            .timeout(Duration::from_secs(10))
            .default_headers(HeaderMap::from_iter([(AUTHORIZATION, authorization)]))
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Fetch the states of all entities.
    #[instrument(skip_all, level = Level::DEBUG)]
    pub async fn get_states(&self) -> Result<EntityStates> {
        let states: EntityStates =
            self.get(&["states"]).await.context("failed to fetch the entity states")?;
        if states.is_empty() {
            warn!("no entity states returned, check the access token permissions");
        }
        debug!(n_states = states.len(), "fetched");
        Ok(states)
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(entity_id = entity_id))]
    pub async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        self.get(&["states", entity_id])
            .await
            .with_context(|| format!("failed to fetch the state of `{entity_id}`"))
    }

    /// Call the service, for example `easee.action_command`.
    #[instrument(skip_all, fields(domain = domain, service = service))]
    pub async fn call_service(&self, domain: &str, service: &str, data: &Value) -> Result {
        debug!(%data, "calling…");
        self.client
            .post(self.url(&["services", domain, service])?)
            .json(data)
            .send()
            .await
            .with_context(|| format!("failed to call `{domain}.{service}`"))?
            .error_for_status()
            .with_context(|| format!("`{domain}.{service}` failed"))?;
        Ok(())
    }

    /// Create or update the entity state.
    #[instrument(skip_all, level = Level::DEBUG, fields(entity_id = entity_id))]
    pub async fn set_state(&self, entity_id: &str, state: &NewState) -> Result {
        self.client
            .post(self.url(&["states", entity_id])?)
            .json(state)
            .send()
            .await
            .with_context(|| format!("failed to set the state of `{entity_id}`"))?
            .error_for_status()
            .with_context(|| format!("setting the state of `{entity_id}` failed"))?;
        Ok(())
    }

    async fn get<R: DeserializeOwned>(&self, segments: &[&str]) -> Result<R> {
        Ok(self
            .client
            .get(self.url(segments)?)
            .send()
            .await?
            .error_for_status()?
            .json::<R>()
            .await?)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_ok() -> Result {
        let api = Api::try_new("token", Url::parse("http://localhost:8123/api/")?)?;
        assert_eq!(
            api.url(&["services", "easee", "action_command"])?.as_str(),
            "http://localhost:8123/api/services/easee/action_command",
        );
        let api = Api::try_new("token", Url::parse("http://localhost:8123/api")?)?;
        assert_eq!(
            api.url(&["states", "sensor.easee_status"])?.as_str(),
            "http://localhost:8123/api/states/sensor.easee_status",
        );
        Ok(())
    }
}
