use std::time::Duration;

use reqwest::{Client, Url};

use crate::prelude::*;

/// Ping the liveness monitor, logging a failure instead of returning it.
pub async fn send(url: Option<&Url>) {
    if let Some(url) = url
        && let Err(error) = send_fallible(url.clone()).await
    {
        warn!("failed to send the heartbeat: {error:#}");
    }
}

#[instrument(skip_all)]
async fn send_fallible(url: Url) -> Result {
    debug!("sending a heartbeat…");
    Client::builder().timeout(Duration::from_secs(3)).build()?.post(url).send().await?;
    Ok(())
}
