//! Transport reachability probe for the connectivity monitor.

use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use kolayfit_core::connectivity::ConnectivityProbe;

const PROBE_TIMEOUT_SECS: u64 = 5;

/// Probes the backend with a HEAD request. Any HTTP response counts as
/// reachable, auth failures included: the transport is up, and auth is the
/// sync processor's concern.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(err) => {
                debug!("[Connectivity] Probe failed: {}", err);
                false
            }
        }
    }
}
