//! Default reachability oracle: an HTTP GET against the base endpoint.

use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace};

use super::reachability::ConnectivityOracle;
use crate::core::error::EngineError;

/// Probes the base endpoint with a GET; any status below 500 counts as
/// reachable.
///
/// Owns a private current-thread runtime, so it must be built and used on
/// the worker thread that drives it.
pub struct HttpProbe {
    endpoint: String,
    client: reqwest::Client,
    runtime: Runtime,
}

impl HttpProbe {
    /// Build a probe for `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| EngineError::InvalidConfig(format!("base_endpoint `{endpoint}`: {e}")))?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::Probe(format!("failed to create probe runtime: {e}")))?;
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()
            .map_err(|e| EngineError::Probe(format!("failed to create probe client: {e}")))?;

        Ok(Self {
            endpoint,
            client,
            runtime,
        })
    }

    /// Probed URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ConnectivityOracle for HttpProbe {
    fn is_connected(&self) -> bool {
        // The request future arms its timeout on creation, so it must be
        // built inside the runtime.
        let outcome = self
            .runtime
            .block_on(async { self.client.get(&self.endpoint).send().await });
        match outcome {
            Ok(response) => {
                let status = response.status();
                trace!(endpoint = %self.endpoint, status = status.as_u16(), "Probe answered");
                !status.is_server_error()
            }
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "Probe failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
