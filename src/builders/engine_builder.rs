//! Engine construction.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::EngineConfig;
use crate::core::audit::{AuditSink, InMemoryAuditSink};
use crate::core::backoff::Backoff;
use crate::core::chain::DispatchChain;
use crate::core::engine::Engine;
use crate::core::error::EngineError;
use crate::core::worker::WorkerSettings;
use crate::infra::connectivity::{ConnectivityGate, ConnectivityHandle};
use crate::infra::reachability::{ConnectivityOracle, EndpointGate};
use crate::infra::send::SendGate;
use crate::util::signal::ShutdownSignal;

/// Builds an [`Engine`] from an [`EngineConfig`] plus the options that
/// cannot be serialized.
///
/// At least one of a custom chain, a connectivity oracle, or a base endpoint
/// must be provided.
pub struct EngineBuilder {
    config: EngineConfig,
    oracle: Option<Box<dyn ConnectivityOracle>>,
    custom_chain: Option<DispatchChain>,
    audit: Option<Box<dyn AuditSink>>,
    connectivity: Option<ConnectivityHandle>,
}

impl EngineBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            oracle: None,
            custom_chain: None,
            audit: None,
            connectivity: None,
        }
    }

    /// Replace the HTTP probe with `oracle`.
    #[must_use]
    pub fn connectivity_oracle(mut self, oracle: impl ConnectivityOracle + 'static) -> Self {
        self.oracle = Some(Box::new(oracle));
        self
    }

    /// Replace the whole precondition chain.
    #[must_use]
    pub fn custom_chain(mut self, chain: DispatchChain) -> Self {
        self.custom_chain = Some(chain);
        self
    }

    /// Record state transitions into `sink`.
    #[must_use]
    pub fn audit_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(sink));
        self
    }

    /// Record transitions into a bounded in-memory sink sized by
    /// `audit_capacity`, returning a reader for it.
    #[must_use]
    pub fn with_in_memory_audit(self) -> (Self, InMemoryAuditSink) {
        let sink = InMemoryAuditSink::new(self.config.audit_capacity);
        (self.audit_sink(sink.clone()), sink)
    }

    /// Feed the connectivity gate from an existing handle.
    #[must_use]
    pub fn connectivity_handle(mut self, handle: ConnectivityHandle) -> Self {
        self.connectivity = Some(handle);
        self
    }

    /// Validate, spawn the worker, and build the chain on it.
    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate().map_err(EngineError::InvalidConfig)?;
        let endpoint = self.config.normalized_endpoint();
        if self.custom_chain.is_none() && self.oracle.is_none() && endpoint.is_none() {
            return Err(EngineError::InvalidConfig(
                "one of custom chain, connectivity oracle or base endpoint is required".into(),
            ));
        }

        let connectivity = self
            .connectivity
            .unwrap_or_else(|| ConnectivityHandle::new(self.config.initially_online));
        let shutdown = Arc::new(ShutdownSignal::new());
        let plan = ChainPlan {
            custom: self.custom_chain,
            oracle: self.oracle,
            endpoint,
            connectivity: connectivity.clone(),
            cooldown: self.config.probe_cooldown(),
            connect_timeout: self.config.probe_connect_timeout(),
            read_timeout: self.config.probe_read_timeout(),
            shutdown: Arc::clone(&shutdown),
        };
        let settings = WorkerSettings {
            dispatch_timeout: self.config.dispatch_timeout(),
            backoff: Backoff::from_millis(&self.config.backoff_ladder_ms),
        };

        Engine::launch(
            &self.config.worker_thread_name,
            settings,
            move || plan.build(),
            connectivity,
            shutdown,
            self.audit,
        )
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("oracle", &self.oracle.is_some())
            .field("custom_chain", &self.custom_chain)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything needed to assemble the chain on the worker thread.
struct ChainPlan {
    custom: Option<DispatchChain>,
    oracle: Option<Box<dyn ConnectivityOracle>>,
    endpoint: Option<String>,
    connectivity: ConnectivityHandle,
    cooldown: Duration,
    connect_timeout: Duration,
    read_timeout: Duration,
    shutdown: Arc<ShutdownSignal>,
}

impl ChainPlan {
    fn build(self) -> Result<DispatchChain, EngineError> {
        if let Some(chain) = self.custom {
            debug!(gates = ?chain.names(), "Using custom dispatch chain");
            return Ok(chain);
        }
        let oracle = match self.oracle {
            Some(oracle) => oracle,
            None => default_oracle(
                self.endpoint.as_deref(),
                self.connect_timeout,
                self.read_timeout,
            )?,
        };
        Ok(DispatchChain::new()
            .with_gate(ConnectivityGate::new(self.connectivity))
            .with_gate(EndpointGate::new(oracle, self.cooldown, self.shutdown))
            .with_gate(SendGate))
    }
}

#[cfg(feature = "http-probe")]
fn default_oracle(
    endpoint: Option<&str>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Box<dyn ConnectivityOracle>, EngineError> {
    let endpoint = endpoint
        .ok_or_else(|| EngineError::InvalidConfig("base_endpoint is required".into()))?;
    let probe = crate::infra::http_probe::HttpProbe::new(endpoint, connect_timeout, read_timeout)?;
    debug!(endpoint = probe.endpoint(), "Using HTTP reachability probe");
    Ok(Box::new(probe))
}

#[cfg(not(feature = "http-probe"))]
fn default_oracle(
    _endpoint: Option<&str>,
    _connect_timeout: Duration,
    _read_timeout: Duration,
) -> Result<Box<dyn ConnectivityOracle>, EngineError> {
    Err(EngineError::InvalidConfig(
        "base_endpoint requires the `http-probe` feature; supply a connectivity oracle".into(),
    ))
}
