//! Lineage client
//!
//! Wires configuration, the filter chain and a transport together. A client
//! is built one of three ways:
//! - with an explicit URL, which builds an HTTP transport directly
//! - with an explicit transport, used as is
//! - from the environment, resolving the transport from the config file
//!
//! Filters from the config file apply in every case.

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SearchPaths};
use crate::error::Result;
use crate::event::RunEvent;
use crate::filter::{FilterChain, FilterRegistry};
use crate::transport::http::DEFAULT_TIMEOUT;
use crate::transport::{HttpConfig, HttpSession, HttpTransport, Transport, TransportFactory, UreqSession};

/// Delivery options for a client built from an explicit URL
#[derive(Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    /// Verify the server's TLS certificate
    pub verify: bool,
    /// Sent as a bearer token
    pub api_key: Option<String>,
    /// Low-level HTTP client to send requests through
    pub adapter: Option<Arc<dyn HttpSession>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verify: true,
            api_key: None,
            adapter: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout", &self.timeout)
            .field("verify", &self.verify)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}

/// Emits run events through a transport, subject to the configured filters
#[derive(Debug)]
pub struct LineageClient {
    transport: Arc<dyn Transport>,
    filters: FilterChain,
    config: Config,
    config_source: Option<PathBuf>,
}

impl LineageClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Resolve everything from the config file and environment
    pub fn from_environment() -> Result<Self> {
        Self::builder().build()
    }

    /// HTTP client for `url` with default options
    pub fn with_url(url: &str) -> Result<Self> {
        Self::builder().url(url).build()
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::builder().transport(transport).build()
    }

    /// Deliver an event unless a filter vetoes it.
    ///
    /// Delivery errors from the transport are returned as is. A no-op
    /// transport means nothing is configured: the event is dropped and
    /// an error is logged, but the call succeeds.
    pub fn emit(&self, event: &RunEvent) -> Result<()> {
        if self.transport.is_noop() {
            log::error!("Tried to emit lineage event, but transport is not configured");
            return Ok(());
        }

        let Some(event) = self.filter_event(event) else {
            log::debug!("Lineage event for job '{}' dropped by filter", event.job.name);
            return Ok(());
        };

        if log::log_enabled!(log::Level::Debug) {
            match event.to_canonical_json() {
                Ok(json) => log::debug!("Emitting lineage event {}", json),
                Err(e) => log::debug!("Emitting lineage event (unserializable: {})", e),
            }
        }

        self.transport.emit(event)
    }

    /// Emit an untyped JSON value; anything that is not a run event is a usage error
    pub fn emit_value(&self, value: &Value) -> Result<()> {
        let event = RunEvent::from_value(value)?;
        self.emit(&event)
    }

    /// Run the filter chain; `None` means some filter vetoed the event
    pub fn filter_event<'a>(&self, event: &'a RunEvent) -> Option<&'a RunEvent> {
        self.filters.apply(event)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The config file the client was built from, if any
    pub fn config_source(&self) -> Option<&Path> {
        self.config_source.as_deref()
    }
}

/// Builder for [`LineageClient`]
#[derive(Default)]
pub struct ClientBuilder {
    url: Option<String>,
    options: Option<ClientOptions>,
    session: Option<Arc<dyn HttpSession>>,
    transport: Option<Arc<dyn Transport>>,
    factory: Option<TransportFactory>,
    filter_registry: Option<FilterRegistry>,
    config_file: Option<PathBuf>,
    search_paths: Option<SearchPaths>,
    config: Option<Config>,
}

impl ClientBuilder {
    /// Send to this base URL over HTTP, bypassing config transport selection
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// HTTP session for the URL path, and for `http` transports from config
    pub fn session(mut self, session: Arc<dyn HttpSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn factory(mut self, factory: TransportFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn filter_registry(mut self, registry: FilterRegistry) -> Self {
        self.filter_registry = Some(registry);
        self
    }

    /// Config file to try before the environment variable and default locations
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Replace the locations probed for the config file
    pub fn search_paths(mut self, paths: SearchPaths) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Use this configuration instead of loading one from disk
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<LineageClient> {
        let (config, config_source) = match self.config {
            Some(config) => (config, None),
            None => {
                let paths = self
                    .search_paths
                    .unwrap_or_else(|| SearchPaths::from_process(self.config_file.as_deref()));
                Config::load_with(&paths)
            }
        };

        let transport: Arc<dyn Transport> = if let Some(url) = self.url {
            // Direct construction; config transport selection is bypassed
            let options = self.options.unwrap_or_default();
            let session = self
                .session
                .or_else(|| options.adapter.clone())
                .unwrap_or_else(|| Arc::new(UreqSession::new()));
            Arc::new(HttpTransport::new(HttpConfig::from_options(&url, &options, session)?))
        } else if let Some(transport) = self.transport {
            transport
        } else {
            let factory = match (self.factory, self.session) {
                (Some(factory), _) => factory,
                (None, Some(session)) => TransportFactory::default().with_http_session(session),
                (None, None) => TransportFactory::default(),
            };
            factory.create(config.transport.as_ref())?
        };

        let registry = self.filter_registry.unwrap_or_default();
        let filters = registry.build_chain(&config.filters);

        log::info!(
            "Lineage client using '{}' transport with {} filter(s)",
            transport.kind(),
            filters.len()
        );

        Ok(LineageClient {
            transport,
            filters,
            config,
            config_source,
        })
    }
}
