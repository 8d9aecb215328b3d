//! Event delivery
//!
//! Provides the [`Transport`] abstraction and built-in transports:
//! - `http` - POSTs events to a lineage endpoint
//! - `console` - logs events (default when nothing is configured)
//! - `file` - appends events as JSON lines
//! - `noop` - drops events; the client treats it as unconfigured

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod console;
pub mod file;
pub mod http;

pub use console::{ConsoleTransport, NoopTransport};
pub use file::{FileSettings, FileTransport};
pub use http::{HttpConfig, HttpRequest, HttpResponse, HttpSession, HttpSettings, HttpTransport, UreqSession};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::event::RunEvent;

/// A delivery mechanism for run events
pub trait Transport: Send + Sync + fmt::Debug {
    /// The type tag this transport is registered under
    fn kind(&self) -> &str;

    /// Deliver one event. Errors propagate to the caller of the client's emit.
    fn emit(&self, event: &RunEvent) -> Result<()>;

    /// Base URL of the destination, for network transports
    fn url(&self) -> Option<&str> {
        None
    }

    /// True when the transport never delivers anything
    fn is_noop(&self) -> bool {
        false
    }
}

/// Builds a transport from its config section
pub type TransportBuilder = Arc<dyn Fn(&TransportConfig) -> Result<Arc<dyn Transport>> + Send + Sync>;

/// Resolves transports from config by their `type` tag
#[derive(Clone)]
pub struct TransportFactory {
    builders: HashMap<String, TransportBuilder>,
}

impl fmt::Debug for TransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("TransportFactory").field("kinds", &kinds).finish()
    }
}

impl Default for TransportFactory {
    fn default() -> Self {
        let mut factory = Self {
            builders: HashMap::new(),
        };
        factory.register(console::KIND, |_| Ok(Arc::new(ConsoleTransport::new())));
        factory.register(console::NOOP_KIND, |_| Ok(Arc::new(NoopTransport)));
        factory.register(file::KIND, |config| Ok(Arc::new(FileTransport::from_config(config)?)));
        factory.register(http::KIND, |config| {
            Ok(Arc::new(HttpTransport::from_config(config, Arc::new(UreqSession::new()))?))
        });
        factory
    }
}

impl TransportFactory {
    /// Register (or replace) the builder for a transport type
    pub fn register<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&TransportConfig) -> Result<Arc<dyn Transport>> + Send + Sync + 'static,
    {
        self.builders.insert(kind.to_string(), Arc::new(builder));
    }

    /// Use the given session for transports of type `http`
    pub fn with_http_session(mut self, session: Arc<dyn HttpSession>) -> Self {
        self.register(http::KIND, move |config| {
            Ok(Arc::new(HttpTransport::from_config(config, Arc::clone(&session))?))
        });
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Build the transport described by `config`, or the console transport
    /// when there is no config.
    ///
    /// A section without a type tag, or with an unregistered one, is an error.
    pub fn create(&self, config: Option<&TransportConfig>) -> Result<Arc<dyn Transport>> {
        let Some(config) = config else {
            log::warn!("No lineage transport configured, falling back to console");
            return Ok(Arc::new(ConsoleTransport::new()));
        };

        let kind = config.kind.as_deref().ok_or(Error::MissingTransportType)?;
        let builder = self
            .builders
            .get(kind)
            .ok_or_else(|| Error::UnknownTransport(kind.to_string()))?;

        let transport = builder(config)?;
        log::debug!("Created '{}' lineage transport", transport.kind());
        Ok(transport)
    }
}
