//! Client library for emitting lineage run events
//!
//! Events flow one way: caller → [`LineageClient::emit`] → [`FilterChain`]
//! (may drop the event) → [`Transport::emit`] → destination.
//!
//! ```no_run
//! use lineage_client::{Job, LineageClient, Run, RunEvent, RunState};
//!
//! let client = LineageClient::with_url("http://localhost:5000")?;
//! let event = RunEvent::now(RunState::Start, Run::new("run-1"), Job::new("etl", "daily_load"), "my-scheduler");
//! client.emit(&event)?;
//! # Ok::<(), lineage_client::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod transport;

pub use client::{ClientBuilder, ClientOptions, LineageClient};
pub use config::{Config, FilterConfig, SearchPaths, TransportConfig};
pub use error::{Error, Result};
pub use event::{Dataset, Job, Run, RunEvent, RunState};
pub use filter::{ExactMatchFilter, Filter, FilterChain, FilterRegistry, RegexFilter, create_filter};
pub use transport::{HttpSession, Transport, TransportFactory};
