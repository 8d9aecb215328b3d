use super::Transport;
use crate::error::Result;
use crate::event::RunEvent;

pub const KIND: &str = "console";
pub const NOOP_KIND: &str = "noop";

/// Writes each event's canonical JSON to the log at info level
#[derive(Debug, Clone, Default)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for ConsoleTransport {
    fn kind(&self) -> &str {
        KIND
    }

    fn emit(&self, event: &RunEvent) -> Result<()> {
        log::info!("{}", event.to_canonical_json()?);
        Ok(())
    }
}

/// Drops every event
#[derive(Debug, Clone, Default)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn kind(&self) -> &str {
        NOOP_KIND
    }

    fn emit(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}
