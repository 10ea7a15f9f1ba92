//! Schema dispatch.
//!
//! An explicit registry maps schema URIs to handlers. It is populated once
//! at startup; any URI without an entry resolves to [`Handler::Ignore`].

use std::collections::BTreeMap;

use elitebgs_core::normalize::EventContext;
use elitebgs_core::reconcile::{Applied, Reconciler};
use elitebgs_types::{Envelope, JOURNAL_SCHEMA, JOURNAL_SCHEMA_LEGACY, JournalMessage};
use serde::Deserialize;
use tracing::debug;

use crate::error::ListenerError;

/// What to do with an envelope of a given schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Parse as a journal event and reconcile it.
    Journal,
    /// Drop silently.
    Ignore,
}

/// Schema URI to handler table.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl SchemaRegistry {
    /// An empty registry; every schema is ignored.
    pub fn new() -> Self {
        Self::default()
    }

    /// The production registry: the journal handler under both the current
    /// and the legacy journal URIs.
    pub fn with_defaults() -> Self {
        Self::new()
            .register(JOURNAL_SCHEMA, Handler::Journal)
            .register(JOURNAL_SCHEMA_LEGACY, Handler::Journal)
    }

    /// Add or replace the handler for `schema`.
    #[must_use]
    pub fn register(mut self, schema: &str, handler: Handler) -> Self {
        self.handlers.insert(schema.to_owned(), handler);
        self
    }

    /// Handler for `schema`.
    pub fn resolve(&self, schema: &str) -> Handler {
        self.handlers.get(schema).copied().unwrap_or(Handler::Ignore)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no schemas are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Routes decoded envelopes to their handler.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SchemaRegistry,
    reconciler: Reconciler,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`, reconciling into `reconciler`.
    pub const fn new(registry: SchemaRegistry, reconciler: Reconciler) -> Self {
        Self {
            registry,
            reconciler,
        }
    }

    /// Handle one envelope.
    ///
    /// Returns [`Applied::Ignored`] for unregistered schemas and for
    /// journal events that carry no tracked state.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<Applied, ListenerError> {
        match self.registry.resolve(&envelope.schema_ref) {
            Handler::Ignore => Ok(Applied::Ignored),
            Handler::Journal => {
                let message = JournalMessage::deserialize(&envelope.message)?;
                let ctx = EventContext::new(&envelope.header, &message);
                let applied = self.reconciler.apply(&message, &ctx).await?;
                debug!(
                    event = %message.event,
                    system = %message.star_system,
                    software = %ctx.software,
                    ?applied,
                    "journal event applied"
                );
                Ok(applied)
            }
        }
    }
}
