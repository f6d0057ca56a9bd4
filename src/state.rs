use crate::adapters;
use crate::config::{Config, HeaderProfile};
use crate::context::RequestContext;
use crate::protocol::Dispatcher;
use crate::vendor::{HttpVendor, VendorApi};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Application state shared across all request handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: SessionTable,
    /// Headers the configured adapter reads credentials from.
    pub headers: HeaderProfile,
    /// Cancelled once shutdown starts; open event streams end on it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize application state with the reqwest-backed vendor client.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let vendor = HttpVendor::new(
            adapters::vendor_name(config.adapter),
            &config.vendor_base_url,
            config.vendor_timeout,
        )?;

        tracing::info!(
            adapter = config.adapter.name(),
            base_url = %config.vendor_base_url,
            has_fallback_credential = config.fallback_credential.is_some(),
            "Vendor client ready"
        );

        Self::with_vendor(config, Arc::new(vendor))
    }

    /// Build state around any [`VendorApi`]. Used by tests to mock the vendor.
    pub fn with_vendor(config: Config, vendor: Arc<dyn VendorApi>) -> anyhow::Result<Self> {
        let registry = adapters::registry_for(&config, vendor)?;
        let dispatcher = Dispatcher::new(
            config.adapter.server_name(),
            env!("CARGO_PKG_VERSION"),
            registry,
        )
        .with_instructions(adapters::instructions(config.adapter));

        Ok(Self {
            headers: config.adapter.headers(),
            dispatcher: Arc::new(dispatcher),
            sessions: SessionTable::default(),
            shutdown: CancellationToken::new(),
            config: Arc::new(config),
        })
    }
}

/// One open `/sse` stream.
#[derive(Clone)]
pub struct SseSession {
    /// Outbound queue drained by the event stream.
    pub sender: mpsc::Sender<String>,
    /// Context captured from the `/sse` request headers.
    pub context: RequestContext,
}

/// Session id to open SSE stream.
///
/// Only connect and disconnect mutate the table; tool execution never touches it.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<DashMap<String, SseSession>>,
}

impl SessionTable {
    /// Register a new session. The entry lives exactly as long as the returned guard.
    pub fn open(
        &self,
        context: RequestContext,
        capacity: usize,
    ) -> (String, mpsc::Receiver<String>, SessionGuard) {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        self.inner.insert(id.clone(), SseSession { sender, context });
        metrics::gauge!("sse_sessions_active").set(self.inner.len() as f64);

        let guard = SessionGuard {
            id: id.clone(),
            table: self.clone(),
        };
        (id, receiver, guard)
    }

    pub fn get(&self, id: &str) -> Option<SseSession> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Removes its session from the table when dropped.
pub struct SessionGuard {
    id: String,
    table: SessionTable,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.table.inner.remove(&self.id);
        metrics::gauge!("sse_sessions_active").set(self.table.inner.len() as f64);
        tracing::info!(session_id = %self.id, "SSE session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransportKind;

    #[tokio::test]
    async fn session_lives_as_long_as_guard() {
        let table = SessionTable::default();
        let (id, mut rx, guard) = table.open(RequestContext::new(TransportKind::Sse), 4);

        assert!(table.contains(&id));
        table.get(&id).unwrap().sender.send("hi".into()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hi"));

        drop(guard);
        assert!(table.get(&id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn session_ids_are_unique() {
        let table = SessionTable::default();
        let (a, _ra, _ga) = table.open(RequestContext::new(TransportKind::Sse), 1);
        let (b, _rb, _gb) = table.open(RequestContext::new(TransportKind::Sse), 1);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }
}
