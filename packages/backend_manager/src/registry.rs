use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connection::{BackendActor, BackendConfig, BackendHandle, BackendSnapshot};
use crate::id::BackendId;

/// Settings applied to every connection the registry creates
#[derive(Clone, Debug)]
pub struct BackendOptions {
    pub connect_timeout: Duration,
    pub event_capacity: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            event_capacity: 1024,
        }
    }
}

/// Outcome of [`BackendRegistry::ensure`]
#[derive(Clone)]
pub enum Ensured {
    /// A new connection was created and has started connecting
    Created(BackendHandle),
    /// A connection already existed; its credential was left untouched
    Existing(BackendHandle),
}

impl Ensured {
    pub fn handle(&self) -> &BackendHandle {
        match self {
            Ensured::Created(h) | Ensured::Existing(h) => h,
        }
    }

    pub fn into_handle(self) -> BackendHandle {
        match self {
            Ensured::Created(h) | Ensured::Existing(h) => h,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }
}

/// At most one live connection per [`BackendId`]
pub struct BackendRegistry {
    backends: RwLock<HashMap<BackendId, BackendHandle>>,
    options: BackendOptions,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new(BackendOptions::default())
    }
}

impl BackendRegistry {
    pub fn new(options: BackendOptions) -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            options,
        }
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    /// Return the connection for `id`, creating it (and starting the connect)
    /// if there is none.
    pub async fn ensure(&self, id: BackendId, credential: Option<String>) -> Ensured {
        self.ensure_with(id, credential, |_| {}).await
    }

    /// Like [`ensure`](Self::ensure), but runs `on_created` against a freshly
    /// created handle before it starts connecting, so subscribers attached
    /// there see the greeting.
    pub async fn ensure_with<F>(
        &self,
        id: BackendId,
        credential: Option<String>,
        on_created: F,
    ) -> Ensured
    where
        F: FnOnce(&BackendHandle),
    {
        let mut backends = self.backends.write().await;

        if let Some(existing) = backends.get(&id) {
            warn!("MPD exists [{}]", id);
            return Ensured::Existing(existing.clone());
        }

        let config = BackendConfig {
            id: id.clone(),
            credential,
            connect_timeout: self.options.connect_timeout,
            event_capacity: self.options.event_capacity,
        };
        let handle = BackendActor::spawn(config);
        on_created(&handle);
        handle.start();

        info!("Created backend connection {}", id);
        backends.insert(id, handle.clone());
        Ensured::Created(handle)
    }

    pub async fn get(&self, id: &BackendId) -> Option<BackendHandle> {
        self.backends.read().await.get(id).cloned()
    }

    /// Remove and shut down the connection for `id`.
    pub async fn remove(&self, id: &BackendId) -> Option<BackendHandle> {
        let removed = self.backends.write().await.remove(id);
        match removed {
            Some(handle) => {
                handle.shutdown().await;
                info!("Destroyed backend connection {}", id);
                Some(handle)
            }
            None => {
                debug!("No backend connection {} to destroy", id);
                None
            }
        }
    }

    /// Snapshots of every connection, ordered by id.
    pub async fn list(&self) -> Vec<BackendSnapshot> {
        let handles: Vec<BackendHandle> = {
            let backends = self.backends.read().await;
            let mut handles: Vec<_> = backends.values().cloned().collect();
            handles.sort_by(|a, b| a.id().cmp(b.id()));
            handles
        };

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in &handles {
            snapshots.push(handle.snapshot().await);
        }
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.read().await.is_empty()
    }

    /// Shut down and forget every connection.
    pub async fn shutdown_all(&self) {
        let drained: Vec<_> = self.backends.write().await.drain().collect();
        for (id, handle) in drained {
            debug!("Shutting down backend {}", id);
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BackendEvent, ConnectivityState};
    use crate::test_helpers::{FakeReply, spawn_fake_mpd};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn ensure_twice_returns_same_connection() {
        let fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let registry = BackendRegistry::default();

        let first = registry.ensure(fake.id.clone(), Some("a".into())).await;
        assert!(first.is_created());

        let second = registry.ensure(fake.id.clone(), Some("b".into())).await;
        assert!(!second.is_created());
        assert_eq!(registry.len().await, 1);

        // The first credential is kept
        assert!(second.handle().snapshot().await.has_credential);
        assert_eq!(first.handle().id(), second.handle().id());
    }

    #[tokio::test]
    async fn on_created_runs_only_for_new_connections() {
        let fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let registry = BackendRegistry::default();
        let calls = Arc::new(AtomicBool::new(false));

        let c = calls.clone();
        registry
            .ensure_with(fake.id.clone(), None, move |_| c.store(true, Ordering::SeqCst))
            .await;
        assert!(calls.swap(false, Ordering::SeqCst));

        let c = calls.clone();
        registry
            .ensure_with(fake.id.clone(), None, move |_| c.store(true, Ordering::SeqCst))
            .await;
        assert!(!calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn subscriber_from_on_created_sees_greeting() {
        let fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let registry = BackendRegistry::default();

        let mut rx = None;
        registry
            .ensure_with(fake.id.clone(), None, |handle| rx = Some(handle.subscribe()))
            .await;
        let mut rx = rx.unwrap();

        match rx.recv().await.unwrap() {
            BackendEvent::Message { data, .. } => assert_eq!(data, "OK MPD 0.23.5\n"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn remove_unknown_is_none() {
        let registry = BackendRegistry::default();
        assert!(
            registry
                .remove(&BackendId::new("127.0.0.1", 6600))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn remove_shuts_down_and_forgets() {
        let fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let registry = BackendRegistry::default();
        registry.ensure(fake.id.clone(), None).await;

        let removed = registry.remove(&fake.id).await.unwrap();
        assert!(removed.is_shut_down());
        assert_eq!(
            removed.status().await.connectivity,
            ConnectivityState::Disconnected
        );
        assert!(registry.get(&fake.id).await.is_none());
        assert!(registry.is_empty().await);

        // A later ensure creates a fresh connection
        assert!(registry.ensure(fake.id.clone(), None).await.is_created());
    }

    #[tokio::test]
    async fn remove_completes_while_a_write_is_blocked() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let id = BackendId::new("127.0.0.1", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let registry = BackendRegistry::default();
        let handle = registry.ensure(id.clone(), None).await.into_handle();
        let writer = tokio::spawn(async move { handle.send(&"x".repeat(64 << 20)).await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let removed = tokio::time::timeout(Duration::from_secs(3), registry.remove(&id))
            .await
            .expect("remove did not complete");
        assert!(removed.is_some());
        assert!(writer.await.unwrap().is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn list_is_sorted_and_hides_credentials() {
        let registry = BackendRegistry::default();
        registry
            .ensure(BackendId::new("127.0.0.2", 1), Some("pw".into()))
            .await;
        registry.ensure(BackendId::new("127.0.0.1", 1), None).await;

        let list = registry.list().await;
        let ids: Vec<_> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["127.0.0.1:1", "127.0.0.2:1"]);
        assert!(!list[0].has_credential);
        assert!(list[1].has_credential);

        registry.shutdown_all().await;
        assert_eq!(registry.len().await, 0);
    }
}
