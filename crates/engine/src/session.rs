use consentry_core::{AuditError, ScanSession, Stage};
use consentry_storage::{KeyValueStore, keys, load, save};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

fn storage(e: anyhow::Error) -> AuditError {
    AuditError::storage_error(e.to_string())
}

/// The running scan's view of the store.
///
/// Every write first checks that this context's session id is still the store's
/// active id, so a step that outlived a cancel or restart cannot commit.
pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
    session: ScanSession,
}

impl SessionContext {
    /// Opens a new session, wiping the previous session's artifacts and cookie records.
    pub async fn begin(store: Arc<dyn KeyValueStore>, url: &str, stage: Stage) -> Result<Self, AuditError> {
        if let Some(active) = Self::active_id(&*store).await? {
            let current: Option<ScanSession> = load(&*store, keys::SESSION).await.map_err(storage)?;
            if current.is_some_and(|s| s.session_id == active && s.stage.is_in_flight()) {
                return Err(AuditError::session_busy(active));
            }
        }

        let last: Option<u64> = load(&*store, keys::LAST_ID).await.map_err(storage)?;
        let session_id = last.unwrap_or(0) + 1;

        for key in keys::ARTIFACTS {
            store.remove(key).await.map_err(storage)?;
        }
        for key in store.keys(keys::COOKIE_PREFIX).await.map_err(storage)? {
            store.remove(&key).await.map_err(storage)?;
        }

        save(&*store, keys::LAST_ID, &session_id).await.map_err(storage)?;
        save(&*store, keys::ACTIVE_ID, &session_id).await.map_err(storage)?;

        let ctx = Self {
            store,
            session: ScanSession::new(session_id, url, stage),
        };
        ctx.commit().await?;
        info!(session_id, url, ?stage, "session started");
        Ok(ctx)
    }

    /// Re-attaches to the active session, if the store holds one.
    pub async fn attach(store: Arc<dyn KeyValueStore>) -> Result<Option<Self>, AuditError> {
        let Some(active) = Self::active_id(&*store).await? else {
            return Ok(None);
        };
        let session: Option<ScanSession> = load(&*store, keys::SESSION).await.map_err(storage)?;
        match session {
            Some(session) if session.session_id == active => {
                debug!(session_id = active, stage = ?session.stage, "attached to session");
                Ok(Some(Self { store, session }))
            }
            _ => Ok(None),
        }
    }

    /// Resets the store to NOT_STARTED. In-flight steps notice on their next write.
    pub async fn cancel(store: &dyn KeyValueStore) -> Result<Option<u64>, AuditError> {
        let active = Self::active_id(store).await?;
        store.remove(keys::ACTIVE_ID).await.map_err(storage)?;
        for key in keys::ARTIFACTS {
            store.remove(key).await.map_err(storage)?;
        }
        let last: Option<u64> = load(store, keys::LAST_ID).await.map_err(storage)?;
        save(store, keys::SESSION, &ScanSession::reset(last.unwrap_or(0)))
            .await
            .map_err(storage)?;
        info!(?active, "session cancelled");
        Ok(active)
    }

    async fn active_id(store: &dyn KeyValueStore) -> Result<Option<u64>, AuditError> {
        load(store, keys::ACTIVE_ID).await.map_err(storage)
    }

    pub fn id(&self) -> u64 {
        self.session.session_id
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ScanSession {
        &mut self.session
    }

    pub async fn ensure_active(&self) -> Result<(), AuditError> {
        let active = Self::active_id(&*self.store).await?;
        if active != Some(self.id()) {
            return Err(AuditError::stale_session(self.id(), active));
        }
        Ok(())
    }

    pub async fn commit(&self) -> Result<(), AuditError> {
        self.ensure_active().await?;
        save(&*self.store, keys::SESSION, &self.session).await.map_err(storage)
    }

    /// Moves to `stage` and commits.
    pub async fn advance(&mut self, stage: Stage) -> Result<(), AuditError> {
        debug!(session_id = self.id(), from = ?self.session.stage, to = ?stage, "stage transition");
        self.session.stage = stage;
        self.commit().await
    }

    pub async fn put<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), AuditError> {
        self.ensure_active().await?;
        save(&*self.store, key, value).await.map_err(storage)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AuditError> {
        load(&*self.store, key).await.map_err(storage)
    }

    /// Like `get`, but a missing value is fatal.
    pub async fn artifact<T: DeserializeOwned>(&self, key: &str) -> Result<T, AuditError> {
        self.get(key).await?.ok_or_else(|| AuditError::missing_artifact(key))
    }

    /// Commits the final state and releases the active id.
    pub async fn close(self) -> Result<ScanSession, AuditError> {
        self.commit().await?;
        self.store.remove(keys::ACTIVE_ID).await.map_err(storage)?;
        info!(session_id = self.id(), "session closed");
        Ok(self.session)
    }
}
