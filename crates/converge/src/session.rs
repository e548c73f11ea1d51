//! Locked access to the local state file for the duration of one command

use converge_cloud::{GlobalState, StateLock, StateManager};
use std::path::Path;

pub struct Session {
    manager: StateManager,
    lock: StateLock,
    pub state: GlobalState,
}

impl Session {
    pub async fn open(root: &Path) -> anyhow::Result<Self> {
        let manager = StateManager::new(root);
        let lock = manager.acquire_lock().await?;
        let state = match manager.load().await {
            Ok(state) => state,
            Err(e) => {
                lock.release().await?;
                return Err(e.into());
            }
        };
        Ok(Self {
            manager,
            lock,
            state,
        })
    }

    /// Persist the state and release the lock, then hand back the command result
    ///
    /// The state is saved whether or not the command succeeded, so identifiers
    /// of half-provisioned objects survive a failed run.
    pub async fn finish<T>(self, result: anyhow::Result<T>) -> anyhow::Result<T> {
        let saved = self.manager.save(&self.state).await;
        self.lock.release().await?;
        if let Err(e) = saved {
            tracing::error!(error = %e, "failed to save state");
            return match result {
                Ok(_) => Err(e.into()),
                Err(original) => Err(original),
            };
        }
        result
    }
}
