//! Read-mostly handle over a [`Retriever`] with a serialised reload path.
//!
//! Searches never lock for longer than cloning an `Arc`; a request holds its
//! snapshot for its whole lifetime, so a concurrent reload never mixes old and
//! new indices inside one request.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sap_core::config::StoresConfig;
use sap_core::error::{Error, Result};
use sap_core::types::Modality;

use crate::index::fingerprint_dir;
use crate::retriever::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Swapped,
}

#[derive(Debug)]
pub struct SharedRetriever {
    stores: Option<StoresConfig>,
    current: RwLock<Arc<Retriever>>,
    reload_guard: Mutex<()>,
}

impl SharedRetriever {
    pub fn open(stores: StoresConfig) -> Result<Self> {
        let retriever = Retriever::open(&stores)?;
        Ok(Self {
            stores: Some(stores),
            current: RwLock::new(Arc::new(retriever)),
            reload_guard: Mutex::new(()),
        })
    }

    /// Wrap an in-memory retriever; `reload` is unavailable.
    pub fn from_retriever(retriever: Retriever) -> Self {
        Self { stores: None, current: RwLock::new(Arc::new(retriever)), reload_guard: Mutex::new(()) }
    }

    pub fn snapshot(&self) -> Arc<Retriever> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Re-open the stores if any file changed. On error the previous indices
    /// keep serving.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        let stores = self
            .stores
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("retriever was not opened from disk".to_string()))?;
        let _guard = self.reload_guard.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.snapshot();
        let mut unchanged = true;
        for (modality, known) in Modality::ALL.into_iter().zip(current.fingerprints()) {
            if fingerprint_dir(&stores.dir_for(modality))? != known {
                unchanged = false;
                break;
            }
        }
        if unchanged {
            tracing::debug!("vector stores unchanged; reload skipped");
            return Ok(ReloadOutcome::Unchanged);
        }

        let fresh = Retriever::open(stores).map_err(|e| {
            tracing::error!(error = %e, "reload failed; keeping previous indices");
            e
        })?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);
        tracing::info!("vector stores reloaded");
        Ok(ReloadOutcome::Swapped)
    }
}
