//! In-memory settings store
//!
//! Non-persistent store for development, single-node demos and tests.
//! Batches are checked before any key is written, so a rejected batch leaves
//! no partial state behind.

use super::SettingsStore;
use crate::error::StoreError;
use crate::model::SettingsMap;
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory settings store
#[derive(Clone, Default)]
pub struct MemorySettingsStore {
    values: Arc<DashMap<String, String>>,
    reject_reads: Arc<AtomicBool>,
    reject_writes: Arc<AtomicBool>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with settings
    pub fn with_settings(settings: SettingsMap) -> Self {
        let store = Self::new();
        for (key, value) in settings {
            store.values.insert(key, value);
        }
        store
    }

    /// Current value of a setting, if it was ever written
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Snapshot of every stored setting
    pub fn snapshot(&self) -> SettingsMap {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Make subsequent reads fail (simulates an unreachable store)
    pub fn set_reject_reads(&self, reject: bool) {
        self.reject_reads.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent writes fail (simulates an unreachable store)
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_write(&self, key: &str) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                key: key.to_string(),
                message: "store rejected the write".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_setting(&self, key: &str) -> Result<String> {
        if self.reject_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read {
                key: key.to_string(),
                message: "store rejected the read".to_string(),
            }
            .into());
        }
        Ok(self.value(key).unwrap_or_default())
    }

    async fn update_setting(&self, key: &str, value: &str) -> Result<()> {
        self.check_write(key)?;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn update_settings(&self, settings: &SettingsMap) -> Result<()> {
        for key in settings.keys() {
            self.check_write(key)?;
        }
        for (key, value) in settings {
            self.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
