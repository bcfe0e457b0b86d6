//! Async lifecycle wrapper owning the calendar store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::lock::{Mutex, MutexGuard};
use tracing::info;

use crate::config::CalendarConfig;
use crate::error::{CalendarError, Result};
use crate::seed::{self, SeedData, SeedReport};
use crate::store::CalendarStore;

#[async_trait]
pub trait Lifecycle {
    async fn start(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
}

pub struct CalendarService {
    config: CalendarConfig,
    store: Option<Arc<Mutex<CalendarStore>>>,
}

impl CalendarService {
    /// Create a new calendar service with the given config
    pub fn new(config: CalendarConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.store.is_some()
    }

    /// Shared handle to the store, for callers that outlive a single request.
    pub fn store(&self) -> Result<Arc<Mutex<CalendarStore>>> {
        self.store.clone().ok_or(CalendarError::NotStarted)
    }

    pub async fn lock(&self) -> Result<MutexGuard<'_, CalendarStore>> {
        let store = self.store.as_ref().ok_or(CalendarError::NotStarted)?;
        Ok(store.lock().await)
    }

    /// Seed from the configured file, or the built-in sample set.
    pub async fn seed(&self) -> Result<SeedReport> {
        let data = match &self.config.seed_file {
            Some(path) => {
                info!(path = %path.display(), "loading seed data");
                SeedData::from_json_file(path)?
            }
            None => SeedData::builtin(),
        };
        let mut store = self.lock().await?;
        seed::seed(store.connection_mut(), &data)
    }
}

#[async_trait]
impl Lifecycle for CalendarService {
    async fn start(&mut self) -> Result<()> {
        info!(path = %self.config.db_path.display(), "starting calendar service");
        let store = CalendarStore::open(&self.config.db_path)?;
        self.store = Some(Arc::new(Mutex::new(store)));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.store = None;
        info!("calendar service stopped");
        Ok(())
    }
}
