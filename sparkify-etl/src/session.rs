//! ETL session
//!
//! Scopes one pipeline run: the resolved configuration, the storage
//! collaborator, and a run id for log correlation. Credentials live inside
//! the storage value and are dropped with the session.

use crate::error::EtlResult;
use crate::storage::{LocalStorage, TableStorage};
use sparkify_common::config::{Credentials, TomlConfig};
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

pub struct EtlSession {
    run_id: Uuid,
    config: TomlConfig,
    storage: Box<dyn TableStorage>,
    credentials_attached: bool,
    started: Instant,
}

impl EtlSession {
    pub fn new(config: TomlConfig, storage: Box<dyn TableStorage>) -> Self {
        let run_id = Uuid::new_v4();
        info!("ETL session {} started", run_id);
        Self {
            run_id,
            config,
            storage,
            credentials_attached: false,
            started: Instant::now(),
        }
    }

    /// Open a session over local directories taken from `config`
    pub fn open_local(config: TomlConfig, credentials: Option<Credentials>) -> EtlResult<Self> {
        let storage = LocalStorage::new(&config.input_base, &config.output_base)?
            .with_compression(config.output.compression)
            .with_credentials(credentials);
        info!("Input base: {}", storage.input_base().display());
        info!("Output base: {}", storage.output_base().display());
        let credentials_attached = storage.has_credentials();
        info!(
            "Storage credentials: {}",
            if credentials_attached { "attached" } else { "none" }
        );
        Ok(Self {
            credentials_attached,
            ..Self::new(config, Box::new(storage))
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn TableStorage {
        self.storage.as_ref()
    }

    /// Whether the storage was opened with credentials
    pub fn has_credentials(&self) -> bool {
        self.credentials_attached
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Release the session
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "ETL session {} stopped after {:.2}s",
            self.run_id,
            elapsed.as_secs_f64()
        );
        elapsed
    }
}
