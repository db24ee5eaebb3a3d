//! Wiring of the whole pipeline from a configuration.

use crate::config::{Config, DatabaseConfig};
use crate::db::{default_database_path, Database};
use crate::error::{ConfigError, Result};
use crate::pipeline::PipelineService;
use crate::worker::{Collaborators, StageSupervisor, WorkerContext};

/// A running pipeline: the service the application calls into and the
/// stage workers behind it.
pub struct Vidscreen {
    db: Database,
    service: PipelineService,
    supervisor: StageSupervisor,
}

impl Vidscreen {
    /// Opens the configured database, or the default one under the home
    /// directory.
    pub fn open_database(config: &DatabaseConfig) -> Result<Database> {
        let path = config
            .path
            .clone()
            .or_else(default_database_path)
            .ok_or_else(|| ConfigError::Validation {
                message: "No database path configured and no home directory found".to_string(),
            })?;
        Ok(Database::open(&path)?)
    }

    /// Opens the database and starts the stage workers. Must be called
    /// from within a tokio runtime.
    pub fn start(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let db = Self::open_database(&config.database)?;
        let ctx = WorkerContext::build(config, db.clone(), collaborators)?;
        let service = PipelineService::new(
            db.clone(),
            ctx.delivery.clone(),
            ctx.directory.clone(),
            config.survey.clone(),
            config.mail.clone(),
            config.scoring.default_threshold,
        );
        let supervisor = StageSupervisor::start(ctx, &config.workers);
        Ok(Self {
            db,
            service,
            supervisor,
        })
    }

    pub fn service(&self) -> &PipelineService {
        &self.service
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Stops the workers. An interrupted AI job is resumed on the next start.
    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
    }
}
