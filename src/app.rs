//! Application bootstrap: storage, authorizer and module lifecycle.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use bookshelf_authz::Authz;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A fully started application: modules initialized, migrations applied.
pub struct App {
    settings: Settings,
    db: Database,
    authz: Arc<Authz>,
    registry: ModuleRegistry,
}

impl App {
    /// Connect storage, build the authorizer and bring every module up.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let db = Database::connect(&settings.database.url, settings.database.max_connections)
            .await
            .with_context(|| format!("failed to open database '{}'", settings.database.url))?;
        let authz = Arc::new(Authz::new(&settings.auth.jwt_secret, &settings.auth.roles));

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry);

        let ctx = InitCtx {
            settings: &settings,
            db: &db,
            authz: &authz,
        };
        registry.init_modules(&ctx).await?;

        let applied = db
            .migrate(&registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, "migrations complete");

        registry.start_modules(&ctx).await?;

        Ok(Self {
            settings,
            db,
            authz,
            registry,
        })
    }

    pub fn router(&self) -> anyhow::Result<Router> {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }

    pub fn authz(&self) -> &Arc<Authz> {
        &self.authz
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Serve HTTP until a shutdown signal, then tear down.
    pub async fn serve(self) -> anyhow::Result<()> {
        let served = bookshelf_http::start_server(&self.registry, &self.settings).await;
        self.shutdown().await?;
        served
    }

    /// Stop modules in reverse order, then close the pool.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let stopped = self.registry.stop_modules().await;
        self.db.close().await;
        stopped
    }
}

/// Apply pending migrations without starting modules or serving.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = Database::connect(&settings.database.url, settings.database.max_connections)
        .await
        .with_context(|| format!("failed to open database '{}'", settings.database.url))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let applied = db
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    db.close().await;
    Ok(applied)
}
