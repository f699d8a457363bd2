//! Shared setup for commands: configuration, catalog, registry and
//! orchestrator.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use parcel_core::{
    ChocoHandler, CommandPrimitive, Config, EventBus, MsStoreHandler, Orchestrator, Package,
    Registry, StaticCatalog, paths,
};
use parcel_schema::Urn;
use reqwest::Url;
use tracing::debug;

pub struct Context {
    pub config: Config,
    pub orchestrator: Orchestrator,
}

impl Context {
    pub fn load(catalog: Option<&Path>) -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let catalog = Arc::new(load_catalog(catalog)?);

        let registry = Registry::builder()
            .register(MsStoreHandler::new(catalog.clone()))
            .register(ChocoHandler::new(catalog))
            .prioritize(&config.handler_order)
            .build()?;

        let primitive = Arc::new(CommandPrimitive::new(config.commands.clone()));
        let orchestrator =
            Orchestrator::new(registry, EventBus::new(), primitive).with_config(&config);
        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub fn registry(&self) -> &Registry {
        self.orchestrator.registry()
    }

    /// Resolve a reference or a source web URL.
    pub async fn resolve(&self, input: &str) -> Result<Package> {
        if let Ok(urn) = Urn::parse(input) {
            return Ok(self.registry().resolve_by_reference(&urn).await?);
        }
        if let Ok(url) = Url::parse(input) {
            return match self.registry().resolve_by_url(&url).await? {
                Some(package) => Ok(package),
                None => bail!("No source recognizes '{input}'"),
            };
        }
        // Neither form; report why the reference is malformed.
        Ok(self.registry().resolve(input).await?)
    }
}

fn load_catalog(explicit: Option<&Path>) -> Result<StaticCatalog> {
    if let Some(path) = explicit {
        return StaticCatalog::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()));
    }
    let path = paths::catalog_path()?;
    if path.exists() {
        StaticCatalog::load(&path).with_context(|| format!("Failed to load catalog {}", path.display()))
    } else {
        debug!(path = %path.display(), "No catalog, starting empty");
        Ok(StaticCatalog::default())
    }
}
