//! Namespace-keyed handler registry.
//!
//! The registry is assembled once through [`RegistryBuilder`] and is
//! read-only afterwards. Registration order is the priority order used when
//! matching URLs and when concatenating fan-out results.

use std::sync::Arc;

use futures::future::join_all;
use parcel_schema::{PackageStatus, Urn};
use reqwest::Url;
use tracing::{debug, warn};

use super::Handler;
use crate::error::{Error, Result};
use crate::package::Package;

/// Collects handlers before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<Arc<dyn Handler>>,
}

impl RegistryBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler after those already registered.
    pub fn register(self, handler: impl Handler + 'static) -> Self {
        self.register_arc(Arc::new(handler))
    }

    /// Add a shared handler after those already registered.
    pub fn register_arc(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Move the named namespaces to the front, in the given order. Unknown
    /// names are ignored; unnamed handlers keep their relative order.
    pub fn prioritize<S: AsRef<str>>(mut self, order: &[S]) -> Self {
        let rank = |h: &Arc<dyn Handler>| {
            order
                .iter()
                .position(|ns| ns.as_ref() == h.namespace())
                .unwrap_or(order.len())
        };
        self.handlers.sort_by_key(rank);
        self
    }

    /// Freeze the registry.
    ///
    /// Fails with [`Error::DuplicateNamespace`] if two handlers claim the
    /// same namespace.
    pub fn build(self) -> Result<Registry> {
        for (i, handler) in self.handlers.iter().enumerate() {
            let ns = handler.namespace();
            if self.handlers[..i].iter().any(|h| h.namespace() == ns) {
                return Err(Error::DuplicateNamespace(ns.to_string()));
            }
        }
        Ok(Registry {
            handlers: self.handlers.into(),
        })
    }
}

/// A handler failure collected during a fan-out call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerWarning {
    pub namespace: String,
    pub message: String,
}

/// Result of a fan-out call: everything that succeeded plus what did not.
#[derive(Debug, Default)]
pub struct Aggregate {
    pub packages: Vec<Package>,
    pub warnings: Vec<HandlerWarning>,
}

/// Read-only handler lookup table. Cheap to clone.
#[derive(Clone)]
pub struct Registry {
    handlers: Arc<[Arc<dyn Handler>]>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.namespaces()).finish()
    }
}

impl Registry {
    /// Start assembling a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The handler owning `namespace`, if any.
    pub fn handler(&self, namespace: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|h| h.namespace() == namespace)
    }

    /// Registered namespaces in priority order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.namespace())
    }

    /// Handlers in priority order.
    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    /// The handler that owns `package`.
    pub fn handler_for(&self, package: &Package) -> Result<&Arc<dyn Handler>> {
        let ns = package.urn().namespace();
        self.handler(ns)
            .ok_or_else(|| Error::UnknownNamespace(ns.to_string()))
    }

    /// Resolve a parsed reference through its namespace's handler.
    pub async fn resolve_by_reference(&self, urn: &Urn) -> Result<Package> {
        let handler = self
            .handler(urn.namespace())
            .ok_or_else(|| Error::UnknownNamespace(urn.namespace().to_string()))?;
        let package = handler.get_by_reference(urn).await?;
        Ok(normalize(package))
    }

    /// Parse `text` as a reference and resolve it.
    pub async fn resolve(&self, text: &str) -> Result<Package> {
        self.resolve_by_reference(&Urn::parse(text)?).await
    }

    /// Ask each handler in priority order; the first that recognizes the
    /// URL wins.
    pub async fn resolve_by_url(&self, url: &Url) -> Result<Option<Package>> {
        for handler in self.handlers.iter() {
            if let Some(package) = handler.get_by_url(url).await? {
                debug!(namespace = handler.namespace(), %url, "URL matched");
                return Ok(Some(normalize(package)));
            }
        }
        Ok(None)
    }

    /// Web URL of `package` on its source.
    pub fn url_for(&self, package: &Package) -> Result<Url> {
        self.handler_for(package)?.url_for(package)
    }

    /// Search every handler that supports it, concurrently.
    pub async fn search(&self, query: &str) -> Aggregate {
        let handlers: Vec<_> = self
            .handlers
            .iter()
            .filter(|h| h.supports_search())
            .collect();
        let results = join_all(handlers.iter().map(|h| h.search(query))).await;
        collect(handlers.into_iter().zip(results))
    }

    /// Suggestions for a partial query from every searchable handler,
    /// concurrently.
    pub async fn search_suggestions(&self, query: &str) -> Aggregate {
        let handlers: Vec<_> = self
            .handlers
            .iter()
            .filter(|h| h.supports_search())
            .collect();
        let results = join_all(handlers.iter().map(|h| h.search_suggestions(query))).await;
        collect(handlers.into_iter().zip(results))
    }

    /// Featured lists of every handler that has one, concurrently.
    pub async fn featured(&self) -> Aggregate {
        let handlers: Vec<_> = self
            .handlers
            .iter()
            .filter(|h| h.supports_featured())
            .collect();
        let results = join_all(handlers.iter().map(|h| h.featured())).await;
        collect(handlers.into_iter().zip(results))
    }
}

fn normalize(mut package: Package) -> Package {
    package.advance(PackageStatus::None);
    package
}

fn collect<'a>(
    results: impl Iterator<Item = (&'a Arc<dyn Handler>, Result<Vec<Package>>)>,
) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for (handler, result) in results {
        match result {
            Ok(packages) => aggregate
                .packages
                .extend(packages.into_iter().map(normalize)),
            Err(e) => {
                warn!(namespace = handler.namespace(), error = %e, "Handler failed");
                aggregate.warnings.push(HandlerWarning {
                    namespace: handler.namespace().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
    aggregate
}
