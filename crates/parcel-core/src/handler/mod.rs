//! Package handlers.
//!
//! A handler owns exactly one URN namespace and knows how to turn references
//! and web URLs from its source into [`Package`] records. Handlers are
//! stateless with respect to records: everything they produce is handed to
//! the caller.

pub mod choco;
pub mod msstore;
pub mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcel_schema::Urn;
use reqwest::Url;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::gate::HostEnvironment;
use crate::images::ImageDescriptor;
use crate::package::{Package, ReviewSummary, SourceDetails};

pub use choco::{ChocoFeed, ChocoHandler, ChocoPackage};
pub use msstore::{MsStoreHandler, PackageInstance, StoreCatalog, StoreProduct};
pub use registry::{Aggregate, HandlerWarning, Registry, RegistryBuilder};

/// A source of packages addressed by one URN namespace.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The namespace this handler owns (`msstore`, `choco`, ...).
    fn namespace(&self) -> &str;

    /// Human readable source name.
    fn display_name(&self) -> &str;

    /// Whether [`Handler::search`] is worth calling.
    fn supports_search(&self) -> bool {
        true
    }

    /// Whether the source curates a featured list.
    fn supports_featured(&self) -> bool {
        false
    }

    /// Full-text search of the source.
    async fn search(&self, _query: &str) -> Result<Vec<Package>> {
        Ok(Vec::new())
    }

    /// The source's featured packages.
    async fn featured(&self) -> Result<Vec<Package>> {
        Ok(Vec::new())
    }

    /// Short list of likely matches for a partially typed query. Sources
    /// without a suggestion service return nothing.
    async fn search_suggestions(&self, _query: &str) -> Result<Vec<Package>> {
        Ok(Vec::new())
    }

    /// Look up one package by reference.
    async fn get_by_reference(&self, urn: &Urn) -> Result<Package>;

    /// Look up the package a web URL points to. `Ok(None)` means the URL
    /// does not belong to this source.
    async fn get_by_url(&self, url: &Url) -> Result<Option<Package>>;

    /// Web URL of a package's page on this source.
    fn url_for(&self, package: &Package) -> Result<Url>;

    /// Badge image for the source itself.
    fn representative_image(&self) -> ImageDescriptor;

    /// Populate a concrete download location on `package`.
    async fn resolve_download(&self, package: &mut Package, host: &HostEnvironment) -> Result<()>;
}

/// Reject references outside the handler's namespace.
pub(crate) fn ensure_namespace(handler: &dyn Handler, urn: &Urn) -> Result<()> {
    if urn.namespace() == handler.namespace() {
        Ok(())
    } else {
        Err(Error::WrongNamespace {
            handler: handler.namespace().to_string(),
            got: urn.to_string(),
        })
    }
}

/// Reject records outside the handler's namespace.
pub(crate) fn ensure_owned(handler: &dyn Handler, package: &Package) -> Result<()> {
    ensure_namespace(handler, package.urn())
}

/// Fields every catalog entry shares, regardless of source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Listing {
    pub title: String,
    #[serde(default)]
    pub short_title: Option<String>,
    #[serde(default)]
    pub publisher_id: String,
    #[serde(default)]
    pub developer_name: String,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub display_price: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<u64>,
    #[serde(default)]
    pub review_summary: Option<ReviewSummary>,
}

impl Listing {
    /// Build a fresh record from this listing.
    pub fn into_package(self, urn: Urn, details: SourceDetails) -> Package {
        let mut package = Package::new(urn, self.title, details);
        package.short_title = self.short_title;
        package.publisher_id = self.publisher_id;
        package.developer_name = self.developer_name;
        package.release_date = self.release_date;
        package.description = self.description;
        package.version = self.version;
        package.price = self.price;
        package.display_price = self.display_price;
        package.website = self.website;
        package.images = self.images;
        package.average_rating = self.average_rating;
        package.rating_count = self.rating_count;
        package.review_summary = self.review_summary;
        package
    }
}
