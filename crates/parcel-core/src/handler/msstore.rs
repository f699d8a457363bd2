//! Handler for the first-party app store (`urn:msstore:<product id>`).

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parcel_schema::{PackageStatus, Platform, Urn};
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Handler, Listing, ensure_namespace, ensure_owned};
use crate::error::{Error, Result};
use crate::gate::HostEnvironment;
use crate::images::ImageDescriptor;
use crate::package::{Package, SourceDetails, StoreDetails};

/// URN namespace owned by [`MsStoreHandler`].
pub const NAMESPACE: &str = "msstore";

/// Most suggestions returned for one partial query.
pub const SUGGESTION_LIMIT: usize = 5;

/// Revision number the store uses for console-only builds.
const XBOX_REVISION: u32 = 70;

static URL_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r"(?i)^https?://apps\.microsoft\.com/(?:store/)?detail/(?:[^/?#]+/)?(?P<id>[0-9a-z]{12})(?:[/?#]|$)",
        r"(?i)^https?://(?:www\.)?microsoft\.com/(?:[a-z]{2}-[a-z]{2}/)?(?:store/)?p/[^/?#]+/(?P<id>[0-9a-z]{12})(?:[/?#]|$)",
        r"(?i)^ms-windows-store://pdp/?\?(?:.*&)?productid=(?P<id>[0-9a-z]{12})(?:&|$)",
    ]
    .map(|p| Regex::new(p).expect("store URL pattern is valid"))
});

/// A product as the store catalog describes it.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreProduct {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(flatten)]
    pub details: StoreDetails,
}

/// One downloadable build of a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageInstance {
    pub package_uri: String,
    pub moniker: String,
    /// Four-part version, `major.minor.build.revision`.
    pub version: String,
}

impl PackageInstance {
    fn version_parts(&self) -> [u32; 4] {
        let mut parts = [0; 4];
        for (slot, part) in parts.iter_mut().zip(self.version.split('.')) {
            *slot = part.trim().parse().unwrap_or(0);
        }
        parts
    }

    fn revision(&self) -> u32 {
        self.version_parts()[3]
    }
}

/// Store metadata provider. Implementations talk to the real catalog
/// service; the handler never does.
#[async_trait]
pub trait StoreCatalog: Send + Sync {
    async fn product(&self, product_id: &str) -> Result<Option<StoreProduct>>;

    async fn search(&self, query: &str) -> Result<Vec<StoreProduct>>;

    async fn featured(&self) -> Result<Vec<StoreProduct>>;

    /// Products matching a partially typed query, best first.
    async fn suggestions(&self, query: &str) -> Result<Vec<StoreProduct>> {
        self.search(query).await
    }

    /// Main package builds available for a product.
    async fn package_instances(&self, product_id: &str) -> Result<Vec<PackageInstance>>;
}

/// Handler for store products.
pub struct MsStoreHandler {
    catalog: Arc<dyn StoreCatalog>,
}

impl MsStoreHandler {
    /// Serve products from `catalog`.
    pub fn new(catalog: Arc<dyn StoreCatalog>) -> Self {
        Self { catalog }
    }

    fn to_package(product: StoreProduct) -> Result<Package> {
        let mut details = product.details;
        details.store_id = details.store_id.to_ascii_uppercase();
        let urn = Urn::new(NAMESPACE, &details.store_id)?;
        let has_location = details.package_uri.is_some();

        let mut package = product
            .listing
            .into_package(urn, SourceDetails::MsStore(details));
        package.advance(PackageStatus::None);
        if has_location {
            package.advance(PackageStatus::DownloadReady);
        }
        Ok(package)
    }

    fn to_packages(products: Vec<StoreProduct>) -> Result<Vec<Package>> {
        products.into_iter().map(Self::to_package).collect()
    }

    /// Product id embedded in a store web or protocol URL.
    pub fn product_id_from_url(url: &Url) -> Option<String> {
        URL_PATTERNS.iter().find_map(|re| {
            re.captures(url.as_str())
                .and_then(|c| c.name("id"))
                .map(|m| m.as_str().to_ascii_uppercase())
        })
    }
}

#[async_trait]
impl Handler for MsStoreHandler {
    fn namespace(&self) -> &str {
        NAMESPACE
    }

    fn display_name(&self) -> &str {
        "Microsoft Store"
    }

    fn supports_featured(&self) -> bool {
        true
    }

    async fn search(&self, query: &str) -> Result<Vec<Package>> {
        Self::to_packages(self.catalog.search(query).await?)
    }

    async fn featured(&self) -> Result<Vec<Package>> {
        Self::to_packages(self.catalog.featured().await?)
    }

    async fn search_suggestions(&self, query: &str) -> Result<Vec<Package>> {
        let mut products = self.catalog.suggestions(query).await?;
        products.truncate(SUGGESTION_LIMIT);
        Self::to_packages(products)
    }

    async fn get_by_reference(&self, urn: &Urn) -> Result<Package> {
        ensure_namespace(self, urn)?;
        let id = urn.id().to_ascii_uppercase();
        let product = self
            .catalog
            .product(&id)
            .await?
            .ok_or_else(|| Error::NotFound(urn.to_string()))?;
        Self::to_package(product)
    }

    async fn get_by_url(&self, url: &Url) -> Result<Option<Package>> {
        let Some(id) = Self::product_id_from_url(url) else {
            return Ok(None);
        };
        let urn = Urn::new(NAMESPACE, &id)?;
        self.get_by_reference(&urn).await.map(Some)
    }

    fn url_for(&self, package: &Package) -> Result<Url> {
        ensure_owned(self, package)?;
        let url = format!("https://apps.microsoft.com/detail/{}", package.urn().id());
        Url::parse(&url).map_err(|e| Error::upstream(NAMESPACE, e))
    }

    fn representative_image(&self) -> ImageDescriptor {
        ImageDescriptor::text("MS")
    }

    async fn resolve_download(&self, package: &mut Package, host: &HostEnvironment) -> Result<()> {
        ensure_owned(self, package)?;
        if package.has_download_location() {
            package.advance(PackageStatus::DownloadReady);
            return Ok(());
        }

        let id = package.urn().id().to_string();
        let instances = self.catalog.package_instances(&id).await?;
        let skip_console_builds = host.platform.is_some_and(|p| p != Platform::Xbox);

        let best = instances
            .into_iter()
            .filter(|i| !(skip_console_builds && i.revision() == XBOX_REVISION))
            .max_by_key(PackageInstance::version_parts)
            .ok_or_else(|| Error::NotFound(format!("no installable build for {}", package.urn())))?;
        debug!(moniker = %best.moniker, version = %best.version, "Selected package build");

        if let SourceDetails::MsStore(details) = package.details_mut() {
            details.package_uri = Some(best.package_uri);
            details.package_moniker = Some(best.moniker);
        }
        package.advance(PackageStatus::DownloadReady);
        info!(urn = %package.urn(), "Download location resolved");
        Ok(())
    }
}
