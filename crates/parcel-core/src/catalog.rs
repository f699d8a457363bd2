//! File-backed catalog.
//!
//! [`StaticCatalog`] serves both the store and the community feed provider
//! traits from a TOML document:
//!
//! ```toml
//! [[msstore]]
//! store_id = "9NBLGGH4R315"
//! title = "Sample App"
//! allowed_platforms = ["desktop"]
//! featured = true
//!
//! [[msstore.instances]]
//! package_uri = "https://example.com/sample.msixbundle"
//! moniker = "Sample_1.0.0.0_neutral__8wekyb3d8bbwe"
//! version = "1.0.0.0"
//!
//! [[choco]]
//! package_id = "git"
//! title = "Git"
//! version = "2.45.1"
//! download_url = "https://example.com/git.exe"
//! ```
//!
//! Dates (`release_date`) are RFC 3339 strings.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::handler::{ChocoFeed, ChocoPackage, Listing, PackageInstance, StoreCatalog, StoreProduct};

#[derive(Debug, Clone, Deserialize)]
struct StoreEntry {
    #[serde(flatten)]
    product: StoreProduct,
    #[serde(default)]
    featured: bool,
    #[serde(default)]
    instances: Vec<PackageInstance>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    msstore: Vec<StoreEntry>,
    #[serde(default)]
    choco: Vec<ChocoPackage>,
}

/// In-memory catalog parsed from a TOML document.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    store: Vec<StoreEntry>,
    choco: Vec<ChocoPackage>,
}

impl StaticCatalog {
    /// Parse a catalog document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|e| Error::Config(format!("catalog: {e}")))?;
        Ok(Self {
            store: file.msstore,
            choco: file.choco,
        })
    }

    /// Read and parse a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// True when neither source has entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty() && self.choco.is_empty()
    }

    fn store_entry(&self, product_id: &str) -> Option<&StoreEntry> {
        self.store
            .iter()
            .find(|e| e.product.details.store_id.eq_ignore_ascii_case(product_id))
    }
}

fn matches_query(listing: &Listing, id: &str, query: &str) -> bool {
    let query = query.to_lowercase();
    listing.title.to_lowercase().contains(&query)
        || id.to_lowercase().contains(&query)
        || listing.description.to_lowercase().contains(&query)
}

#[async_trait]
impl StoreCatalog for StaticCatalog {
    async fn product(&self, product_id: &str) -> Result<Option<StoreProduct>> {
        Ok(self.store_entry(product_id).map(|e| e.product.clone()))
    }

    async fn search(&self, query: &str) -> Result<Vec<StoreProduct>> {
        Ok(self
            .store
            .iter()
            .filter(|e| matches_query(&e.product.listing, &e.product.details.store_id, query))
            .map(|e| e.product.clone())
            .collect())
    }

    async fn featured(&self) -> Result<Vec<StoreProduct>> {
        Ok(self
            .store
            .iter()
            .filter(|e| e.featured)
            .map(|e| e.product.clone())
            .collect())
    }

    /// Titles that start with the query.
    async fn suggestions(&self, query: &str) -> Result<Vec<StoreProduct>> {
        let query = query.to_lowercase();
        Ok(self
            .store
            .iter()
            .filter(|e| e.product.listing.title.to_lowercase().starts_with(&query))
            .map(|e| e.product.clone())
            .collect())
    }

    async fn package_instances(&self, product_id: &str) -> Result<Vec<PackageInstance>> {
        Ok(self
            .store_entry(product_id)
            .map(|e| e.instances.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChocoFeed for StaticCatalog {
    async fn package(&self, id: &str, version: &str) -> Result<Option<ChocoPackage>> {
        Ok(self
            .choco
            .iter()
            .find(|p| p.details.package_id.eq_ignore_ascii_case(id) && p.listing.version == version)
            .cloned())
    }

    async fn search(&self, query: &str) -> Result<Vec<ChocoPackage>> {
        Ok(self
            .choco
            .iter()
            .filter(|p| matches_query(&p.listing, &p.details.package_id, query))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageKind;
    use parcel_schema::Platform;

    const CATALOG: &str = r#"
[[msstore]]
store_id = "9NBLGGH4R315"
title = "Sample App"
description = "Takes notes"
release_date = "2021-04-01T00:00:00Z"
price = 0
average_rating = 4.5
rating_count = 120
allowed_platforms = ["desktop", "xbox"]
warnings = ["Contains in-app purchases"]
featured = true

[msstore.review_summary]
average_rating = 4.5
review_count = 120
star_counts = [2, 3, 10, 25, 80]

[[msstore.images]]
kind = "tile"
url = "https://example.com/tile.png"
width = 150
height = 150

[[msstore.instances]]
package_uri = "https://example.com/sample.msixbundle"
moniker = "Sample_1.0.0.0_neutral__8wekyb3d8bbwe"
version = "1.0.0.0"

[[msstore]]
store_id = "9WZDNCRFJ3TJ"
title = "Other"

[[choco]]
package_id = "git"
title = "Git"
version = "2.45.1"
download_url = "https://example.com/git.exe"
sha256 = "abc"
tags = ["vcs"]
"#;

    #[tokio::test]
    async fn test_store_side() {
        let catalog = StaticCatalog::from_toml(CATALOG).unwrap();

        let product = StoreCatalog::product(&catalog, "9nblggh4r315")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.listing.title, "Sample App");
        assert_eq!(product.listing.price, Some(0.0));
        assert!(product.listing.release_date.is_some());
        assert_eq!(product.listing.images[0].kind, ImageKind::Tile);
        assert_eq!(
            product.details.allowed_platforms,
            Some(vec![Platform::Desktop, Platform::Xbox])
        );
        assert!(product.details.architectures.is_none());
        assert_eq!(product.listing.average_rating, Some(4.5));
        assert_eq!(product.listing.rating_count, Some(120));
        let summary = product.listing.review_summary.as_ref().unwrap();
        assert_eq!(summary.star_counts, [2, 3, 10, 25, 80]);
        assert_eq!(product.details.warnings, ["Contains in-app purchases"]);

        let featured = StoreCatalog::featured(&catalog).await.unwrap();
        assert_eq!(featured.len(), 1);

        let found = StoreCatalog::search(&catalog, "notes").await.unwrap();
        assert_eq!(found.len(), 1);

        let suggested = StoreCatalog::suggestions(&catalog, "sam").await.unwrap();
        assert_eq!(suggested.len(), 1);
        // Suggestions match title prefixes only.
        assert!(StoreCatalog::suggestions(&catalog, "notes").await.unwrap().is_empty());

        let instances = catalog.package_instances("9NBLGGH4R315").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert!(catalog.package_instances("9WZDNCRFJ3TJ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_side() {
        let catalog = StaticCatalog::from_toml(CATALOG).unwrap();
        let git = catalog.package("git", "2.45.1").await.unwrap().unwrap();
        assert_eq!(git.details.sha256.as_deref(), Some("abc"));
        assert!(catalog.package("git", "1.0").await.unwrap().is_none());
        assert_eq!(ChocoFeed::search(&catalog, "GIT").await.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_catalog_is_config_error() {
        let err = StaticCatalog::from_toml("[[msstore]]\ntitle = 5").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
