//! Package records.
//!
//! A [`Package`] carries the fields every source shares (title, publisher,
//! version, images, ...) plus a tagged [`SourceDetails`] payload holding the
//! source's native metadata. Records are created by handlers and owned by the
//! caller afterwards; handlers never keep them.
//!
//! The lifecycle status is private and only ever moves forward (see
//! [`PackageStatus::advance`]). At most one downloaded [`Artifact`] is bound
//! to a record at a time.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parcel_schema::{Arch, InstallerType, PackageStatus, Platform, Urn};
use serde::{Deserialize, Serialize};

use crate::images::{self, ImageDescriptor};

/// A downloaded installer payload bound to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location unique to this download.
    pub path: PathBuf,
    pub installer_type: InstallerType,
    /// `installer_type` is a guess; the archive declared no known content type.
    pub type_inferred: bool,
    pub size: u64,
    pub sha256: String,
}

/// Aggregated user reviews of a package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub average_rating: f64,
    pub review_count: u64,
    /// Review counts per star rating, one star first.
    #[serde(default)]
    pub star_counts: [u64; 5],
}

/// Native metadata of a store product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDetails {
    pub store_id: String,
    #[serde(default)]
    pub package_family_name: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub privacy_url: Option<String>,
    #[serde(default)]
    pub support_urls: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Notices the store shows before installing (age ratings, trial limits).
    #[serde(default)]
    pub warnings: Vec<String>,
    /// `None` means the catalog declared no platform restriction.
    #[serde(default)]
    pub allowed_platforms: Option<Vec<Platform>>,
    /// `None` means the architecture is only known from the installer manifest.
    #[serde(default)]
    pub architectures: Option<Vec<Arch>>,
    /// Resolved download location.
    #[serde(default)]
    pub package_uri: Option<String>,
    /// Resolved package moniker (`Name_Version_Arch__PublisherId`).
    #[serde(default)]
    pub package_moniker: Option<String>,
}

/// Native metadata of a community feed package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChocoDetails {
    pub package_id: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
}

/// Per-source payload of a [`Package`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDetails {
    MsStore(StoreDetails),
    Choco(ChocoDetails),
}

/// Where a field is shown on a generic package page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySection {
    Primary,
    AdditionalInfo,
}

/// Value of a [`DisplayField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    Text(String),
    List(Vec<String>),
}

/// A field a source explicitly exposes for generic display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayField {
    pub label: &'static str,
    pub section: DisplaySection,
    pub value: DisplayValue,
}

/// Collects display fields, skipping empty values.
#[derive(Default)]
struct DisplayFields(Vec<DisplayField>);

impl DisplayFields {
    fn list(mut self, label: &'static str, section: DisplaySection, items: &[String]) -> Self {
        if !items.is_empty() {
            self.0.push(DisplayField {
                label,
                section,
                value: DisplayValue::List(items.to_vec()),
            });
        }
        self
    }

    fn text(mut self, label: &'static str, section: DisplaySection, text: Option<&str>) -> Self {
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.0.push(DisplayField {
                label,
                section,
                value: DisplayValue::Text(text.to_string()),
            });
        }
        self
    }
}

/// One package from one source.
#[derive(Debug, Clone)]
pub struct Package {
    urn: Urn,
    pub title: String,
    pub short_title: Option<String>,
    pub publisher_id: String,
    pub developer_name: String,
    pub release_date: Option<DateTime<Utc>>,
    pub description: String,
    pub version: String,
    /// `None` means "no price", not free.
    pub price: Option<f64>,
    pub display_price: Option<String>,
    pub website: Option<String>,
    pub images: Vec<ImageDescriptor>,
    /// Mean star rating, when the source reports one.
    pub average_rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub review_summary: Option<ReviewSummary>,
    status: PackageStatus,
    artifact: Option<Artifact>,
    details: SourceDetails,
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.urn == other.urn
    }
}

impl Eq for Package {}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)
    }
}

impl Package {
    /// A fresh record in [`PackageStatus::Unknown`] with no artifact.
    pub fn new(urn: Urn, title: impl Into<String>, details: SourceDetails) -> Self {
        Self {
            urn,
            title: title.into(),
            short_title: None,
            publisher_id: String::new(),
            developer_name: String::new(),
            release_date: None,
            description: String::new(),
            version: String::new(),
            price: None,
            display_price: None,
            website: None,
            images: Vec::new(),
            average_rating: None,
            rating_count: None,
            review_summary: None,
            status: PackageStatus::Unknown,
            artifact: None,
            details,
        }
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Current lifecycle status.
    pub fn status(&self) -> PackageStatus {
        self.status
    }

    /// Move the status forward. Returns `false` (and changes nothing) when
    /// `next` is not ahead of the current status.
    pub fn advance(&mut self, next: PackageStatus) -> bool {
        self.status.advance(next)
    }

    /// Whether the source reported a mean rating.
    pub fn has_average_rating(&self) -> bool {
        self.average_rating.is_some()
    }

    /// Whether a non-empty review summary is attached.
    pub fn has_review_summary(&self) -> bool {
        self.review_summary
            .as_ref()
            .is_some_and(|r| *r != ReviewSummary::default())
    }

    /// Short title, falling back to the full title.
    pub fn short_title(&self) -> &str {
        self.short_title.as_deref().unwrap_or(&self.title)
    }

    pub fn details(&self) -> &SourceDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut SourceDetails {
        &mut self.details
    }

    /// The downloaded installer currently bound to this record.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Bind a new artifact, returning the one it replaces. The previous
    /// artifact is no longer valid for this record.
    pub fn replace_artifact(&mut self, artifact: Artifact) -> Option<Artifact> {
        self.artifact.replace(artifact)
    }

    /// Concrete URL the installer can be fetched from, once resolved.
    pub fn download_url(&self) -> Option<&str> {
        match &self.details {
            SourceDetails::MsStore(d) => d.package_uri.as_deref(),
            SourceDetails::Choco(d) => d.download_url.as_deref(),
        }
    }

    /// Whether a download URL has been resolved.
    pub fn has_download_location(&self) -> bool {
        self.download_url().is_some()
    }

    /// Digest the downloaded bytes must match, when the source publishes one.
    pub fn expected_sha256(&self) -> Option<&str> {
        match &self.details {
            SourceDetails::MsStore(_) => None,
            SourceDetails::Choco(d) => d.sha256.as_deref(),
        }
    }

    /// File name (without extension) used for the downloaded installer.
    pub fn artifact_stem(&self) -> String {
        let stem = match &self.details {
            SourceDetails::MsStore(d) => d
                .package_moniker
                .clone()
                .unwrap_or_else(|| d.store_id.clone()),
            SourceDetails::Choco(d) => format!("{}.{}", d.package_id, self.version),
        };
        stem.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Whether platform eligibility can only be decided once the installer
    /// is on disk (the architecture lives in the installer manifest).
    pub fn requires_download_for_compat_check(&self) -> bool {
        match &self.details {
            SourceDetails::MsStore(d) => d.architectures.is_none(),
            SourceDetails::Choco(_) => false,
        }
    }

    /// `None` means no platform restriction is known.
    pub fn allowed_platforms(&self) -> Option<&[Platform]> {
        match &self.details {
            SourceDetails::MsStore(d) => d.allowed_platforms.as_deref(),
            SourceDetails::Choco(_) => None,
        }
    }

    /// `None` means the architectures are not known yet.
    pub fn architectures(&self) -> Option<&[Arch]> {
        match &self.details {
            SourceDetails::MsStore(d) => d.architectures.as_deref(),
            SourceDetails::Choco(_) => None,
        }
    }

    /// Record architectures discovered from the installer manifest.
    pub fn set_architectures(&mut self, architectures: Vec<Arch>) {
        if let SourceDetails::MsStore(d) = &mut self.details {
            d.architectures = Some(architectures);
        }
    }

    /// Identity the OS uses for installed applications.
    pub fn package_family_name(&self) -> Option<&str> {
        match &self.details {
            SourceDetails::MsStore(d) => d.package_family_name.as_deref(),
            SourceDetails::Choco(d) => Some(d.package_id.as_str()),
        }
    }

    /// Fields this package's source exposes for generic display.
    pub fn display_fields(&self) -> Vec<DisplayField> {
        use DisplaySection::{AdditionalInfo, Primary};

        let fields = match &self.details {
            SourceDetails::MsStore(d) => DisplayFields::default()
                .list("Warnings", Primary, &d.warnings)
                .list("Notes", Primary, &d.notes)
                .list("Features", Primary, &d.features)
                .list("Categories", Primary, &d.categories)
                .text("Privacy url", AdditionalInfo, d.privacy_url.as_deref())
                .list("Permissions", AdditionalInfo, &d.permissions),
            SourceDetails::Choco(d) => DisplayFields::default()
                .list("Authors", Primary, &d.authors)
                .list("Tags", Primary, &d.tags)
                .text("Project url", AdditionalInfo, d.project_url.as_deref())
                .text("License url", AdditionalInfo, d.license_url.as_deref()),
        };
        fields.0
    }

    /// Best image to use as the app icon.
    pub fn app_icon(&self) -> Option<&ImageDescriptor> {
        images::app_icon(&self.images)
    }

    pub fn hero_image(&self) -> Option<&ImageDescriptor> {
        images::hero_image(&self.images)
    }

    pub fn screenshots(&self, device_family: &str) -> Vec<&ImageDescriptor> {
        images::screenshots(&self.images, device_family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_package() -> Package {
        let urn = Urn::parse("urn:msstore:9NBLGGH4R315").unwrap();
        Package::new(
            urn,
            "Sample App",
            SourceDetails::MsStore(StoreDetails {
                store_id: "9NBLGGH4R315".to_string(),
                features: vec!["Offline mode".to_string()],
                privacy_url: Some("https://example.com/privacy".to_string()),
                ..StoreDetails::default()
            }),
        )
    }

    #[test]
    fn test_new_record_is_unknown_without_artifact() {
        let pkg = store_package();
        assert_eq!(pkg.status(), PackageStatus::Unknown);
        assert!(pkg.artifact().is_none());
        assert!(!pkg.has_download_location());
        assert_eq!(pkg.short_title(), "Sample App");
        assert!(pkg.price.is_none());
    }

    #[test]
    fn test_status_never_moves_backwards() {
        let mut pkg = store_package();
        assert!(pkg.advance(PackageStatus::None));
        assert!(pkg.advance(PackageStatus::Downloaded));
        assert!(!pkg.advance(PackageStatus::DownloadReady));
        assert_eq!(pkg.status(), PackageStatus::Downloaded);
    }

    #[test]
    fn test_replace_artifact_returns_previous() {
        let mut pkg = store_package();
        let first = Artifact {
            path: PathBuf::from("a.msix"),
            installer_type: InstallerType::MSIX,
            type_inferred: false,
            size: 1,
            sha256: "aa".to_string(),
        };
        let second = Artifact {
            path: PathBuf::from("b.msix"),
            ..first.clone()
        };
        assert!(pkg.replace_artifact(first.clone()).is_none());
        assert_eq!(pkg.replace_artifact(second.clone()), Some(first));
        assert_eq!(pkg.artifact(), Some(&second));
    }

    #[test]
    fn test_store_compat_requires_download_until_architectures_known() {
        let mut pkg = store_package();
        assert!(pkg.requires_download_for_compat_check());
        pkg.set_architectures(vec![Arch::X64]);
        assert!(!pkg.requires_download_for_compat_check());
        assert_eq!(pkg.architectures(), Some(&[Arch::X64][..]));
    }

    #[test]
    fn test_display_fields_skip_empty_values() {
        let pkg = store_package();
        let labels: Vec<_> = pkg.display_fields().iter().map(|f| f.label).collect();
        assert_eq!(labels, ["Features", "Privacy url"]);
    }

    #[test]
    fn test_store_warnings_are_shown_first() {
        let mut pkg = store_package();
        if let SourceDetails::MsStore(d) = pkg.details_mut() {
            d.warnings = vec!["Rated 18+".to_string()];
        }
        let fields = pkg.display_fields();
        assert_eq!(fields[0].label, "Warnings");
        assert_eq!(fields[0].section, DisplaySection::Primary);
        assert_eq!(fields[0].value, DisplayValue::List(vec!["Rated 18+".to_string()]));
    }

    #[test]
    fn test_rating_presence() {
        let mut pkg = store_package();
        assert!(!pkg.has_average_rating());
        assert!(!pkg.has_review_summary());

        pkg.average_rating = Some(4.5);
        pkg.review_summary = Some(ReviewSummary::default());
        assert!(pkg.has_average_rating());
        // An all-zero summary carries nothing to show.
        assert!(!pkg.has_review_summary());

        pkg.review_summary = Some(ReviewSummary {
            average_rating: 4.5,
            review_count: 2,
            star_counts: [0, 0, 0, 1, 1],
        });
        assert!(pkg.has_review_summary());
    }

    #[test]
    fn test_artifact_stem_is_filesystem_safe() {
        let urn = Urn::parse("urn:choco:git:2.45.1").unwrap();
        let mut pkg = Package::new(
            urn,
            "Git",
            SourceDetails::Choco(ChocoDetails {
                package_id: "git/x".to_string(),
                ..ChocoDetails::default()
            }),
        );
        pkg.version = "2.45.1".to_string();
        assert_eq!(pkg.artifact_stem(), "git_x.2.45.1");
    }

    #[test]
    fn test_equality_follows_urn() {
        let a = store_package();
        let mut b = store_package();
        b.title = "Renamed".to_string();
        assert_eq!(a, b);
    }
}
