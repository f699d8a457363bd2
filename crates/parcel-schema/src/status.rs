//! Package lifecycle status.

/// Where a package record stands in the acquisition lifecycle.
///
/// The variants are ordered: a record only ever moves forward through
/// `Unknown -> None -> DownloadReady -> Downloaded -> Installed`. There is no
/// failed state; a failed step leaves the status where it was.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    /// Not yet initialized.
    #[default]
    Unknown,
    /// Metadata known, no download location resolved.
    None,
    /// A concrete download location has been resolved.
    DownloadReady,
    /// The installer artifact is on disk.
    Downloaded,
    /// The package has been registered with the OS.
    Installed,
}

impl PackageStatus {
    /// Move to `next` if it is further along than `self`.
    ///
    /// Returns `true` when the status changed.
    pub fn advance(&mut self, next: Self) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }

    /// Lowercase label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::None => "none",
            Self::DownloadReady => "download ready",
            Self::Downloaded => "downloaded",
            Self::Installed => "installed",
        }
    }
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
