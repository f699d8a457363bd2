//! Installer payload classification flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Classification of a downloaded installer payload.
///
/// This is a bit set: an archive can contain single packages of a given
/// kind *and* be a bundle at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct InstallerType(u8);

impl InstallerType {
    /// Nothing recognizable.
    pub const UNKNOWN: Self = Self(0);
    /// Archive declaring `.msix` content.
    pub const MSIX: Self = Self(1);
    /// Archive declaring `.appx` content.
    pub const APPX: Self = Self(1 << 1);
    /// Multi-package container.
    pub const BUNDLE: Self = Self(1 << 2);
    /// Encrypted payload that cannot be introspected.
    pub const ENCRYPTED: Self = Self(1 << 3);

    /// `.msixbundle`
    pub const MSIX_BUNDLE: Self = Self(Self::MSIX.0 | Self::BUNDLE.0);
    /// `.appxbundle`
    pub const APPX_BUNDLE: Self = Self(Self::APPX.0 | Self::BUNDLE.0);
    /// Encrypted bundle (`.eappxbundle` / `.emsixbundle`).
    pub const ENCRYPTED_BUNDLE: Self = Self(Self::ENCRYPTED.0 | Self::BUNDLE.0);

    /// Raw flag bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// Whether the payload is a multi-package bundle.
    pub const fn is_bundle(self) -> bool {
        self.contains(Self::BUNDLE)
    }

    /// File extension (with leading dot) that makes the payload's type
    /// discoverable by downstream tooling, or `""` when unknown.
    pub fn extension(self) -> &'static str {
        if self.contains(Self::ENCRYPTED) {
            ".eappxbundle"
        } else if self.contains(Self::MSIX_BUNDLE) {
            ".msixbundle"
        } else if self.is_bundle() {
            ".appxbundle"
        } else if self.contains(Self::MSIX) {
            ".msix"
        } else if self.contains(Self::APPX) {
            ".appx"
        } else {
            ""
        }
    }
}

impl BitOr for InstallerType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InstallerType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for InstallerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "unknown");
        }
        let names = [
            (Self::MSIX, "msix"),
            (Self::APPX, "appx"),
            (Self::BUNDLE, "bundle"),
            (Self::ENCRYPTED, "encrypted"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", set.join("|"))
    }
}
