//! Image descriptors attached to package records.

use serde::{Deserialize, Serialize};

/// Role an image plays on a package page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Logo,
    Tile,
    Poster,
    Hero,
    Screenshot,
    /// A glyph rendered from text (handler badges).
    Text,
}

/// A reference to one image variant. The bytes are never fetched by the
/// core; rendering is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub kind: ImageKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub background_color: Option<String>,
    /// Device family and slot, e.g. `Desktop/2`.
    #[serde(default)]
    pub position: Option<String>,
}

impl ImageDescriptor {
    pub fn remote(kind: ImageKind, url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            kind,
            url: Some(url.into()),
            text: None,
            width,
            height,
            background_color: None,
            position: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ImageKind::Text,
            url: None,
            text: Some(text.into()),
            width: 0,
            height: 0,
            background_color: None,
            position: None,
        }
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Slot number for `family` (`Desktop/2` -> `Some(2)`), if this image
    /// belongs to that device family.
    fn slot_for(&self, family: &str) -> Option<usize> {
        let rest = self.position.as_deref()?.strip_prefix(family)?;
        rest.strip_prefix('/')?.parse().ok()
    }
}

/// Best icon: tiles first, then logos, then posters; widest wins.
pub fn app_icon(images: &[ImageDescriptor]) -> Option<&ImageDescriptor> {
    [ImageKind::Tile, ImageKind::Logo, ImageKind::Poster]
        .into_iter()
        .find_map(|kind| widest(images, kind))
}

/// Widest hero image.
pub fn hero_image(images: &[ImageDescriptor]) -> Option<&ImageDescriptor> {
    widest(images, ImageKind::Hero)
}

/// Screenshots for one device family, ordered by slot.
pub fn screenshots<'a>(images: &'a [ImageDescriptor], family: &str) -> Vec<&'a ImageDescriptor> {
    let mut shots: Vec<(usize, &ImageDescriptor)> = images
        .iter()
        .filter(|i| i.kind == ImageKind::Screenshot)
        .filter_map(|i| i.slot_for(family).map(|slot| (slot, i)))
        .collect();
    shots.sort_by_key(|(slot, _)| *slot);
    shots.into_iter().map(|(_, i)| i).collect()
}

fn widest(images: &[ImageDescriptor], kind: ImageKind) -> Option<&ImageDescriptor> {
    images
        .iter()
        .filter(|i| i.kind == kind)
        .max_by_key(|i| i.width)
}
