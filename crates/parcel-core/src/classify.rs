//! Installer payload sniffing.
//!
//! Classification looks at the first four bytes of the payload (big-endian)
//! and, for zip archives, at the `Default` entries of `[Content_Types].xml`:
//!
//! | Magic        | Result                                    |
//! |--------------|-------------------------------------------|
//! | `0x504B0304` | zip; flags from the content types         |
//! | `0x45584248` | [`InstallerType::ENCRYPTED_BUNDLE`]       |
//! | anything else| [`InstallerType::UNKNOWN`]                |
//!
//! The same archive metadata also declares which processor architectures an
//! installer targets; [`manifest_architectures`] extracts them.

use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use parcel_schema::{Arch, ENCRYPTED_BUNDLE_MAGIC, InstallerType, ZIP_MAGIC};
use roxmltree::{Document, Node};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};

const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
const PACKAGE_MANIFEST_ENTRY: &str = "AppxManifest.xml";
const BUNDLE_MANIFEST_ENTRY: &str = "AppxMetadata/AppxBundleManifest.xml";
const BUNDLE_MANIFEST_CONTENT_TYPE: &str = "application/vnd.ms-appx.bundlemanifest+xml";

/// What sniffing a payload concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: InstallerType,
    /// The archive declared no recognizable content type and `kind` is a
    /// best-effort guess.
    pub inferred: bool,
}

impl Classification {
    fn declared(kind: InstallerType) -> Self {
        Self {
            kind,
            inferred: false,
        }
    }
}

/// Classify an installer payload.
///
/// # Errors
///
/// [`Error::MalformedInstaller`] when the stream is shorter than four bytes,
/// or when a zip payload is unreadable or lacks `[Content_Types].xml`.
pub fn classify<R: Read + Seek>(reader: R) -> Result<InstallerType> {
    inspect(reader).map(|c| c.kind)
}

/// [`classify`], also reporting whether the result was guessed.
pub fn inspect<R: Read + Seek>(mut reader: R) -> Result<Classification> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|e| match e.kind() {
        IoErrorKind::UnexpectedEof => {
            Error::MalformedInstaller("payload is shorter than 4 bytes".to_string())
        }
        _ => Error::Io(e),
    })?;

    match u32::from_be_bytes(magic) {
        ZIP_MAGIC => {
            reader.seek(SeekFrom::Start(0))?;
            classify_archive(reader)
        }
        ENCRYPTED_BUNDLE_MAGIC => {
            debug!("Encrypted bundle magic, skipping inspection");
            Ok(Classification::declared(InstallerType::ENCRYPTED_BUNDLE))
        }
        other => {
            debug!(magic = %format!("{other:#010x}"), "Unrecognized installer magic");
            Ok(Classification::declared(InstallerType::UNKNOWN))
        }
    }
}

/// Classify a file on disk without blocking the async runtime.
pub async fn classify_file(path: &Path) -> Result<InstallerType> {
    inspect_file(path).await.map(|c| c.kind)
}

/// [`inspect`] for a file on disk.
pub async fn inspect_file(path: &Path) -> Result<Classification> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || inspect(std::fs::File::open(path)?))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn classify_archive<R: Read + Seek>(reader: R) -> Result<Classification> {
    let mut archive = ZipArchive::new(reader)?;
    let content_types = read_entry(&mut archive, CONTENT_TYPES_ENTRY)?;
    let doc = parse_xml(CONTENT_TYPES_ENTRY, &content_types)?;

    let mut kind = InstallerType::UNKNOWN;
    for default in children(doc.root_element(), "Default") {
        match default.attribute("Extension") {
            Some(ext) if ext.eq_ignore_ascii_case("msix") => kind |= InstallerType::MSIX,
            Some(ext) if ext.eq_ignore_ascii_case("appx") => kind |= InstallerType::APPX,
            _ => {}
        }
        if default.attribute("ContentType") == Some(BUNDLE_MANIFEST_CONTENT_TYPE) {
            kind |= InstallerType::BUNDLE;
        }
    }

    if kind.is_unknown() {
        debug!("No recognizable content types, guessing {}", InstallerType::APPX_BUNDLE);
        return Ok(Classification {
            kind: InstallerType::APPX_BUNDLE,
            inferred: true,
        });
    }
    debug!(%kind, "Classified installer archive");
    Ok(Classification::declared(kind))
}

/// Architectures declared by the manifest inside a package archive.
///
/// Single packages declare one `Identity@ProcessorArchitecture` (absent
/// means neutral); bundles list every contained `Package@Architecture`.
/// Unrecognized names are skipped.
///
/// # Errors
///
/// [`Error::MalformedInstaller`] when the archive or its manifest is
/// missing or unreadable.
pub fn manifest_architectures<R: Read + Seek>(reader: R, is_bundle: bool) -> Result<Vec<Arch>> {
    let mut archive = ZipArchive::new(reader)?;
    let entry = if is_bundle {
        BUNDLE_MANIFEST_ENTRY
    } else {
        PACKAGE_MANIFEST_ENTRY
    };
    let manifest = read_entry(&mut archive, entry)?;
    architectures_in(entry, &manifest, is_bundle)
}

/// Architectures from whichever manifest the archive carries, bundle first.
///
/// For payloads whose type was only guessed. `None` when the archive has
/// neither manifest.
pub fn discover_architectures<R: Read + Seek>(reader: R) -> Result<Option<Vec<Arch>>> {
    let mut archive = ZipArchive::new(reader)?;
    for (entry, is_bundle) in [(BUNDLE_MANIFEST_ENTRY, true), (PACKAGE_MANIFEST_ENTRY, false)] {
        if archive.index_for_name(entry).is_some() {
            let manifest = read_entry(&mut archive, entry)?;
            return architectures_in(entry, &manifest, is_bundle).map(Some);
        }
    }
    Ok(None)
}

/// [`manifest_architectures`] for a file on disk.
pub async fn manifest_architectures_of(path: &Path, is_bundle: bool) -> Result<Vec<Arch>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        manifest_architectures(std::fs::File::open(path)?, is_bundle)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

/// [`discover_architectures`] for a file on disk.
pub async fn discover_architectures_of(path: &Path) -> Result<Option<Vec<Arch>>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || discover_architectures(std::fs::File::open(path)?))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn architectures_in(entry: &str, manifest: &str, is_bundle: bool) -> Result<Vec<Arch>> {
    let doc = parse_xml(entry, manifest)?;
    let root = doc.root_element();

    let declared: Vec<Option<&str>> = if is_bundle {
        children(root, "Packages")
            .flat_map(|packages| children(packages, "Package"))
            .map(|package| package.attribute("Architecture"))
            .collect()
    } else {
        children(root, "Identity")
            .take(1)
            .map(|identity| identity.attribute("ProcessorArchitecture"))
            .collect()
    };

    let mut archs = Vec::new();
    for name in declared {
        let arch = match name {
            Some(name) => match name.parse::<Arch>() {
                Ok(arch) => arch,
                Err(e) => {
                    debug!("{e}");
                    continue;
                }
            },
            None if !is_bundle => Arch::Neutral,
            None => continue,
        };
        if !archs.contains(&arch) {
            archs.push(arch);
        }
    }
    Ok(archs)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(Error::MalformedInstaller(format!("archive has no {name}")));
        }
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| Error::MalformedInstaller(format!("{name}: {e}")))?;
    Ok(text)
}

fn parse_xml<'a>(name: &str, text: &'a str) -> Result<Document<'a>> {
    Document::parse(text.trim_start_matches('\u{feff}'))
        .map_err(|e| Error::MalformedInstaller(format!("{name}: {e}")))
}

/// Element children of `parent` with the given local name.
fn children<'a, 'input: 'a>(
    parent: Node<'a, 'input>,
    local_name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    parent
        .children()
        .filter(move |n| n.is_element() && n.tag_name().name() == local_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    fn content_types(defaults: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">{defaults}</Types>"#
        )
    }

    #[test]
    fn test_msix_package() {
        let types = content_types(
            r#"<Default Extension="msix" ContentType="application/vnd.ms-appx"/>
               <Default Extension="xml" ContentType="application/vnd.ms-appx.manifest+xml"/>"#,
        );
        let kind = classify(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert!(kind.contains(InstallerType::MSIX));
        assert!(!kind.is_bundle());
    }

    #[test]
    fn test_appx_bundle() {
        let types = content_types(
            r#"<Default Extension="appx" ContentType="application/vnd.ms-appx"/>
               <Default Extension="xml" ContentType="application/vnd.ms-appx.bundlemanifest+xml"/>"#,
        );
        let kind = classify(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert_eq!(kind, InstallerType::APPX_BUNDLE);
        assert_eq!(kind.extension(), ".appxbundle");
    }

    #[test]
    fn test_unrecognized_archive_falls_back_to_appx_bundle() {
        let types = content_types(r#"<Default Extension="png" ContentType="image/png"/>"#);
        let kind = classify(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert_eq!(kind, InstallerType::APPX_BUNDLE);
    }

    #[test]
    fn test_fallback_is_marked_inferred() {
        let types = content_types(r#"<Default Extension="png" ContentType="image/png"/>"#);
        let guessed = inspect(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert!(guessed.inferred);

        let types = content_types(r#"<Default Extension="msix" ContentType="application/vnd.ms-appx"/>"#);
        let declared = inspect(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert!(!declared.inferred);
    }

    #[test]
    fn test_commented_out_entries_are_ignored() {
        let types = content_types(
            r#"<!-- <Default Extension="msix" ContentType="application/vnd.ms-appx"/> -->
               <Default Extension="appx" ContentType="application/vnd.ms-appx"/>"#,
        );
        let kind = classify(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert_eq!(kind, InstallerType::APPX);
    }

    #[test]
    fn test_attribute_entities_are_decoded() {
        let types = content_types(
            r#"<Default Extension="appx" ContentType="application/vnd.ms-appx"/>
               <Default Extension="xml" ContentType="application/vnd.ms-appx.bundlemanifest&#43;xml"/>"#,
        );
        let kind = classify(archive(&[(CONTENT_TYPES_ENTRY, &types)])).unwrap();
        assert_eq!(kind, InstallerType::APPX_BUNDLE);
    }

    #[test]
    fn test_malformed_content_types_xml() {
        let err = classify(archive(&[(CONTENT_TYPES_ENTRY, "<Types><Default")])).unwrap_err();
        assert!(matches!(err, Error::MalformedInstaller(_)));
    }

    #[test]
    fn test_archive_without_content_types_is_malformed() {
        let err = classify(archive(&[("readme.txt", "hi")])).unwrap_err();
        assert!(matches!(err, Error::MalformedInstaller(_)));
    }

    #[test]
    fn test_encrypted_and_unknown_magic() {
        let encrypted = Cursor::new(b"EXBH and then some".to_vec());
        assert_eq!(classify(encrypted).unwrap(), InstallerType::ENCRYPTED_BUNDLE);

        let exe = Cursor::new(b"MZ\x90\x00rest".to_vec());
        assert_eq!(classify(exe).unwrap(), InstallerType::UNKNOWN);
    }

    #[test]
    fn test_short_stream_is_malformed() {
        let err = classify(Cursor::new(vec![0x50, 0x4B])).unwrap_err();
        assert!(matches!(err, Error::MalformedInstaller(_)));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let types = content_types(r#"<Default Extension="msix" ContentType="application/vnd.ms-appx"/>"#);
        let bytes = archive(&[(CONTENT_TYPES_ENTRY, &types)]).into_inner();
        let first = classify(Cursor::new(bytes.clone())).unwrap();
        let second = classify(Cursor::new(bytes)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_package_manifest_architecture() {
        let manifest = r#"<Package xmlns="http://schemas.microsoft.com/appx/manifest/foundation/windows10">
  <Identity Name="Sample" Publisher="CN=Sample" Version="1.0.0.0" ProcessorArchitecture="arm64" />
</Package>"#;
        let archs =
            manifest_architectures(archive(&[(PACKAGE_MANIFEST_ENTRY, manifest)]), false).unwrap();
        assert_eq!(archs, [Arch::Arm64]);

        let neutral = r#"<Package><Identity Name="Sample" Version="1.0.0.0"/></Package>"#;
        let archs =
            manifest_architectures(archive(&[(PACKAGE_MANIFEST_ENTRY, neutral)]), false).unwrap();
        assert_eq!(archs, [Arch::Neutral]);
    }

    #[test]
    fn test_bundle_manifest_architectures() {
        let manifest = r#"<Bundle xmlns="http://schemas.microsoft.com/appx/2013/bundle">
  <Identity Name="Sample" Version="1.0.0.0" />
  <Packages>
    <Package Type="application" Architecture="x64" FileName="a.msix" />
    <Package Type="application" Architecture="x86" FileName="b.msix" />
    <Package Type="resource" Architecture="x64" FileName="c.msix" />
  </Packages>
</Bundle>"#;
        let archs =
            manifest_architectures(archive(&[(BUNDLE_MANIFEST_ENTRY, manifest)]), true).unwrap();
        assert_eq!(archs, [Arch::X64, Arch::X86]);
    }

    #[test]
    fn test_discover_prefers_bundle_then_package_manifest() {
        let bundle = r#"<Bundle><Packages><Package Architecture="arm64"/></Packages></Bundle>"#;
        let package = r#"<Package><Identity Name="Sample" ProcessorArchitecture="x86"/></Package>"#;

        let both = archive(&[(BUNDLE_MANIFEST_ENTRY, bundle), (PACKAGE_MANIFEST_ENTRY, package)]);
        assert_eq!(discover_architectures(both).unwrap(), Some(vec![Arch::Arm64]));

        let single = archive(&[(PACKAGE_MANIFEST_ENTRY, package)]);
        assert_eq!(discover_architectures(single).unwrap(), Some(vec![Arch::X86]));

        let neither = archive(&[(CONTENT_TYPES_ENTRY, "<Types/>")]);
        assert_eq!(discover_architectures(neither).unwrap(), None);
    }

    #[test]
    fn test_missing_manifest_is_malformed() {
        let err = manifest_architectures(archive(&[("x", "y")]), true).unwrap_err();
        assert!(matches!(err, Error::MalformedInstaller(_)));
    }
}
