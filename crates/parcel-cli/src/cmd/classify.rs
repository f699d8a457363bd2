//! Classify command

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use parcel_core::classify::{discover_architectures_of, inspect_file, manifest_architectures_of};
use parcel_schema::InstallerType;

/// Sniff an installer on disk and print its type, extension and declared
/// architectures.
pub async fn classify(file: &Path) -> Result<()> {
    let classification = inspect_file(file)
        .await
        .with_context(|| format!("Failed to classify {}", file.display()))?;
    let kind = classification.kind;
    let lw = 12;

    if classification.inferred {
        println!("  {:<lw$}{kind} {}", "type".dark_grey(), "(guessed)".yellow());
    } else {
        println!("  {:<lw$}{kind}", "type".dark_grey());
    }
    if !kind.extension().is_empty() {
        println!("  {:<lw$}{}", "extension".dark_grey(), kind.extension());
    }

    if kind.is_unknown() || kind.contains(InstallerType::ENCRYPTED) {
        return Ok(());
    }
    let archs = if classification.inferred {
        discover_architectures_of(file).await.map(Option::unwrap_or_default)
    } else {
        manifest_architectures_of(file, kind.is_bundle()).await
    };
    match archs {
        Ok(archs) if !archs.is_empty() => {
            let names: Vec<_> = archs.iter().map(ToString::to_string).collect();
            println!("  {:<lw$}{}", "arch".dark_grey(), names.join(", "));
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("No manifest architectures: {e}"),
    }
    Ok(())
}
