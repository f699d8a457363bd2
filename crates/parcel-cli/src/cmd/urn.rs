//! Urn command

use anyhow::Result;
use crossterm::style::Stylize;
use parcel_schema::Urn;

/// Parse a reference and print it with its parts.
pub fn urn(text: &str) -> Result<()> {
    let urn = Urn::parse(text)?;
    let lw = 12;

    println!("{urn}");
    println!("  {:<lw$}{}", "namespace".dark_grey(), urn.namespace());
    println!("  {:<lw$}{}", "id".dark_grey(), urn.id());
    if let (id, Some(version)) = urn.split_version() {
        println!("  {:<lw$}{id} @ {version}", "candidate".dark_grey());
    }
    Ok(())
}
