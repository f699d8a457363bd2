//! Search and featured commands

use std::path::Path;

use anyhow::Result;
use crossterm::style::Stylize;
use parcel_core::handler::Aggregate;

use crate::context::Context;

/// Search every source that supports it.
pub async fn search(catalog: Option<&Path>, query: &str) -> Result<()> {
    let start = std::time::Instant::now();
    let ctx = Context::load(catalog)?;
    let results = ctx.registry().search(query).await;

    if results.packages.is_empty() && results.warnings.is_empty() {
        println!();
        println!("  No packages found matching '{}'", query.white());
        println!();
        return Ok(());
    }
    print_aggregate(&results);

    println!();
    println!(
        "SEARCH COMPLETE {}, elapsed {:.2}s",
        results.packages.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Quick suggestions for a partial query.
pub async fn suggest(catalog: Option<&Path>, query: &str) -> Result<()> {
    let ctx = Context::load(catalog)?;
    let results = ctx.registry().search_suggestions(query).await;
    print_aggregate(&results);
    Ok(())
}

/// List featured packages of every source that has a featured list.
pub async fn featured(catalog: Option<&Path>) -> Result<()> {
    let ctx = Context::load(catalog)?;
    let results = ctx.registry().featured().await;
    print_aggregate(&results);
    Ok(())
}

fn print_aggregate(results: &Aggregate) {
    println!();
    for package in &results.packages {
        println!(
            "  {:<40} {:<12} {}",
            package.urn().to_string(),
            package.version.as_str().dark_grey(),
            package.short_title()
        );
    }
    for warning in &results.warnings {
        eprintln!(
            "  {} {}: {}",
            "warning".yellow(),
            warning.namespace,
            warning.message
        );
    }
}
