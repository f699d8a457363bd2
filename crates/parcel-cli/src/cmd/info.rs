//! Info command

use std::path::Path;

use anyhow::Result;
use crossterm::style::Stylize;
use parcel_core::package::{DisplaySection, DisplayValue};
use parcel_core::Package;

use crate::context::Context;

/// Show details of one package.
pub async fn info(catalog: Option<&Path>, input: &str, json: bool) -> Result<()> {
    let ctx = Context::load(catalog)?;
    let package = ctx.resolve(input).await?;
    let url = ctx.registry().url_for(&package).ok();

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&package, url.as_ref()))?);
        return Ok(());
    }

    let lw = 14;
    println!();
    println!(
        "  {} {}",
        package.title.as_str().white().bold(),
        package.version.as_str().dark_grey()
    );
    if !package.description.is_empty() {
        println!("  {}", package.description);
    }
    println!();
    println!("  {:<lw$}{}", "urn", package.urn());
    if !package.developer_name.is_empty() {
        println!("  {:<lw$}{}", "developer", package.developer_name);
    }
    if let Some(price) = &package.display_price {
        println!("  {:<lw$}{price}", "price");
    }
    if let Some(rating) = package.average_rating {
        match package.rating_count {
            Some(count) => println!("  {:<lw$}{rating:.1} ({count} ratings)", "rating"),
            None => println!("  {:<lw$}{rating:.1}", "rating"),
        }
    }
    if let Some(date) = package.release_date {
        println!("  {:<lw$}{}", "released", date.format("%Y-%m-%d"));
    }
    if let Some(website) = &package.website {
        println!("  {:<lw$}{website}", "website");
    }
    if let Some(url) = &url {
        println!("  {:<lw$}{url}", "page");
    }
    println!("  {:<lw$}{}", "status", package.status());

    for section in [DisplaySection::Primary, DisplaySection::AdditionalInfo] {
        for field in package.display_fields().into_iter().filter(|f| f.section == section) {
            let value = match field.value {
                DisplayValue::Text(text) => text,
                DisplayValue::List(items) => items.join(", "),
            };
            println!("  {:<lw$}{value}", field.label.to_lowercase());
        }
    }
    println!();
    Ok(())
}

fn to_json(package: &Package, url: Option<&reqwest::Url>) -> serde_json::Value {
    serde_json::json!({
        "urn": package.urn(),
        "title": package.title,
        "short_title": package.short_title(),
        "publisher_id": package.publisher_id,
        "developer": package.developer_name,
        "version": package.version,
        "description": package.description,
        "price": package.price,
        "display_price": package.display_price,
        "release_date": package.release_date,
        "website": package.website,
        "page": url.map(reqwest::Url::as_str),
        "average_rating": package.average_rating,
        "rating_count": package.rating_count,
        "review_summary": package.review_summary,
        "status": package.status(),
        "icon": package.app_icon(),
    })
}
