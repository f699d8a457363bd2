//! Download, install and launch commands

use std::path::Path;

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use parcel_core::{EventFilter, Package};
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::ui::EventPrinter;

/// Which orchestrator step a command drives.
#[derive(Debug, Clone, Copy)]
enum Step {
    Download,
    Install,
}

pub async fn download(catalog: Option<&Path>, input: &str, quiet: bool) -> Result<()> {
    run(catalog, input, quiet, Step::Download).await
}

pub async fn install(catalog: Option<&Path>, input: &str, quiet: bool) -> Result<()> {
    run(catalog, input, quiet, Step::Install).await
}

async fn run(catalog: Option<&Path>, input: &str, quiet: bool, step: Step) -> Result<()> {
    let ctx = Context::load(catalog)?;
    let mut package = ctx.resolve(input).await?;

    let printer = (!quiet)
        .then(|| EventPrinter::spawn(ctx.orchestrator.bus().subscribe(EventFilter::All)));

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let result = match step {
        Step::Download => ctx
            .orchestrator
            .download(&mut package, &cancel)
            .await
            .map(|_| ()),
        Step::Install => ctx.orchestrator.install(&mut package, &cancel).await,
    };
    watcher.abort();

    // The printer exits once the bus and its subscription are dropped.
    drop(ctx);
    if let Some(printer) = printer {
        printer.finish().await;
    }

    result?;
    if quiet {
        print_outcome(&package, step);
    }
    Ok(())
}

fn print_outcome(package: &Package, step: Step) {
    match (step, package.artifact()) {
        (Step::Download, Some(artifact)) => println!("{}", artifact.path.display()),
        _ => println!("{} {}", package.urn(), package.status()),
    }
}

pub async fn launch(catalog: Option<&Path>, input: &str) -> Result<()> {
    let ctx = Context::load(catalog)?;
    let package = ctx.resolve(input).await?;

    if !ctx.orchestrator.launch(&package).await? {
        bail!("Failed to launch {}", package.title);
    }
    println!("  {} {}", "launched".green(), package.title);
    Ok(())
}
