//! Prints lifecycle events from the bus as they arrive.

use crossterm::style::Stylize;
use parcel_core::{PackageEvent, Subscription};
use tokio::task::JoinHandle;

use super::format_size;

/// Background task draining a subscription to stdout.
#[derive(Debug)]
pub struct EventPrinter {
    handle: JoinHandle<()>,
}

impl EventPrinter {
    pub fn spawn(subscription: Subscription) -> Self {
        Self {
            handle: tokio::spawn(print_events(subscription)),
        }
    }

    /// Wait until the bus is gone and every queued event is printed.
    pub async fn finish(self) {
        self.handle.await.ok();
    }
}

async fn print_events(mut subscription: Subscription) {
    let mut last_decile = None;
    while let Some(event) = subscription.recv().await {
        if let PackageEvent::DownloadProgress {
            received, total, ..
        } = &event
        {
            // One line per 10% when the size is known.
            let decile = total
                .filter(|t| *t > 0)
                .map(|t| received.saturating_mul(10) / t);
            if decile.is_some() && decile == last_decile {
                continue;
            }
            last_decile = decile;
        }
        if let Some(line) = render(&event) {
            println!("{line}");
        }
    }
}

fn render(event: &PackageEvent) -> Option<String> {
    let title = &event.package().title;
    let line = match event {
        PackageEvent::FetchStarted { .. } => format!("  {} {title}", "resolving".dark_grey()),
        PackageEvent::FetchCompleted { .. } => return None,
        PackageEvent::DownloadStarted { .. } => {
            format!("  {} {title}", "downloading".dark_grey())
        }
        PackageEvent::DownloadProgress {
            received, total, ..
        } => match total {
            Some(total) => format!(
                "  {} {} / {}",
                "fetching".dark_grey(),
                format_size(*received),
                format_size(*total)
            ),
            None => format!("  {} {}", "fetching".dark_grey(), format_size(*received)),
        },
        PackageEvent::DownloadCompleted { artifact, .. } => format!(
            "  {} {} ({}, {})",
            "downloaded".green(),
            artifact.path.display(),
            artifact.installer_type,
            format_size(artifact.size)
        ),
        PackageEvent::InstallStarted { .. } => format!("  {} {title}", "installing".dark_grey()),
        PackageEvent::InstallProgress { fraction, .. } => {
            format!("  {} {:.0}%", "installing".dark_grey(), fraction * 100.0)
        }
        PackageEvent::InstallCompleted { .. } => format!("  {} {title}", "installed".green()),
        PackageEvent::FetchFailed { error, .. }
        | PackageEvent::DownloadFailed { error, .. }
        | PackageEvent::InstallFailed { error, .. } => {
            format!("  {} {title}: {error}", "failed".red())
        }
    };
    Some(line)
}
