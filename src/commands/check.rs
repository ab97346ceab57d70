use anyhow::{Context, Result};
use std::path::Path;

use ticketwatch::config::Config;
use ticketwatch::crawler::{HttpFetcher, PageFetcher};
use ticketwatch::parser::AvailabilityDetector;

use super::build_monitor;

/// Run exactly one cycle, for use from an external scheduler
pub async fn check(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let monitor = build_monitor(&config)?;

    let report = monitor.run_cycle().await;
    println!("Check completed: {report}");

    let mut states = monitor.table().read().await.states().snapshot();
    states.sort_by(|a, b| a.target.name.cmp(&b.target.name));
    for state in states {
        let detail = match (&state.last_error, &state.last_status) {
            (Some(error), _) => format!("{error} ({} failed in a row)", state.consecutive_failures),
            (None, Some(status)) => status.clone(),
            (None, None) => String::new(),
        };
        println!(
            "  {} {:<30} {}",
            state.availability().glyph(),
            state.target.name,
            detail
        );
    }

    Ok(())
}

/// Fetch one page and print the detection
pub async fn detect(config_path: Option<&Path>, url: &str) -> Result<()> {
    let config = Config::load_settings(config_path).context("Failed to load configuration")?;
    let fetcher = HttpFetcher::from_config(&config).context("Failed to create page fetcher")?;
    let detector = AvailabilityDetector::new(&config.detector);

    let page = fetcher
        .fetch(url)
        .await
        .with_context(|| format!("Failed to fetch {url}"))?;
    let detection = detector.detect(&page);

    println!("URL:      {url}");
    println!("Title:    {}", detection.title.as_deref().unwrap_or("(none)"));
    println!("Bookable: {}", detection.bookable);
    println!("Status:   {}", detection.status);

    Ok(())
}
