// rbrowse - A keyboard-driven image browser for Wayland
// Walks a directory tree and previews every decodable image, one at a time

mod cli;
mod error;
mod fit;
mod image_loader;
mod navigator;
mod scan;
mod wayland;

use anyhow::Result;
use log::info;
use navigator::{CandidateList, Display, Navigator, Outcome};
use std::io;
use std::process::ExitCode;

/// Name of the preview surface
const WINDOW_NAME: &str = "Browser";

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            let program = std::env::args().next().unwrap_or_else(|| "rbrowse".to_string());
            eprintln!("Error: {}: {:#}", program, e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether browsing happened; `false` means usage was printed
fn run() -> Result<bool> {
    // Parse command line arguments
    let Some(config) = cli::parse_args()? else {
        return Ok(false);
    };

    // Scan all files below the root, depth-first
    let files = scan::scan(&config.root)?;
    info!("Found {} files under {}", files.len(), config.root.display());

    if config.list_only {
        print!("{}", scan::format_listing(&files));
        return Ok(true);
    }

    let display = wayland::WaylandDisplay::connect(WINDOW_NAME)?;
    let bounds = config.bounds(display.screen_size());
    if bounds.is_disabled() {
        info!("Preview bounds disabled, showing images at native resolution");
    } else {
        info!("Preview bounds: {}x{}", bounds.max_width, bounds.max_height);
    }

    let mut navigator = Navigator::new(CandidateList::new(files), bounds, display, io::stdout());
    let outcome = navigator.run()?;

    let stats = navigator.stats();
    match outcome {
        Outcome::Quit => info!("Browsing ended after {} previews", stats.previewed),
        Outcome::Exhausted => info!("No more images to show"),
    }
    if stats.skipped > 0 {
        info!("Skipped {} files that are not images", stats.skipped);
    }

    Ok(true)
}
