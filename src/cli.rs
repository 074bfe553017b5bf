// Command line interface module
// Handles parsing of command line arguments into the session configuration

use crate::fit::DisplayBounds;
use anyhow::{anyhow, Result};
use clap::builder::ValueParser;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// rbrowse - Step through every image below a directory
#[derive(Parser, Debug)]
#[command(name = "rbrowse")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory to browse, including all of its subdirectories
    #[arg(value_name = "DIRECTORY", value_parser = ValueParser::os_string())]
    pub directory: Option<OsString>,

    /// Maximum preview width in pixels (0 disables resizing)
    #[arg(short, long, env = "RBROWSE_COLS")]
    pub cols: Option<u32>,

    /// Maximum preview height in pixels (0 disables resizing)
    #[arg(short, long, env = "RBROWSE_ROWS")]
    pub rows: Option<u32>,

    /// Print the numbered list of files found and exit without browsing
    #[arg(short, long, default_value = "false")]
    pub list: bool,
}

/// Session configuration, fixed once parsing is done
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub root: PathBuf,
    pub list_only: bool,
    pub cols: Option<u32>,
    pub rows: Option<u32>,
}

impl Config {
    /// Resolve the preview bounds against the screen size, if one is known.
    ///
    /// Explicit values win, zero included. A missing axis falls back to the
    /// screen, and to zero (no resizing) when the screen is unknown.
    pub fn bounds(&self, screen: Option<(u32, u32)>) -> DisplayBounds {
        let (screen_width, screen_height) = screen.unwrap_or((0, 0));
        DisplayBounds::new(
            self.cols.unwrap_or(screen_width),
            self.rows.unwrap_or(screen_height),
        )
    }
}

/// Parse the process arguments.
///
/// Returns `Ok(None)` when usage was printed instead (help, version, or no
/// directory given); the caller exits with a failure status.
pub fn parse_args() -> Result<Option<Config>> {
    parse_from(std::env::args_os())
}

fn parse_from<I, T>(args: I) -> Result<Option<Config>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(None);
        }
        Err(e) => return Err(anyhow!("{}", e.render().to_string().trim_end())),
    };

    let root = match args.directory {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            Args::command().print_help()?;
            return Ok(None);
        }
    };

    Ok(Some(Config {
        root,
        list_only: args.list,
        cols: args.cols,
        rows: args.rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Config>> {
        parse_from(std::iter::once("rbrowse").chain(args.iter().copied()))
    }

    #[test]
    fn directory_and_bounds() {
        let config = parse(&["photos", "--cols", "800", "-r", "600"]).unwrap().unwrap();
        assert_eq!(config.root, PathBuf::from("photos"));
        assert_eq!(config.bounds(Some((1920, 1080))), DisplayBounds::new(800, 600));
        assert!(!config.list_only);
    }

    #[test]
    fn screen_fills_missing_bounds() {
        let config = Config {
            root: "x".into(),
            list_only: false,
            cols: None,
            rows: Some(500),
        };
        assert_eq!(config.bounds(Some((1920, 1080))), DisplayBounds::new(1920, 500));
        assert_eq!(config.bounds(None), DisplayBounds::new(0, 500));
        assert!(config.bounds(None).is_disabled());
    }

    #[test]
    fn explicit_zero_disables_resizing() {
        let config = parse(&["dir", "-c", "0", "-r", "0"]).unwrap().unwrap();
        assert!(config.bounds(Some((1920, 1080))).is_disabled());
    }

    #[test]
    fn list_flag() {
        let config = parse(&["-l", "dir"]).unwrap().unwrap();
        assert!(config.list_only);
    }

    #[test]
    fn missing_directory_prints_usage() {
        assert!(parse(&[]).unwrap().is_none());
    }

    #[test]
    fn empty_directory_prints_usage() {
        assert!(parse(&[""]).unwrap().is_none());
        assert!(parse(&["", "--cols", "10"]).unwrap().is_none());
    }

    #[test]
    fn help_prints_usage() {
        assert!(parse(&["--help"]).unwrap().is_none());
    }

    #[test]
    fn non_numeric_bound_is_an_error() {
        assert!(parse(&["dir", "--cols", "wide"]).is_err());
    }
}
