//! Contains CLI argument parsing structs and enums.
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Read and save preferences in this file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move each APK into a folder named after its label and version
    Organize {
        /// Directory holding the APK files (asked for when omitted)
        dir: Option<PathBuf>,
        /// Create the label folders here instead of in the APK directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// File extensions to pick up, comma separated (default: apk)
        #[arg(short, long, value_delimiter = ',')]
        ext: Vec<String>,
        /// Show where every file would go without touching anything
        #[arg(long)]
        dry_run: bool,
        /// Replace files that already exist in the label folder
        #[arg(long)]
        overwrite: bool,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List the APK files in a directory with their label and version
    List {
        /// Directory holding the APK files (asked for when omitted)
        dir: Option<PathBuf>,
        /// File extensions to pick up, comma separated (default: apk)
        #[arg(short, long, value_delimiter = ',')]
        ext: Vec<String>,
    },
    /// Show info for a local APK or XAPK file
    Info {
        /// Path to the APK or XAPK file to analyze
        file: PathBuf,
    },
}
