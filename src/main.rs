mod apk;
mod app;
mod cli;
mod config;
mod error;
mod file_utils;
mod organizer;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::*;
use inquire::{Confirm, Text};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use config::Config;
use file_utils::FileUtilities;
use organizer::{spawn_organize, FileOutcome, OrganizeOptions, OrganizeReport, Organizer, Progress};

struct OrganizeArgs {
    dir: Option<PathBuf>,
    output: Option<PathBuf>,
    ext: Vec<String>,
    dry_run: bool,
    overwrite: bool,
    yes: bool,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Returns false when any app could not be organized.
async fn real_main() -> Result<bool> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = cli.config.clone().or_else(Config::default_path);
    let mut config = config_path.as_deref().map(Config::load).unwrap_or_default();

    match cli.command {
        Some(Commands::Organize {
            dir,
            output,
            ext,
            dry_run,
            overwrite,
            yes,
        }) => {
            let args = OrganizeArgs {
                dir,
                output,
                ext,
                dry_run,
                overwrite,
                yes,
            };
            organize(args, &mut config, config_path.as_deref()).await
        }
        Some(Commands::List { dir, ext }) => {
            let dir = resolve_directory(dir, &config)?;
            list(&dir, &extensions(&ext, &config))?;
            Ok(true)
        }
        Some(Commands::Info { file }) => {
            info(&file)?;
            Ok(true)
        }
        None => {
            let args = OrganizeArgs {
                dir: None,
                output: None,
                ext: Vec::new(),
                dry_run: false,
                overwrite: false,
                yes: false,
            };
            organize(args, &mut config, config_path.as_deref()).await
        }
    }
}

fn extensions(ext: &[String], config: &Config) -> Vec<String> {
    if ext.is_empty() {
        config.extensions.clone()
    } else {
        ext.to_vec()
    }
}

fn resolve_directory(dir: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir);
    }
    let default = config
        .last_directory
        .as_ref()
        .map(|d| d.display().to_string())
        .or_else(|| std::env::current_dir().ok().map(|d| d.display().to_string()))
        .unwrap_or_default();
    let answer = Text::new("Apps directory:")
        .with_default(&default)
        .with_help_message("Directory holding the APK files to organize")
        .prompt()?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(anyhow!("Selected path is not valid!"));
    }
    Ok(PathBuf::from(answer))
}

async fn organize(args: OrganizeArgs, config: &mut Config, config_path: Option<&Path>) -> Result<bool> {
    let dir = resolve_directory(args.dir, config)?;
    let utils = FileUtilities::new(extensions(&args.ext, config));
    let paths = utils.get_file_paths(&dir)?;

    config.last_directory = Some(std::fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone()));
    if let Some(path) = config_path {
        if let Err(e) = config.save(path) {
            warn!("Could not save preferences: {:#}", e);
        }
    }

    if paths.is_empty() {
        println!(
            "{} {}",
            "No files with a supported extension found in".yellow(),
            dir.display()
        );
        println!("Looked for: {}", utils.supported_extensions().join(", ").cyan());
        return Ok(true);
    }
    println!("Found {} app(s) in {}", paths.len().to_string().green(), dir.display());

    if !args.yes && !args.dry_run {
        let proceed = Confirm::new(&format!("Organize {} app(s)?", paths.len()))
            .with_default(true)
            .prompt()?;
        if !proceed {
            println!("{}", "Nothing was moved.".yellow());
            return Ok(true);
        }
    }

    let options = OrganizeOptions {
        target_dir: args.output,
        dry_run: args.dry_run,
        conflict: config.conflict_policy(args.overwrite),
    };
    let organizer = Organizer::new(utils, options);
    let cancel = organizer.cancel_flag();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let (handle, mut progress) = spawn_organize(organizer, dir, paths);
    while let Some(event) = progress.recv().await {
        print_progress(&event);
    }
    let report = handle.await.context("Organizing task failed")?;
    print_report(&report, args.dry_run);
    Ok(report.succeeded())
}

fn print_progress(event: &Progress) {
    match event {
        Progress::Started { total } => {
            println!("{} ({} app(s))", "Organizing apps ...".yellow(), total);
        }
        Progress::Processed {
            index,
            total,
            file,
            outcome,
        } => {
            let counter = format!("[{}/{}]", index, total);
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());
            match outcome {
                FileOutcome::Moved { label, .. } => {
                    println!("{} {} -> {}", counter.dimmed(), name, label.green());
                }
                FileOutcome::Planned { destination, .. } => {
                    println!("{} {} -> {}", counter.dimmed(), name, destination.display().to_string().cyan());
                }
                FileOutcome::CopiedNotDeleted { label, .. } => {
                    println!(
                        "{} {} -> {} {}",
                        counter.dimmed(),
                        name,
                        label.green(),
                        "(copied, original not deleted)".yellow()
                    );
                }
                FileOutcome::Skipped { destination, .. } => {
                    println!(
                        "{} {} {} {}",
                        counter.dimmed(),
                        name,
                        "skipped, already in".yellow(),
                        destination.display()
                    );
                }
                FileOutcome::Failed { reason } => {
                    println!("{} {} {}", counter.dimmed(), name, reason.red());
                }
            }
        }
        Progress::Finished => {}
    }
}

fn print_report(report: &OrganizeReport, dry_run: bool) {
    println!();
    if report.cancelled {
        println!("{}", "Organizing was interrupted.".yellow());
    }
    if dry_run {
        println!(
            "{} {} of {} app(s) would be organized into {}",
            "Dry run:".cyan(),
            report.planned,
            report.total,
            report.target.display()
        );
    } else if report.organized() {
        println!("{}", "Your apps have been organized.".green().bold());
        println!("Find them in the path:\n{}", report.target.display().to_string().cyan());
    } else if report.succeeded() {
        println!(
            "{} of {} app(s) organized before stopping, in {}",
            report.moved,
            report.total,
            report.target.display().to_string().cyan()
        );
    } else {
        println!("{}", "There is an issue, not all apps organized.".red().bold());
    }
    if report.skipped > 0 {
        println!("{} {}", "Skipped (already organized):".yellow(), report.skipped);
    }
    for leftover in &report.leftovers {
        println!("{} {}", "Copied but not deleted:".yellow(), leftover.display());
    }
    for (path, reason) in &report.failures {
        println!("{} {}: {}", "Failed:".red(), path.display(), reason);
    }
}

fn list(dir: &Path, extensions: &[String]) -> Result<()> {
    let utils = FileUtilities::new(extensions);
    let paths = utils.get_file_paths(dir)?;
    if paths.is_empty() {
        println!("{}", "No APK files found.".yellow());
        return Ok(());
    }
    println!("\n{}", "Apps".bold().underline().yellow());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match apk::read_app(&path) {
            Ok(app) => println!("{:<40} {}", name.cyan(), app.label_and_version().green()),
            Err(e) => println!("{:<40} {}", name.cyan(), e.to_string().red()),
        }
    }
    Ok(())
}

fn info(file: &Path) -> Result<()> {
    let app = apk::read_app(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let na = || "N/A".to_string();
    println!("{}", "\nApp Info".bold().underline().yellow());
    println!("{}: {}", "Package Name".cyan(), app.package_name.green());
    println!("{}: {}", "Label".cyan(), app.app_name.green());
    println!(
        "{}: {}",
        "Version Name".cyan(),
        app.version_name.clone().unwrap_or_else(na).green()
    );
    println!(
        "{}: {}",
        "Version Code".cyan(),
        app.version_code.map(|c| c.to_string()).unwrap_or_else(na).green()
    );
    println!(
        "{}: {}",
        "Folder Name".cyan(),
        file_utils::sanitize_dir_name(&app.label_and_version()).green()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    match real_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            if let Some(inquire_err) = e.downcast_ref::<inquire::InquireError>() {
                if matches!(
                    inquire_err,
                    inquire::InquireError::OperationInterrupted | inquire::InquireError::OperationCanceled
                ) {
                    std::process::exit(0);
                }
            }
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
