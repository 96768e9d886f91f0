use anyhow::{Context, Result};
use humansize::{format_size, DECIMAL};
use log::LevelFilter;
use std::path::{Path, PathBuf};

use image_selector::backup::BackupManager;
use image_selector::file_utils;
use image_selector::keymap::Keymap;
use image_selector::session::Session;
use image_selector::store::DuplicateStore;
use image_selector::tui_app;
use image_selector::Cli;

fn setup_logger(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format_timestamp_millis();
    builder.format_target(false);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file {:?}", log_path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    } else {
        // Keep the terminal clean for the TUI unless asked for more
        builder.filter_level(if verbosity == 0 { LevelFilter::Warn } else { level });
    }

    builder.init();
    Ok(())
}

fn open_store(cli: &Cli) -> Result<DuplicateStore> {
    if cli.dry_run {
        log::info!("[DRY RUN] Using an in-memory database");
        return Ok(DuplicateStore::open_in_memory()?);
    }
    let db_path = cli.database.clone().context("No database path configured")?;
    DuplicateStore::open(&db_path).with_context(|| format!("Failed to open database {:?}", db_path))
}

fn export_records(cli: &Cli, output_path: &Path) -> Result<()> {
    let db_path = cli.database.clone().context("No database path configured")?;
    let store = DuplicateStore::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    let records = store.records()?;
    match file_utils::output_records(&records, output_path, cli.export_format()) {
        Ok(_) => {
            log::info!("Successfully wrote {} records to {:?}", records.len(), output_path);
            println!("{} records saved to {:?}", records.len(), output_path);
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to write records to {:?}: {}", output_path, e);
            Err(e)
        }
    }
}

fn print_listing(images: &[file_utils::ImageEntry]) {
    if images.is_empty() {
        println!("No images found.");
        return;
    }
    println!("{} images in review order:", images.len());
    for image in images {
        let taken = image
            .taken
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<40} {:>10}  taken: {:<19}  modified: {}",
            image.filename,
            format_size(image.size, DECIMAL),
            taken,
            image.modified.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::with_config()?;

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| cli.log.then(|| PathBuf::from("image-selector.log")));
    setup_logger(cli.verbose, log_file.as_deref())?;

    log::info!("Logger initialized. Application starting.");
    log::debug!("CLI args: {:#?}", cli);

    if let Some(output_path) = &cli.export {
        export_records(&cli, output_path)?;
        if cli.directory.is_none() {
            return Ok(());
        }
    }

    let directory = cli.directory.clone().context("No directory given")?;
    if !directory.exists() {
        log::error!("Directory {:?} does not exist.", directory);
        return Err(anyhow::anyhow!("Directory {:?} does not exist.", directory));
    }
    if !directory.is_dir() {
        log::error!("Path {:?} is not a directory.", directory);
        return Err(anyhow::anyhow!("Path {:?} is not a directory.", directory));
    }
    let directory = directory
        .canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", directory))?;

    let backup_root = cli.backup_dir.clone().context("No backup directory configured")?;
    let mut backup = BackupManager::new(&backup_root, &directory).with_dry_run(cli.dry_run);

    if let Some(file_name) = &cli.restore {
        let restored = backup.restore_by_name(file_name)?;
        println!("Restored {}", restored.display());
        return Ok(());
    }

    let images = file_utils::load_images(&directory, &cli.load_options()?)?;

    if cli.list {
        print_listing(&images);
        let backed_up = backup.list_backed_up()?;
        if !backed_up.is_empty() {
            println!("{} file(s) in backup {:?}", backed_up.len(), backup.backup_dir());
        }
        return Ok(());
    }

    if backup.has_history() {
        log::warn!(
            "Backup directory {:?} already holds files; images saved before are skipped.",
            backup.backup_dir()
        );
    }

    let keymap = Keymap::with_overrides(&cli.keys)?;
    let store = open_store(&cli)?;
    let session = Session::new(&directory, images, store, backup, cli.grid_size())?
        .with_dry_run(cli.dry_run);

    log::info!(
        "Reviewing {} images in {:?} ({} already decided)",
        session.loaded(),
        directory,
        session.already_recorded()
    );
    let session = tui_app::run_tui_app(session, keymap)?;

    println!(
        "{}Reviewed {} of {} images ({:.0}%).",
        if session.is_dry_run() { "[DRY RUN] " } else { "" },
        session.completed(),
        session.loaded(),
        session.progress_percent()
    );
    if let Some(db_path) = session.store().db_path() {
        println!(
            "{} records are stored in {}",
            session.store().count()?,
            db_path.display()
        );
    }
    Ok(())
}
