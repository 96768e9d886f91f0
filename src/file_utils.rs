use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use glob::{Pattern, PatternError};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use walkdir::WalkDir;

use crate::exif_utils;
use crate::store::DuplicateRecord;

pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A loaded image waiting to be grouped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub taken: Option<NaiveDateTime>,
}

impl ImageEntry {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read metadata for {:?}", path))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{:?} has no file name", path))?;
        let modified = metadata
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            size: metadata.len(),
            modified,
            taken: exif_utils::picture_taken_time(path),
        })
    }
}

#[derive(Debug, Default)]
pub struct FilterRules {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl FilterRules {
    pub fn new(include: &[String], exclude: &[String], filter_from: Option<&Path>) -> Result<Self> {
        let mut rules = FilterRules::default();

        // Filter file first, flags append to it
        if let Some(filter_file_path) = filter_from {
            log::info!("Loading filter rules from: {:?}", filter_file_path);
            let file = File::open(filter_file_path)
                .with_context(|| format!("Failed to open filter file {:?}", filter_file_path))?;
            let reader = BufReader::new(file);
            for (line_num, line_result) in reader.lines().enumerate() {
                let line = line_result.context("Failed to read line from filter file")?;
                let trimmed_line = line.trim();
                if trimmed_line.is_empty() || trimmed_line.starts_with('#') || trimmed_line.starts_with(';') {
                    continue;
                }

                if let Some(pattern_str) = trimmed_line.strip_prefix("+ ") {
                    rules.add_include(pattern_str.trim())?;
                } else if let Some(pattern_str) = trimmed_line.strip_prefix("- ") {
                    rules.add_exclude(pattern_str.trim())?;
                } else {
                    log::warn!(
                        "Invalid line in filter file {:?} at line {}: {}",
                        filter_file_path,
                        line_num + 1,
                        trimmed_line
                    );
                }
            }
        }

        for pattern_str in include {
            rules.add_include(pattern_str)?;
        }
        for pattern_str in exclude {
            rules.add_exclude(pattern_str)?;
        }

        if !rules.includes.is_empty() {
            log::info!(
                "Include rules active: {}",
                rules.includes.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        if !rules.excludes.is_empty() {
            log::info!(
                "Exclude rules active: {}",
                rules.excludes.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
            );
        }

        Ok(rules)
    }

    fn add_include(&mut self, pattern_str: &str) -> Result<(), PatternError> {
        let pattern = Pattern::new(pattern_str).map_err(|e| {
            log::error!("Invalid include glob pattern '{}': {}", pattern_str, e);
            e
        })?;
        self.includes.push(pattern);
        Ok(())
    }

    fn add_exclude(&mut self, pattern_str: &str) -> Result<(), PatternError> {
        let pattern = Pattern::new(pattern_str).map_err(|e| {
            log::error!("Invalid exclude glob pattern '{}': {}", pattern_str, e);
            e
        })?;
        self.excludes.push(pattern);
        Ok(())
    }

    pub fn is_match(&self, path_str: &str) -> bool {
        if self.excludes.iter().any(|p| p.matches(path_str)) {
            return false;
        }
        // With include rules present, a path must hit at least one
        if !self.includes.is_empty() {
            return self.includes.iter().any(|p| p.matches(path_str));
        }
        true
    }
}

/// How a working directory is turned into a list of images.
#[derive(Debug)]
pub struct LoadOptions {
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub filter: FilterRules,
    pub progress: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: false,
            filter: FilterRules::default(),
            progress: false,
        }
    }
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name()
         .to_str()
         .map(|s| s.starts_with('.'))
         .unwrap_or(false)
}

/// Lists the images of `directory` in review order: by file name, then
/// stably by capture time with undated images last.
pub fn load_images(directory: &Path, options: &LoadOptions) -> Result<Vec<ImageEntry>> {
    if !directory.is_dir() {
        return Err(anyhow::anyhow!("{:?} is not a directory", directory));
    }
    log::info!("Loading images from {:?} (recursive: {})", directory, options.recursive);

    let draw_target = if options.progress { ProgressDrawTarget::stderr() } else { ProgressDrawTarget::hidden() };
    let pb = ProgressBar::with_draw_target(None, draw_target);
    pb.set_style(ProgressStyle::default_spinner()
        .template("{spinner:.green} Reading image: {msg:.dim} ({pos} found, {elapsed_precise})")?);
    if options.progress { pb.enable_steady_tick(Duration::from_millis(100)); }

    let mut walker = WalkDir::new(directory).follow_links(false);
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    let mut images = Vec::new();
    for entry_result in walker.into_iter().filter_entry(|e| e.depth() == 0 || !is_hidden(e)) {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Error walking directory: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_image_extension(entry.path(), &options.extensions) {
            continue;
        }
        match entry.path().to_str() {
            Some(path_str) if options.filter.is_match(path_str) => {}
            Some(_) => continue,
            None => {
                log::warn!("Path {:?} is not valid UTF-8, excluding.", entry.path());
                continue;
            }
        }

        pb.set_message(entry.file_name().to_string_lossy().into_owned());
        match ImageEntry::from_path(entry.path()) {
            Ok(image) => {
                images.push(image);
                pb.inc(1);
            }
            Err(e) => log::warn!("Skipping {:?}: {}", entry.path(), e),
        }
    }

    images.sort_by(|a, b| a.path.cmp(&b.path));
    // Stable sort keeps name order among equal or missing capture times
    images.sort_by(|a, b| match (a.taken, b.taken) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    if options.progress { pb.finish_with_message("Loading complete."); }
    else { pb.finish_and_clear(); }

    log::info!("Loaded {} images from {:?}", images.len(), directory);
    Ok(images)
}

/// First free path for `file_name` inside `dir`, appending `_copy(N)`
/// before the extension on collision.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let mut candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path.file_stem().unwrap_or_default().to_string_lossy();
    let ext = as_path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut counter = 1;
    while candidate.exists() {
        let new_name = match &ext {
            Some(ext) => format!("{}_copy({}).{}", stem, counter, ext),
            None => format!("{}_copy({})", stem, counter),
        };
        candidate = dir.join(new_name);
        counter += 1;
    }
    candidate
}

/// Moves `source` to `destination`, which must not exist yet. Falls back to
/// copy and remove when a plain rename fails, e.g. across filesystems.
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if destination.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{:?} already exists", destination),
        ));
    }
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            log::debug!("Rename {:?} -> {:?} failed ({}), copying instead", source, destination, e);
            copy_then_remove(source, destination)
        }
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    fs::copy(source, destination)?;

    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    let atime = filetime::FileTime::from_last_access_time(&metadata);
    if let Err(e) = filetime::set_file_times(destination, atime, mtime) {
        log::warn!("Failed to restore timestamps on {:?}: {}", destination, e);
    }

    fs::remove_file(source)
}

#[derive(serde::Serialize)]
struct RecordExport<'a> {
    records: &'a [DuplicateRecord],
}

pub fn output_records(records: &[DuplicateRecord], output_path: &Path, format: &str) -> Result<()> {
    log::info!(
        "Writing {} duplicate records to {:?} in {} format",
        records.len(),
        output_path,
        format
    );

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            log::debug!("Created parent directory: {:?}", parent);
        }
    }

    match format {
        "json" => {
            let output_file = File::create(output_path)?;
            serde_json::to_writer_pretty(output_file, records)?;
        }
        "toml" => {
            // TOML has no top-level arrays
            let toml_string = toml::to_string_pretty(&RecordExport { records })?;
            fs::write(output_path, toml_string)?;
        }
        _ => {
            return Err(anyhow::anyhow!("Unsupported output format: {}", format));
        }
    }

    log::info!("Successfully wrote records to {:?}", output_path);
    Ok(())
}
