use crate::apply::{move_file, undo_operations, UndoResult};
use crate::exif_reader::{ExifExtractor, MetadataExtractor};
use crate::location::{LocationResolver, NoLocationResolver};
use crate::metadata::{CaptureContext, ImageFile, ImageMetadata, IMAGE_EXTENSIONS};
use crate::oplog::{OperationLog, PlannedMove};
use crate::planner::PathPlanner;
use crate::tagger::{NoopTagger, Tagger};
use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("source directory does not exist: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    #[error("no image files found in {}", .0.display())]
    NoImages(PathBuf),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct OrganizeStats {
    pub processed: usize,
    pub moved: usize,
    pub tagged: usize,
    pub errors: usize,
}

/// Sorts one source tree into a destination tree and remembers how to put
/// it back. Not meant to be shared: every method assumes a single caller.
pub struct Organizer {
    source_root: PathBuf,
    planner: PathPlanner,
    extractor: Box<dyn MetadataExtractor>,
    resolver: Box<dyn LocationResolver>,
    tagger: Box<dyn Tagger>,
    log: OperationLog,
    stats: OrganizeStats,
}

impl Organizer {
    /// Relative roots are resolved against the current directory here, so
    /// every path in the operation log stays valid from any working directory.
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: absolute_root(source_root.into()),
            planner: PathPlanner::new(absolute_root(dest_root.into())),
            extractor: Box::new(ExifExtractor),
            resolver: Box::new(NoLocationResolver),
            tagger: Box::new(NoopTagger),
            log: OperationLog::new(),
            stats: OrganizeStats::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: impl MetadataExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_resolver(mut self, resolver: impl LocationResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_tagger(mut self, tagger: impl Tagger + 'static) -> Self {
        self.tagger = Box::new(tagger);
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        self.planner.dest_root()
    }

    pub fn stats(&self) -> OrganizeStats {
        self.stats
    }

    pub fn operation_log(&self) -> &OperationLog {
        &self.log
    }

    /// Replaces the undo state, e.g. with a log saved by another process.
    pub fn set_operation_log(&mut self, log: OperationLog) {
        self.log = log;
    }

    pub fn save_operation_log(&self, path: &Path) -> Result<()> {
        self.log.save(path)
    }

    pub fn load_operation_log(&mut self, path: &Path) -> Result<()> {
        self.log = OperationLog::load(path)?;
        Ok(())
    }

    /// Lists image files under the source root, sorted by file name within
    /// each directory. A destination tree nested in the source is not entered.
    pub fn scan(&self) -> Result<Vec<ImageFile>, OrganizeError> {
        if !self.source_root.exists() {
            return Err(OrganizeError::SourceMissing(self.source_root.clone()));
        }
        if !self.source_root.is_dir() {
            return Err(OrganizeError::SourceNotDirectory(self.source_root.clone()));
        }

        let nested_dest = self.nested_dest_root();
        let walker = WalkDir::new(&self.source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_same_dir(entry, nested_dest.as_deref()));

        let mut images = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(extension) = image_extension(entry.path()) else {
                continue;
            };
            match modified_time(&entry) {
                Some(modified) => images.push(ImageFile {
                    path: entry.path().to_path_buf(),
                    extension,
                    modified,
                }),
                None => log::warn!(
                    "skipping {}: modification time unavailable",
                    entry.path().display()
                ),
            }
        }

        log::debug!(
            "found {} images under {}",
            images.len(),
            self.source_root.display()
        );
        Ok(images)
    }

    /// Processes every scanned image in turn. With `dry_run` nothing on disk
    /// changes but stats and the log come out exactly as a live run would
    /// produce them.
    pub fn organize(&mut self, dry_run: bool) -> Result<OrganizeStats, OrganizeError> {
        let images = self.scan()?;
        if images.is_empty() {
            return Err(OrganizeError::NoImages(self.source_root.clone()));
        }

        self.log = OperationLog::new();
        self.stats = OrganizeStats::default();
        self.planner.reset();

        log::info!(
            "organizing {} images into {}{}",
            images.len(),
            self.dest_root().display(),
            if dry_run { " (dry run)" } else { "" }
        );

        for image in &images {
            match self.process_image(image, dry_run) {
                Ok(()) => self.stats.moved += 1,
                Err(err) => {
                    log::error!("failed to process {}: {err:#}", image.path.display());
                    self.stats.errors += 1;
                }
            }
            self.stats.processed += 1;
        }

        Ok(self.stats)
    }

    pub fn undo(&self) -> UndoResult {
        undo_operations(&self.log)
    }

    fn process_image(&mut self, image: &ImageFile, dry_run: bool) -> Result<()> {
        log::debug!("processing {} ({})", image.path.display(), image.extension);
        let context = self.capture_context(image);
        let destination = self.planner.plan(
            image,
            context.capture_time.as_deref(),
            context.place.as_ref(),
        );

        let tags = self.generate_tags(image);
        if !tags.is_empty() {
            self.stats.tagged += 1;
        }

        if !dry_run {
            move_file(&image.path, &destination)?;
            log::info!(
                "moved {} -> {}",
                image.path.display(),
                destination.display()
            );
            if !tags.is_empty() {
                if let Err(err) = self.tagger.persist(&destination, &tags) {
                    log::warn!("failed to save tags for {}: {err:#}", destination.display());
                }
            }
        }

        let location = context.place.as_ref().map(|p| self.resolver.format(p));
        self.log.push(PlannedMove {
            source: image.path.clone(),
            destination,
            capture_time: context.capture_time,
            location,
            tags: (!tags.is_empty()).then_some(tags),
        });
        Ok(())
    }

    fn capture_context(&self, image: &ImageFile) -> CaptureContext {
        let metadata = match self.extractor.extract(&image.path) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::debug!("no metadata for {}: {err:#}", image.path.display());
                ImageMetadata::default()
            }
        };
        if !metadata.camera.is_empty() {
            log::debug!("camera for {}: {:?}", image.path.display(), metadata.camera);
        }

        let place = metadata
            .coordinates
            .and_then(|coordinates| self.resolver.resolve(coordinates));

        CaptureContext {
            capture_time: metadata.capture_time,
            coordinates: metadata.coordinates,
            place,
        }
    }

    fn generate_tags(&self, image: &ImageFile) -> Vec<String> {
        match self.tagger.tag(&image.path) {
            Ok(tags) => tags,
            Err(err) => {
                log::warn!("tagging failed for {}: {err:#}", image.path.display());
                Vec::new()
            }
        }
    }

    fn nested_dest_root(&self) -> Option<PathBuf> {
        let source = fs::canonicalize(&self.source_root).ok()?;
        let dest = fs::canonicalize(self.dest_root()).ok()?;
        (dest != source && dest.starts_with(&source)).then_some(dest)
    }
}

fn absolute_root(path: PathBuf) -> PathBuf {
    match std::path::absolute(&path) {
        Ok(absolute) => absolute,
        // only an empty path fails here; scan reports it as missing
        Err(err) => {
            log::debug!("cannot make {} absolute: {err}", path.display());
            path
        }
    }
}

fn is_same_dir(entry: &DirEntry, dir: Option<&Path>) -> bool {
    let Some(dir) = dir else {
        return false;
    };
    entry.file_type().is_dir() && fs::canonicalize(entry.path()).is_ok_and(|p| p == dir)
}

fn image_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn modified_time(entry: &DirEntry) -> Option<DateTime<Local>> {
    let time = entry.metadata().ok()?.modified().ok()?;
    Some(DateTime::from(time))
}
