//! Workspace folder layout and mask output.
//!
//! A workspace mirrors one source directory:
//!
//! ```text
//! <workspace_root>/
//! └── <source_dir_name>[_<YYYYmmdd_HHMMSS>]/
//!     ├── workspace.yaml
//!     ├── OriginalImage/
//!     └── Mask/
//! ```
//!
//! `workspace.yaml` maps the workspace back to its source directory so it can
//! be reopened later. Saving a mask also copies the original image next to
//! it, so a workspace is self-contained.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use segtool_raster::{MaskStore, RasterError};
use serde::{Deserialize, Serialize};

use crate::config::WorkspaceSettings;

/// Name of the record file inside a workspace directory.
pub const RECORD_FILE: &str = "workspace.yaml";

/// Supported image extensions
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Errors from workspace creation, discovery and output.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Failed to create workspace structure at {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy original image {from:?} to {to:?}: {source}")]
    CopyOriginal {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save mask: {0}")]
    Mask(#[from] RasterError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workspace record {path:?}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Source directory {0:?} does not exist or has no name")]
    MissingSource(PathBuf),

    #[error("Mask {0:?} already exists and overwriting is disabled")]
    MaskExists(PathBuf),
}

impl WorkspaceError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Check if a path has a supported image extension
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Discover image files in a folder, non-recursively, sorted by file name.
pub fn discover_images(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(folder)
        .map_err(|e| WorkspaceError::io(folder, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    log::debug!("Found {} images in {:?}", images.len(), folder);
    Ok(images)
}

/// Persisted description of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub input_directory: PathBuf,
    pub original_subdir: String,
    pub mask_subdir: String,
}

impl WorkspaceRecord {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| WorkspaceError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|source| WorkspaceError::Record {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self).map_err(|source| WorkspaceError::Record {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|e| WorkspaceError::io(path, e))
    }
}

/// Paths describing a workspace, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    pub workspace_root: PathBuf,
    pub workspace_dir: PathBuf,
    pub original_dir: PathBuf,
    pub mask_dir: PathBuf,
    pub source_directory: PathBuf,
    pub source_directory_name: String,
}

/// Files written by [`Workspace::save_mask_with_original`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub original: PathBuf,
    pub mask: PathBuf,
    /// Whether the original was copied by this call.
    pub copied_original: bool,
}

/// An initialized workspace directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    source_dir: PathBuf,
    original_dir: PathBuf,
    mask_dir: PathBuf,
    settings: WorkspaceSettings,
}

impl Workspace {
    /// Create the workspace for `source_dir` under the configured root.
    pub fn create(source_dir: &Path, settings: &WorkspaceSettings) -> Result<Self> {
        Self::create_at(source_dir, settings, Local::now().naive_local())
    }

    pub(crate) fn create_at(
        source_dir: &Path,
        settings: &WorkspaceSettings,
        now: NaiveDateTime,
    ) -> Result<Self> {
        if !source_dir.is_dir() {
            return Err(WorkspaceError::MissingSource(source_dir.to_path_buf()));
        }
        let name = source_dir_name(source_dir)
            .ok_or_else(|| WorkspaceError::MissingSource(source_dir.to_path_buf()))?;

        let base = settings.workspace_root.join(&name);
        // Handle duplicate directory names by appending timestamp
        let dir = if base.exists() && settings.create_timestamp_on_conflict {
            let timestamp = now.format("%Y%m%d_%H%M%S");
            settings
                .workspace_root
                .join(format!("{}_{}", name, timestamp))
        } else {
            base
        };

        let workspace = Self::with_layout(dir, source_dir.to_path_buf(), settings.clone());
        workspace.create_dirs()?;

        let record_path = workspace.dir.join(RECORD_FILE);
        workspace.record().write(&record_path)?;

        log::info!(
            "Created workspace {:?} for source {:?}",
            workspace.dir,
            workspace.source_dir
        );
        Ok(workspace)
    }

    /// Reopen an existing workspace directory from its record file.
    ///
    /// Without a record the originals folder is used as the image source.
    pub fn open(workspace_dir: &Path, settings: &WorkspaceSettings) -> Result<Self> {
        if !workspace_dir.is_dir() {
            return Err(WorkspaceError::MissingSource(workspace_dir.to_path_buf()));
        }
        let record_path = workspace_dir.join(RECORD_FILE);
        let mut settings = settings.clone();

        let source_dir = if record_path.exists() {
            let record = WorkspaceRecord::read(&record_path)?;
            settings.subdirs.original = record.original_subdir;
            settings.subdirs.mask = record.mask_subdir;
            record.input_directory
        } else {
            log::warn!(
                "No {} in {:?}, using its originals as the image source",
                RECORD_FILE,
                workspace_dir
            );
            workspace_dir.join(&settings.subdirs.original)
        };

        let workspace = Self::with_layout(workspace_dir.to_path_buf(), source_dir, settings);
        workspace.create_dirs()?;
        log::info!("Opened workspace {:?}", workspace.dir);
        Ok(workspace)
    }

    fn with_layout(dir: PathBuf, source_dir: PathBuf, settings: WorkspaceSettings) -> Self {
        Self {
            original_dir: dir.join(&settings.subdirs.original),
            mask_dir: dir.join(&settings.subdirs.mask),
            dir,
            source_dir,
            settings,
        }
    }

    fn create_dirs(&self) -> Result<()> {
        for dir in [&self.original_dir, &self.mask_dir] {
            fs::create_dir_all(dir).map_err(|source| WorkspaceError::Create {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn original_dir(&self) -> &Path {
        &self.original_dir
    }

    pub fn mask_dir(&self) -> &Path {
        &self.mask_dir
    }

    pub fn record(&self) -> WorkspaceRecord {
        WorkspaceRecord {
            input_directory: self.source_dir.clone(),
            original_subdir: self.settings.subdirs.original.clone(),
            mask_subdir: self.settings.subdirs.mask.clone(),
        }
    }

    pub fn info(&self) -> WorkspaceInfo {
        WorkspaceInfo {
            workspace_root: self
                .dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.settings.workspace_root.clone()),
            workspace_dir: self.dir.clone(),
            original_dir: self.original_dir.clone(),
            mask_dir: self.mask_dir.clone(),
            source_directory: self.source_dir.clone(),
            source_directory_name: source_dir_name(&self.source_dir).unwrap_or_default(),
        }
    }

    /// Images to annotate: the source directory, or the copied originals
    /// when the source is gone.
    pub fn images(&self) -> Result<Vec<PathBuf>> {
        if self.source_dir.is_dir() {
            let images = discover_images(&self.source_dir)?;
            if !images.is_empty() {
                return Ok(images);
            }
        }
        log::warn!(
            "Source {:?} has no images, falling back to {:?}",
            self.source_dir,
            self.original_dir
        );
        discover_images(&self.original_dir)
    }

    /// Where the mask for `image` is stored.
    pub fn mask_path_for(&self, image: &Path) -> PathBuf {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.mask_dir.join(self.settings.mask_file_name(&stem))
    }

    /// The saved mask for `image`, if one exists.
    pub fn existing_mask_for(&self, image: &Path) -> Option<PathBuf> {
        let path = self.mask_path_for(image);
        path.is_file().then_some(path)
    }

    /// Save `mask` for `image` and copy the original into the workspace.
    ///
    /// The original is copied only if it is not already present. The mask is
    /// written to a temporary file and renamed into place; if that fails, an
    /// original copied by this call is removed again.
    pub fn save_mask_with_original(&self, image: &Path, mask: &MaskStore) -> Result<SavedFiles> {
        let file_name = image
            .file_name()
            .ok_or_else(|| WorkspaceError::MissingSource(image.to_path_buf()))?;
        let original = self.original_dir.join(file_name);
        let mask_path = self.mask_path_for(image);

        if mask_path.exists() && !self.settings.overwrite_existing {
            return Err(WorkspaceError::MaskExists(mask_path));
        }

        let copied_original = !original.exists();
        if copied_original {
            fs::copy(image, &original).map_err(|source| WorkspaceError::CopyOriginal {
                from: image.to_path_buf(),
                to: original.clone(),
                source,
            })?;
        }

        if let Err(e) = write_mask(mask, &mask_path) {
            if copied_original {
                if let Err(remove) = fs::remove_file(&original) {
                    log::warn!("Failed to roll back copied original {:?}: {}", original, remove);
                }
            }
            return Err(e);
        }

        log::info!("Saved mask {:?} (original {:?})", mask_path, original);
        Ok(SavedFiles {
            original,
            mask: mask_path,
            copied_original,
        })
    }
}

fn source_dir_name(dir: &Path) -> Option<String> {
    let name = match dir.file_name() {
        Some(name) => name.to_os_string(),
        None => dir.canonicalize().ok()?.file_name()?.to_os_string(),
    };
    Some(name.to_string_lossy().into_owned())
}

/// Write through a temporary sibling so a failed save never leaves a
/// truncated mask behind.
fn write_mask(mask: &MaskStore, dest: &Path) -> Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dest.with_file_name(format!(".{}.tmp", file_name));

    if let Err(e) = mask.save(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(WorkspaceError::io(dest, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scratch_dir, write_gray_png};
    use chrono::NaiveDate;
    use segtool_raster::{ImagePoint, Size, StrokeMode, apply_stroke};

    fn settings_in(root: &Path) -> WorkspaceSettings {
        WorkspaceSettings {
            workspace_root: root.join("workspace"),
            ..Default::default()
        }
    }

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 9))
            .unwrap()
    }

    fn painted_mask(size: Size) -> MaskStore {
        let mut mask = MaskStore::create(size).unwrap();
        let p = Some(ImagePoint::new(2, 2));
        apply_stroke(&mut mask, p, p, 2.0, StrokeMode::Paint);
        mask
    }

    #[test]
    fn test_discover_images_filters_and_sorts() {
        let dir = scratch_dir("ws_discover");
        for name in ["b.PNG", "a.jpg", "c.tiff", "notes.txt", "d.jpeg", "e.gif"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::create_dir(dir.join("sub.png")).unwrap();

        let names: Vec<String> = discover_images(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.tiff", "d.jpeg"]);
    }

    #[test]
    fn test_discover_missing_folder_is_io_error() {
        let dir = scratch_dir("ws_discover_missing");
        assert!(matches!(
            discover_images(&dir.join("nope")),
            Err(WorkspaceError::Io { .. })
        ));
    }

    #[test]
    fn test_create_layout_and_record() {
        let root = scratch_dir("ws_create");
        let source = root.join("scans");
        fs::create_dir(&source).unwrap();
        let settings = settings_in(&root);

        let ws = Workspace::create_at(&source, &settings, fixed_time()).unwrap();
        assert_eq!(ws.dir(), root.join("workspace").join("scans"));
        assert!(ws.original_dir().ends_with("scans/OriginalImage"));
        assert!(ws.mask_dir().ends_with("scans/Mask"));
        assert!(ws.original_dir().is_dir());
        assert!(ws.mask_dir().is_dir());

        let record = WorkspaceRecord::read(&ws.dir().join(RECORD_FILE)).unwrap();
        assert_eq!(record.input_directory, source);
        assert_eq!(record.mask_subdir, "Mask");

        let text = fs::read_to_string(ws.dir().join(RECORD_FILE)).unwrap();
        assert!(text.contains("input_directory:"));
    }

    #[test]
    fn test_create_conflict_appends_timestamp() {
        let root = scratch_dir("ws_conflict");
        let source = root.join("scans");
        fs::create_dir(&source).unwrap();
        let settings = settings_in(&root);

        let first = Workspace::create_at(&source, &settings, fixed_time()).unwrap();
        let second = Workspace::create_at(&source, &settings, fixed_time()).unwrap();
        assert_eq!(first.dir(), root.join("workspace").join("scans"));
        assert_eq!(
            second.dir(),
            root.join("workspace").join("scans_20240305_140709")
        );

        let reuse = WorkspaceSettings {
            create_timestamp_on_conflict: false,
            ..settings
        };
        let third = Workspace::create_at(&source, &reuse, fixed_time()).unwrap();
        assert_eq!(third.dir(), first.dir());
    }

    #[test]
    fn test_create_requires_source_dir() {
        let root = scratch_dir("ws_no_source");
        let err = Workspace::create(&root.join("missing"), &settings_in(&root)).unwrap_err();
        assert!(matches!(err, WorkspaceError::MissingSource(_)));
    }

    #[test]
    fn test_mask_naming() {
        let root = scratch_dir("ws_naming");
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        let mut settings = settings_in(&root);
        settings.naming_pattern = "seg_{basename}.png".to_string();
        let ws = Workspace::create(&source, &settings).unwrap();

        assert_eq!(
            ws.mask_path_for(Path::new("/data/us_001.jpg")),
            ws.mask_dir().join("seg_us_001.png")
        );
        assert_eq!(ws.existing_mask_for(Path::new("/data/us_001.jpg")), None);
    }

    #[test]
    fn test_save_copies_original_once() {
        let root = scratch_dir("ws_save");
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        let image = source.join("img.png");
        write_gray_png(&image, 8, 8, 10);
        let ws = Workspace::create(&source, &settings_in(&root)).unwrap();

        let mask = painted_mask(Size::new(8, 8));
        let saved = ws.save_mask_with_original(&image, &mask).unwrap();
        assert!(saved.copied_original);
        assert_eq!(saved.original, ws.original_dir().join("img.png"));
        assert_eq!(saved.mask, ws.mask_dir().join("img_mask.png"));
        assert_eq!(MaskStore::load(&saved.mask, Size::new(8, 8)).unwrap(), mask);
        assert_eq!(ws.existing_mask_for(&image), Some(saved.mask.clone()));

        let again = ws.save_mask_with_original(&image, &mask).unwrap();
        assert!(!again.copied_original);

        let leftovers: Vec<_> = fs::read_dir(ws.mask_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_mask_write_rolls_back_original() {
        let root = scratch_dir("ws_rollback");
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        let image = source.join("img.png");
        write_gray_png(&image, 4, 4, 10);
        let ws = Workspace::create(&source, &settings_in(&root)).unwrap();

        // A directory in the mask's place makes the final rename fail.
        fs::create_dir(ws.mask_path_for(&image)).unwrap();

        let mask = painted_mask(Size::new(4, 4));
        assert!(ws.save_mask_with_original(&image, &mask).is_err());
        assert!(!ws.original_dir().join("img.png").exists());
    }

    #[test]
    fn test_overwrite_disabled() {
        let root = scratch_dir("ws_no_overwrite");
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        let image = source.join("img.png");
        write_gray_png(&image, 4, 4, 10);
        let settings = WorkspaceSettings {
            overwrite_existing: false,
            ..settings_in(&root)
        };
        let ws = Workspace::create(&source, &settings).unwrap();
        let mask = painted_mask(Size::new(4, 4));

        ws.save_mask_with_original(&image, &mask).unwrap();
        assert!(matches!(
            ws.save_mask_with_original(&image, &mask),
            Err(WorkspaceError::MaskExists(_))
        ));
    }

    #[test]
    fn test_open_rehydrates_from_record() {
        let root = scratch_dir("ws_open");
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        write_gray_png(&source.join("a.png"), 4, 4, 1);
        let mut settings = settings_in(&root);
        settings.subdirs.mask = "Labels".to_string();
        let created = Workspace::create(&source, &settings).unwrap();

        let opened = Workspace::open(created.dir(), &settings_in(&root)).unwrap();
        assert_eq!(opened.source_dir(), source);
        assert_eq!(opened.mask_dir(), created.dir().join("Labels"));
        assert_eq!(opened.images().unwrap(), vec![source.join("a.png")]);
        assert_eq!(opened.info().source_directory_name, "src");
    }

    #[test]
    fn test_open_without_source_uses_originals() {
        let root = scratch_dir("ws_open_fallback");
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        let image = source.join("a.png");
        write_gray_png(&image, 4, 4, 1);
        let ws = Workspace::create(&source, &settings_in(&root)).unwrap();
        ws.save_mask_with_original(&image, &painted_mask(Size::new(4, 4)))
            .unwrap();
        fs::remove_dir_all(&source).unwrap();

        let opened = Workspace::open(ws.dir(), &settings_in(&root)).unwrap();
        assert_eq!(
            opened.images().unwrap(),
            vec![ws.original_dir().join("a.png")]
        );
    }

    #[test]
    fn test_corrupt_record() {
        let root = scratch_dir("ws_corrupt_record");
        let dir = root.join("ws");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(RECORD_FILE), "input_directory: [unclosed").unwrap();
        assert!(matches!(
            Workspace::open(&dir, &WorkspaceSettings::default()),
            Err(WorkspaceError::Record { .. })
        ));
    }
}
