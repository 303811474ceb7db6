//! End-to-end tests over real files: workspace layout, session navigation
//! and mask persistence.

mod session_tests;

use std::path::{Path, PathBuf};

use crate::config::WorkspaceSettings;
use crate::test_support::{scratch_dir, write_gray_png};

/// A source folder of solid gray PNGs plus settings rooted next to it.
struct Fixture {
    source: PathBuf,
    settings: WorkspaceSettings,
}

impl Fixture {
    fn new(name: &str, images: &[&str], width: u32, height: u32) -> Self {
        let root = scratch_dir(name);
        let source = root.join("scans");
        std::fs::create_dir_all(&source).unwrap();
        for (i, image) in images.iter().enumerate() {
            write_gray_png(&source.join(image), width, height, 40 + 60 * i as u8);
        }
        let settings = WorkspaceSettings {
            workspace_root: root.join("workspace"),
            ..Default::default()
        };
        Self { source, settings }
    }

    fn image(&self, name: &str) -> PathBuf {
        self.source.join(name)
    }

    fn source(&self) -> &Path {
        &self.source
    }
}
