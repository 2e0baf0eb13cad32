//! On-disk fixtures: a throwaway server root with template worlds.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary server root holding a `templates/` directory and an empty
/// `worlds/` container. Removed when dropped.
#[derive(Debug)]
pub struct TemplateFixture {
    root: TempDir,
}

impl TemplateFixture {
    /// Creates the root with no templates.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directories cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("templates")).unwrap();
        fs::create_dir_all(root.path().join("worlds")).unwrap();
        Self { root }
    }

    /// Adds a template world called `name` with a level file, one region
    /// file and the host's lock and identity files.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    #[must_use]
    pub fn with_template(self, name: &str) -> Self {
        let dir = self.template_dir().join(name);
        fs::create_dir_all(dir.join("region")).unwrap();
        fs::write(dir.join("level.dat"), b"level").unwrap();
        fs::write(dir.join("region").join("r.0.0.mca"), b"region").unwrap();
        fs::write(dir.join("session.lock"), b"lock").unwrap();
        fs::write(dir.join("uid.dat"), b"uid").unwrap();
        self
    }

    /// Directory holding every template world.
    #[must_use]
    pub fn template_dir(&self) -> PathBuf {
        self.root.path().join("templates")
    }

    /// Container directory instance worlds are copied into.
    #[must_use]
    pub fn world_container(&self) -> PathBuf {
        self.root.path().join("worlds")
    }

    /// The fixture root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

impl Default for TemplateFixture {
    fn default() -> Self {
        Self::new()
    }
}
