//! Optics definitions: named variants of field-strength settings.

use crate::domain::file::ModelFile;

/// A named optics variant of a model. `init_files` are called when the optics
/// is loaded, `post_ptc_files` after the PTC universe is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpticsDefinition {
    pub name: String,
    /// An overlay optics only contains deltas on top of the currently loaded
    /// full optics.
    pub overlay: bool,
    pub init_files: Vec<ModelFile>,
    pub post_ptc_files: Vec<ModelFile>,
}

impl OpticsDefinition {
    pub fn new(name: impl Into<String>, init_files: Vec<ModelFile>) -> Self {
        Self {
            name: name.into(),
            overlay: false,
            init_files,
            post_ptc_files: Vec::new(),
        }
    }

    /// All files needed to load this optics, in reference order.
    pub fn required_files(&self) -> impl Iterator<Item = &ModelFile> {
        self.init_files.iter().chain(self.post_ptc_files.iter())
    }
}
