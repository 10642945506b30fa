//! The model definition graph: the aggregate of optics, sequences and ranges.

use std::path::PathBuf;

use crate::domain::file::{ModelFile, ModelPathOffsets};
use crate::domain::machine::SequenceDefinition;
use crate::domain::optics::OpticsDefinition;

/// Where a model definition was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A plain directory tree on disk.
    Directory,
    /// A zip archive.
    Archive,
}

/// Information about the origin of a model definition. Kept so that exports
/// can reuse the original document file name and so that maintenance tooling
/// can locate the on-disk sources of model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInformation {
    pub kind: SourceKind,
    /// The directory of the sources, or the path of the archive.
    pub root_path: PathBuf,
    /// Name of the document file the definition was loaded from.
    pub file_name: String,
}

/// A named, versioned description of one accelerator configuration.
///
/// Logically immutable for the purposes of export: the tailoring pipeline
/// always operates on a clone, never on the caller's instance. Defaults are
/// stored as name references; the accessor methods resolve them against the
/// contained collections.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub name: String,
    pub init_files: Vec<ModelFile>,
    pub optics_definitions: Vec<OpticsDefinition>,
    /// Name of the default optics; must refer to one of `optics_definitions`
    /// whenever set.
    pub default_optics: Option<String>,
    pub sequence_definitions: Vec<SequenceDefinition>,
    /// Name of the default sequence; must refer to one of
    /// `sequence_definitions` whenever set.
    pub default_sequence: Option<String>,
    pub path_offsets: ModelPathOffsets,
    /// Not part of the persisted document; set by importers.
    pub source_information: Option<SourceInformation>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_files: Vec::new(),
            optics_definitions: Vec::new(),
            default_optics: None,
            sequence_definitions: Vec::new(),
            default_sequence: None,
            path_offsets: ModelPathOffsets::default(),
            source_information: None,
        }
    }

    pub fn optics_definition(&self, name: &str) -> Option<&OpticsDefinition> {
        self.optics_definitions.iter().find(|o| o.name == name)
    }

    pub fn sequence_definition(&self, name: &str) -> Option<&SequenceDefinition> {
        self.sequence_definitions.iter().find(|s| s.name == name)
    }

    pub fn default_optics_definition(&self) -> Option<&OpticsDefinition> {
        self.default_optics
            .as_deref()
            .and_then(|name| self.optics_definition(name))
    }

    pub fn default_sequence_definition(&self) -> Option<&SequenceDefinition> {
        self.default_sequence
            .as_deref()
            .and_then(|name| self.sequence_definition(name))
    }

    /// All files referenced by this definition, in reference order: the model
    /// init files, then per-optics files, then per-range post-use files.
    ///
    /// The same file may be yielded more than once when several optics or
    /// ranges reference it; deduplication (by archive path) is up to the
    /// caller, since it depends on the path composition of the finder.
    pub fn required_files(&self) -> impl Iterator<Item = &ModelFile> {
        self.init_files
            .iter()
            .chain(
                self.optics_definitions
                    .iter()
                    .flat_map(|optics| optics.required_files()),
            )
            .chain(self.sequence_definitions.iter().flat_map(|sequence| {
                sequence
                    .range_definitions
                    .iter()
                    .flat_map(|range| range.post_use_files.iter())
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::machine::RangeDefinition;

    #[test]
    fn required_files_walk_the_whole_graph_in_order() {
        let mut model = ModelDefinition::new("test");
        model.init_files.push(ModelFile::resource("init.madx"));
        model.optics_definitions.push(OpticsDefinition::new(
            "nominal",
            vec![ModelFile::repository("strengths.str")],
        ));
        let mut sequence = SequenceDefinition::new("ring");
        let mut range = RangeDefinition::new("all");
        range.post_use_files.push(ModelFile::resource("align.madx"));
        sequence.range_definitions.push(range);
        model.sequence_definitions.push(sequence);

        let names: Vec<&str> = model.required_files().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["init.madx", "strengths.str", "align.madx"]);
    }

    #[test]
    fn default_optics_resolves_by_name() {
        let mut model = ModelDefinition::new("test");
        model
            .optics_definitions
            .push(OpticsDefinition::new("nominal", vec![]));
        model
            .optics_definitions
            .push(OpticsDefinition::new("squeezed", vec![]));
        model.default_optics = Some("squeezed".into());
        assert_eq!(
            model.default_optics_definition().unwrap().name,
            "squeezed"
        );
    }
}
