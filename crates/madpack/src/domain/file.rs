//! Descriptions of files referenced by model definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default path prefix for repository files inside archives and resources.
pub const DEFAULT_REPOSITORY_PREFIX: &str = "repdata";
/// Default path prefix for resource files inside archives and resources.
pub const DEFAULT_RESOURCE_PREFIX: &str = "resdata";

/// Where a model file has to be searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFileLocation {
    /// The file lives in the shared model repository on disk. If it cannot be
    /// found there, the copy inside the archive/resources is used.
    Repository,
    /// The file is bundled with the model package itself and is always taken
    /// from the archive/resources.
    Resource,
}

impl ModelFileLocation {
    /// The per-model path offset for this location, if configured.
    pub fn path_offset(self, offsets: &ModelPathOffsets) -> Option<&str> {
        match self {
            ModelFileLocation::Repository => offsets.repository_offset.as_deref(),
            ModelFileLocation::Resource => offsets.resource_offset.as_deref(),
        }
    }

    /// The prefix under which files of this location are stored inside
    /// archives and exported directory trees.
    pub fn resource_prefix(self, offsets: &ModelPathOffsets) -> &str {
        match self {
            ModelFileLocation::Repository => offsets
                .repository_prefix
                .as_deref()
                .unwrap_or(DEFAULT_REPOSITORY_PREFIX),
            ModelFileLocation::Resource => offsets
                .resource_prefix
                .as_deref()
                .unwrap_or(DEFAULT_RESOURCE_PREFIX),
        }
    }
}

impl fmt::Display for ModelFileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFileLocation::Repository => write!(f, "repository"),
            ModelFileLocation::Resource => write!(f, "resource"),
        }
    }
}

/// A purely descriptive reference to a file used by a model. Carries no I/O;
/// resolution to actual bytes is the job of the file finder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub location: ModelFileLocation,
}

impl ModelFile {
    pub fn repository(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: ModelFileLocation::Repository,
        }
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: ModelFileLocation::Resource,
        }
    }
}

/// Per-model-definition path prefixes. The offsets are relative paths below
/// the repository root (repository offset) or inside the archive (resource
/// offset). Unset prefixes fall back to [`DEFAULT_REPOSITORY_PREFIX`] and
/// [`DEFAULT_RESOURCE_PREFIX`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPathOffsets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_fall_back_to_defaults_when_unset() {
        let offsets = ModelPathOffsets::default();
        assert_eq!(
            ModelFileLocation::Repository.resource_prefix(&offsets),
            "repdata"
        );
        assert_eq!(
            ModelFileLocation::Resource.resource_prefix(&offsets),
            "resdata"
        );
    }

    #[test]
    fn configured_prefix_wins_over_default() {
        let offsets = ModelPathOffsets {
            resource_prefix: Some("bundled".into()),
            ..Default::default()
        };
        assert_eq!(
            ModelFileLocation::Resource.resource_prefix(&offsets),
            "bundled"
        );
        // the repository prefix stays at its default
        assert_eq!(
            ModelFileLocation::Repository.resource_prefix(&offsets),
            "repdata"
        );
    }

    #[test]
    fn model_files_compare_by_name_and_location() {
        assert_eq!(ModelFile::resource("a.madx"), ModelFile::resource("a.madx"));
        assert_ne!(
            ModelFile::resource("a.madx"),
            ModelFile::repository("a.madx")
        );
    }
}
