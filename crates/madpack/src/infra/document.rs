//! The persisted document model for model definitions.
//!
//! An explicit, versioned mapping between the domain graph and its on-disk
//! representation. The same record structs drive both the xml and the json
//! persister, keeping marshal and unmarshal symmetric and statically checked.
//! Defaults are stored as name references and re-resolved (and validated)
//! when a document is turned back into a [`ModelDefinition`].

use serde::{Deserialize, Serialize};

use crate::domain::definition::ModelDefinition;
use crate::domain::errors::PersistError;
use crate::domain::file::{ModelFile, ModelPathOffsets};
use crate::domain::machine::{
    Beam, MadxRange, NameFilter, RangeDefinition, SequenceDefinition, TwissInitialConditions,
};
use crate::domain::optics::OpticsDefinition;

/// Version written into every document. Bump when the mapping below changes
/// incompatibly.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "model-definition", rename_all = "kebab-case")]
pub struct ModelDefinitionDocument {
    pub version: u32,
    pub name: String,
    #[serde(default, rename = "init-file", skip_serializing_if = "Vec::is_empty")]
    pub init_files: Vec<ModelFile>,
    #[serde(default, rename = "optic", skip_serializing_if = "Vec::is_empty")]
    pub optics: Vec<OpticsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_optic: Option<String>,
    #[serde(default, rename = "sequence", skip_serializing_if = "Vec::is_empty")]
    pub sequences: Vec<SequenceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "path_offsets_unset")]
    pub path_offsets: ModelPathOffsets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OpticsRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub overlay: bool,
    #[serde(default, rename = "init-file", skip_serializing_if = "Vec::is_empty")]
    pub init_files: Vec<ModelFile>,
    #[serde(default, rename = "post-ptc-file", skip_serializing_if = "Vec::is_empty")]
    pub post_ptc_files: Vec<ModelFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SequenceRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam: Option<Beam>,
    #[serde(default, rename = "range", skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<RangeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RangeRecord {
    pub name: String,
    #[serde(default)]
    pub madx_range: MadxRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twiss: Option<TwissInitialConditions>,
    #[serde(default, rename = "post-use-file", skip_serializing_if = "Vec::is_empty")]
    pub post_use_files: Vec<ModelFile>,
    #[serde(
        default,
        rename = "monitor-invert-filter",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub monitor_invert_filters: Vec<NameFilter>,
    #[serde(
        default,
        rename = "corrector-invert-filter",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub corrector_invert_filters: Vec<NameFilter>,
}

fn path_offsets_unset(offsets: &ModelPathOffsets) -> bool {
    *offsets == ModelPathOffsets::default()
}

impl ModelDefinitionDocument {
    /// Map a model definition into its document representation.
    pub fn from_model(model: &ModelDefinition) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            name: model.name.clone(),
            init_files: model.init_files.clone(),
            optics: model
                .optics_definitions
                .iter()
                .map(|optics| OpticsRecord {
                    name: optics.name.clone(),
                    overlay: optics.overlay,
                    init_files: optics.init_files.clone(),
                    post_ptc_files: optics.post_ptc_files.clone(),
                })
                .collect(),
            default_optic: model.default_optics.clone(),
            sequences: model
                .sequence_definitions
                .iter()
                .map(|sequence| SequenceRecord {
                    name: sequence.name.clone(),
                    beam: sequence.beam.clone(),
                    ranges: sequence
                        .range_definitions
                        .iter()
                        .map(|range| RangeRecord {
                            name: range.name.clone(),
                            madx_range: range.madx_range.clone(),
                            twiss: range.twiss.clone(),
                            post_use_files: range.post_use_files.clone(),
                            monitor_invert_filters: range.monitor_invert_filters.clone(),
                            corrector_invert_filters: range.corrector_invert_filters.clone(),
                        })
                        .collect(),
                    default_range: sequence.default_range.clone(),
                })
                .collect(),
            default_sequence: model.default_sequence.clone(),
            path_offsets: model.path_offsets.clone(),
        }
    }

    /// Turn the document back into a model definition, validating the version,
    /// name uniqueness and all default name references.
    pub fn into_model(self) -> Result<ModelDefinition, PersistError> {
        if self.version > DOCUMENT_VERSION {
            return Err(PersistError::UnsupportedVersion {
                found: self.version,
                supported: DOCUMENT_VERSION,
            });
        }

        check_unique("optics", self.optics.iter().map(|o| o.name.as_str()))?;
        check_unique("sequence", self.sequences.iter().map(|s| s.name.as_str()))?;

        if let Some(name) = &self.default_optic
            && !self.optics.iter().any(|o| &o.name == name)
        {
            return Err(dangling_ref("default optic", name));
        }
        if let Some(name) = &self.default_sequence
            && !self.sequences.iter().any(|s| &s.name == name)
        {
            return Err(dangling_ref("default sequence", name));
        }
        for sequence in &self.sequences {
            if let Some(name) = &sequence.default_range
                && !sequence.ranges.iter().any(|r| &r.name == name)
            {
                return Err(dangling_ref("default range", name));
            }
        }

        Ok(ModelDefinition {
            name: self.name,
            init_files: self.init_files,
            optics_definitions: self
                .optics
                .into_iter()
                .map(|record| OpticsDefinition {
                    name: record.name,
                    overlay: record.overlay,
                    init_files: record.init_files,
                    post_ptc_files: record.post_ptc_files,
                })
                .collect(),
            default_optics: self.default_optic,
            sequence_definitions: self
                .sequences
                .into_iter()
                .map(|record| SequenceDefinition {
                    name: record.name,
                    beam: record.beam,
                    range_definitions: record
                        .ranges
                        .into_iter()
                        .map(|range| RangeDefinition {
                            name: range.name,
                            madx_range: range.madx_range,
                            twiss: range.twiss,
                            post_use_files: range.post_use_files,
                            monitor_invert_filters: range.monitor_invert_filters,
                            corrector_invert_filters: range.corrector_invert_filters,
                        })
                        .collect(),
                    default_range: record.default_range,
                })
                .collect(),
            default_sequence: self.default_sequence,
            path_offsets: self.path_offsets,
            source_information: None,
        })
    }
}

fn check_unique<'a>(
    what: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), PersistError> {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(PersistError::InvalidDocument {
                reason: format!("duplicate {what} name '{name}'"),
            });
        }
    }
    Ok(())
}

fn dangling_ref(what: &str, name: &str) -> PersistError {
    PersistError::InvalidDocument {
        reason: format!("{what} '{name}' does not refer to a contained element"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::file::ModelFile;

    fn sample_model() -> ModelDefinition {
        let mut model = ModelDefinition::new("demo");
        model.init_files.push(ModelFile::resource("init.madx"));
        model.optics_definitions.push(OpticsDefinition::new(
            "nominal",
            vec![ModelFile::resource("nominal.str")],
        ));
        model.default_optics = Some("nominal".into());
        let mut sequence = SequenceDefinition::new("ring");
        sequence.range_definitions.push(RangeDefinition::new("all"));
        sequence.default_range = Some("all".into());
        model.sequence_definitions.push(sequence);
        model.default_sequence = Some("ring".into());
        model
    }

    #[test]
    fn document_round_trips_the_model_graph() {
        let model = sample_model();
        let document = ModelDefinitionDocument::from_model(&model);
        let restored = document.into_model().unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn dangling_default_optic_is_rejected() {
        let mut document = ModelDefinitionDocument::from_model(&sample_model());
        document.default_optic = Some("missing".into());
        let err = document.into_model().unwrap_err();
        assert!(matches!(err, PersistError::InvalidDocument { .. }));
    }

    #[test]
    fn newer_document_versions_are_rejected() {
        let mut document = ModelDefinitionDocument::from_model(&sample_model());
        document.version = DOCUMENT_VERSION + 1;
        let err = document.into_model().unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion { .. }));
    }

    #[test]
    fn duplicate_optics_names_are_rejected() {
        let mut document = ModelDefinitionDocument::from_model(&sample_model());
        document.optics.push(OpticsRecord {
            name: "nominal".into(),
            overlay: false,
            init_files: vec![],
            post_ptc_files: vec![],
        });
        let err = document.into_model().unwrap_err();
        assert!(matches!(err, PersistError::InvalidDocument { .. }));
    }
}
