//! Export requests: immutable selections of what to export from a model.

use std::collections::BTreeSet;

use crate::domain::definition::ModelDefinition;
use crate::domain::machine::{RangeDefinition, SequenceDefinition};
use crate::domain::optics::OpticsDefinition;

/// A request to export particular optics and ranges of a model definition.
///
/// Sequences are never selected directly; the sequences to export are derived
/// from the selected ranges. Requests are created through the builder
/// ([`ExportRequest::build_from`]) or wholesale via
/// [`ExportRequest::all_from`], and are immutable once built.
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    model: &'a ModelDefinition,
    optics: BTreeSet<String>,
    /// Selected ranges as (sequence name, range name) pairs.
    ranges: BTreeSet<(String, String)>,
}

impl<'a> ExportRequest<'a> {
    /// Request to export all optics, sequences and ranges of the model.
    pub fn all_from(model: &'a ModelDefinition) -> Self {
        Self::build_from(model)
            .export_all_optics()
            .export_all_ranges()
            .build()
    }

    /// Start building a partial export request for the given model.
    pub fn build_from(model: &'a ModelDefinition) -> ExportRequestBuilder<'a> {
        ExportRequestBuilder {
            model,
            optics: BTreeSet::new(),
            ranges: BTreeSet::new(),
        }
    }

    pub fn model(&self) -> &'a ModelDefinition {
        self.model
    }

    pub fn exports_optics(&self, name: &str) -> bool {
        self.optics.contains(name)
    }

    pub fn exports_range(&self, sequence_name: &str, range_name: &str) -> bool {
        self.ranges
            .contains(&(sequence_name.to_string(), range_name.to_string()))
    }

    /// Whether any range of the given sequence is selected.
    pub fn exports_sequence(&self, sequence_name: &str) -> bool {
        self.ranges.iter().any(|(seq, _)| seq == sequence_name)
    }

    /// The selected optics, in model order.
    pub fn optics_to_export(&self) -> impl Iterator<Item = &'a OpticsDefinition> + '_ {
        self.model
            .optics_definitions
            .iter()
            .filter(|optics| self.optics.contains(&optics.name))
    }

    /// The sequences derived from the selected ranges, in model order.
    pub fn sequences_to_export(&self) -> impl Iterator<Item = &'a SequenceDefinition> + '_ {
        self.model
            .sequence_definitions
            .iter()
            .filter(|sequence| self.exports_sequence(&sequence.name))
    }

    /// The selected ranges of one sequence, in sequence order.
    pub fn ranges_to_export_of(
        &self,
        sequence: &'a SequenceDefinition,
    ) -> impl Iterator<Item = &'a RangeDefinition> + '_ {
        sequence
            .range_definitions
            .iter()
            .filter(move |range| self.exports_range(&sequence.name, &range.name))
    }
}

/// Builder for [`ExportRequest`].
#[derive(Debug)]
pub struct ExportRequestBuilder<'a> {
    model: &'a ModelDefinition,
    optics: BTreeSet<String>,
    ranges: BTreeSet<(String, String)>,
}

impl<'a> ExportRequestBuilder<'a> {
    /// Select all optics of the model.
    pub fn export_all_optics(mut self) -> Self {
        for optics in &self.model.optics_definitions {
            self.optics.insert(optics.name.clone());
        }
        self
    }

    /// Select a single optics definition.
    pub fn export_optics(mut self, optics: &OpticsDefinition) -> Self {
        self.optics.insert(optics.name.clone());
        self
    }

    /// Select all ranges of all sequences of the model.
    pub fn export_all_ranges(mut self) -> Self {
        for sequence in &self.model.sequence_definitions {
            for range in &sequence.range_definitions {
                self.ranges
                    .insert((sequence.name.clone(), range.name.clone()));
            }
        }
        self
    }

    /// Select all ranges of one sequence.
    pub fn export_all_ranges_from(mut self, sequence: &SequenceDefinition) -> Self {
        for range in &sequence.range_definitions {
            self.ranges
                .insert((sequence.name.clone(), range.name.clone()));
        }
        self
    }

    /// Select a single range of a sequence.
    pub fn export_range(mut self, sequence: &SequenceDefinition, range: &RangeDefinition) -> Self {
        self.ranges
            .insert((sequence.name.clone(), range.name.clone()));
        self
    }

    pub fn build(self) -> ExportRequest<'a> {
        ExportRequest {
            model: self.model,
            optics: self.optics,
            ranges: self.ranges,
        }
    }
}
