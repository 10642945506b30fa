//! Tailoring: pruning a model definition down to an export request.

use crate::app::request::ExportRequest;
use crate::domain::definition::ModelDefinition;
use crate::domain::errors::ExportError;

/// Produce a self-consistent copy of the request's model definition,
/// containing only the selected optics, sequences and ranges.
///
/// The caller's definition is never touched: all pruning happens on a deep
/// copy. Defaults that were pruned away (or were never set) are repaired to
/// the first remaining element of the corresponding collection, so the result
/// always satisfies the referential invariants of [`ModelDefinition`].
pub fn tailor(request: &ExportRequest<'_>) -> Result<ModelDefinition, ExportError> {
    let mut model = request.model().clone();

    model
        .optics_definitions
        .retain(|optics| request.exports_optics(&optics.name));
    model
        .sequence_definitions
        .retain(|sequence| request.exports_sequence(&sequence.name));
    for sequence in &mut model.sequence_definitions {
        let sequence_name = sequence.name.clone();
        sequence
            .range_definitions
            .retain(|range| request.exports_range(&sequence_name, &range.name));
    }
    model
        .sequence_definitions
        .retain(|sequence| !sequence.range_definitions.is_empty());

    if model.optics_definitions.is_empty() {
        return Err(ExportError::EmptyExport {
            collection: "optics definitions",
        });
    }
    if model.sequence_definitions.is_empty() {
        return Err(ExportError::EmptyExport {
            collection: "sequence definitions",
        });
    }
    // unreachable as long as empty sequences are dropped above, but the
    // guarantee is part of the contract
    if model
        .sequence_definitions
        .iter()
        .all(|sequence| sequence.range_definitions.is_empty())
    {
        return Err(ExportError::EmptyExport {
            collection: "range definitions",
        });
    }

    repair_defaults(&mut model);
    Ok(model)
}

/// Point every dangling or unset default at the first remaining element of
/// its collection. The pick is stable: model order decides, nothing else.
fn repair_defaults(model: &mut ModelDefinition) {
    if model.default_optics_definition().is_none() {
        model.default_optics = model
            .optics_definitions
            .first()
            .map(|optics| optics.name.clone());
    }
    if model.default_sequence_definition().is_none() {
        model.default_sequence = model
            .sequence_definitions
            .first()
            .map(|sequence| sequence.name.clone());
    }
    for sequence in &mut model.sequence_definitions {
        if sequence.default_range_definition().is_none() {
            sequence.default_range = sequence
                .range_definitions
                .first()
                .map(|range| range.name.clone());
        }
    }
}
