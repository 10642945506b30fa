//! Sequences, ranges and the beam/twiss records attached to them.

use serde::{Deserialize, Serialize};

use crate::domain::file::ModelFile;

/// Element bounds of a range within a sequence, in MAD-X notation. `#s` and
/// `#e` denote the start and end of the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MadxRange {
    pub first: String,
    pub last: String,
}

impl MadxRange {
    pub fn full() -> Self {
        Self {
            first: "#s".into(),
            last: "#e".into(),
        }
    }

    pub fn between(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }
}

impl Default for MadxRange {
    fn default() -> Self {
        Self::full()
    }
}

/// Attributes of the particle beam of a sequence. All fields are optional;
/// only set attributes end up in the generated beam command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge: Option<f64>,
    /// Total energy per particle in GeV.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    /// Momentum per particle in GeV/c (MAD-X `pc`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    /// Horizontal emittance (MAD-X `ex`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_emittance: Option<f64>,
    /// Vertical emittance (MAD-X `ey`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_emittance: Option<f64>,
    /// Relative momentum spread (MAD-X `sige`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_spread: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bunch_length: Option<f64>,
    /// Direction of travel, +1 or -1 (MAD-X `bv`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<i32>,
}

/// Initial conditions for a twiss computation at the start of a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwissInitialConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub betx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alfx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bety: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alfy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deltap: Option<f64>,
    /// Compute the optics functions at the centers of the elements instead of
    /// at their ends.
    #[serde(default)]
    pub calc_at_center: bool,
    /// Close the machine: compute the periodic solution instead of using the
    /// initial conditions.
    #[serde(default)]
    pub closed_orbit: bool,
}

/// Filter on element names, used to mark monitors or correctors whose
/// readings have to be inverted for this range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    /// Regular-expression-like pattern on the element name.
    pub pattern: String,
    /// The plane the filter applies to (`H`, `V` or empty for both).
    #[serde(default)]
    pub plane: String,
}

/// A named sub-interval of a sequence, together with everything needed to
/// activate it: the element bounds, files to call after `use`, twiss initial
/// conditions and measurement-inversion filters.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDefinition {
    pub name: String,
    pub madx_range: MadxRange,
    pub twiss: Option<TwissInitialConditions>,
    pub post_use_files: Vec<ModelFile>,
    pub monitor_invert_filters: Vec<NameFilter>,
    pub corrector_invert_filters: Vec<NameFilter>,
}

impl RangeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            madx_range: MadxRange::full(),
            twiss: None,
            post_use_files: Vec::new(),
            monitor_invert_filters: Vec::new(),
            corrector_invert_filters: Vec::new(),
        }
    }
}

/// A named section of the machine, carrying its beam, its ranges and the
/// name of the default range.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceDefinition {
    pub name: String,
    pub beam: Option<Beam>,
    pub range_definitions: Vec<RangeDefinition>,
    /// Name of the default range; must refer to one of `range_definitions`
    /// whenever set.
    pub default_range: Option<String>,
}

impl SequenceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            beam: None,
            range_definitions: Vec::new(),
            default_range: None,
        }
    }

    /// Look up a range by name.
    pub fn range_definition(&self, name: &str) -> Option<&RangeDefinition> {
        self.range_definitions.iter().find(|r| r.name == name)
    }

    /// The default range, resolved against the contained ranges.
    pub fn default_range_definition(&self) -> Option<&RangeDefinition> {
        self.default_range
            .as_deref()
            .and_then(|name| self.range_definition(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_range_resolves_by_name() {
        let mut sequence = SequenceDefinition::new("ring");
        sequence.range_definitions.push(RangeDefinition::new("all"));
        sequence.range_definitions.push(RangeDefinition::new("arc"));
        sequence.default_range = Some("arc".into());

        let range = sequence.default_range_definition().unwrap();
        assert_eq!(range.name, "arc");
    }

    #[test]
    fn dangling_default_range_resolves_to_none() {
        let mut sequence = SequenceDefinition::new("ring");
        sequence.range_definitions.push(RangeDefinition::new("all"));
        sequence.default_range = Some("gone".into());
        assert!(sequence.default_range_definition().is_none());
    }
}
