//! Generation of re-playable MAD-X scripts from export requests.
//!
//! The script is an alternative textual export of the same tailored
//! selection the archive exporter writes: every exported optics, sequence
//! and range appears, but only the blocks belonging to the tailored defaults
//! are active. Non-default blocks are kept as comments so the script stays
//! readable and editable by hand.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::request::ExportRequest;
use crate::app::tailor::tailor;
use crate::domain::errors::{ExportError, PersistError};
use crate::domain::machine::{Beam, RangeDefinition, SequenceDefinition, TwissInitialConditions};
use crate::domain::optics::OpticsDefinition;
use crate::infra::finder::ModelFileFinder;
use crate::infra::persist::proposed_id_string;

/// File name of the twiss table written by generated scripts.
const TWISS_OUTPUT_FILE: &str = "twiss.tfs";

/// Write a single procedural script for the request to the given stream.
///
/// The request is tailored first; the commented/active decision is made
/// against the *tailored* defaults, so a selection that excludes the
/// original default optics produces a script whose active block is the
/// repaired one. File references are emitted as archive paths obtained from
/// the finder, matching the layout of a directory or zip export placed next
/// to the script.
pub fn write_script(
    request: &ExportRequest<'_>,
    finder: &ModelFileFinder,
    out: &mut dyn Write,
) -> Result<(), ExportError> {
    let tailored = tailor(request)?;
    write_tailored_script(&tailored, finder, out).map_err(PersistError::from)?;
    Ok(())
}

fn write_tailored_script(
    tailored: &crate::domain::definition::ModelDefinition,
    finder: &ModelFileFinder,
    out: &mut dyn Write,
) -> io::Result<()> {
    let mut script = MadxScript::new(out);
    script.header(&tailored.name)?;
    init_section(&mut script, finder, &tailored.init_files)?;
    optics_sections(
        &mut script,
        finder,
        &tailored.optics_definitions,
        tailored.default_optics.as_deref(),
    )?;
    sequence_sections(
        &mut script,
        finder,
        &tailored.sequence_definitions,
        tailored.default_sequence.as_deref(),
    )
}

/// Write one standalone optics script per exported optics into an existing
/// directory, named `<optics-id>.madx`. Each script only loads that optics:
/// a header, then the optics' file calls, all active. Returns the written
/// paths in model order.
pub fn write_optics_scripts(
    request: &ExportRequest<'_>,
    finder: &ModelFileFinder,
    directory: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    let tailored = tailor(request)?;
    let mut written = Vec::with_capacity(tailored.optics_definitions.len());

    for optics in &tailored.optics_definitions {
        let path = directory.join(format!("{}.madx", proposed_id_string(&optics.name)));
        let mut out = File::create(&path).map_err(|err| ExportError::PartialWrite {
            path: path.clone(),
            source: err,
        })?;

        write_optics_script(optics, &tailored.name, finder, &mut out)
            .map_err(PersistError::from)?;

        tracing::debug!(optics = %optics.name, path = %path.display(), "wrote optics script");
        written.push(path);
    }
    Ok(written)
}

fn write_optics_script(
    optics: &OpticsDefinition,
    model_name: &str,
    finder: &ModelFileFinder,
    out: &mut dyn Write,
) -> io::Result<()> {
    let mut script = MadxScript::new(out);
    script.comment(&format!(
        "optics '{}' of model '{model_name}'\ngenerated at {}",
        optics.name,
        timestamp()
    ))?;
    script.blank()?;
    for file in optics.required_files() {
        script.call(&finder.archive_path(file))?;
    }
    Ok(())
}

fn init_section(
    script: &mut MadxScript<'_>,
    finder: &ModelFileFinder,
    init_files: &[crate::domain::file::ModelFile],
) -> io::Result<()> {
    for file in init_files {
        script.call(&finder.archive_path(file))?;
    }
    script.blank()
}

fn optics_sections(
    script: &mut MadxScript<'_>,
    finder: &ModelFileFinder,
    optics_definitions: &[OpticsDefinition],
    default_optics: Option<&str>,
) -> io::Result<()> {
    for optics in optics_definitions {
        script.comment(&format!("optics: {}", optics.name))?;
        script.set_commented(Some(optics.name.as_str()) != default_optics);
        for file in optics.required_files() {
            script.call(&finder.archive_path(file))?;
        }
        script.set_commented(false);
        script.blank()?;
    }
    Ok(())
}

fn sequence_sections(
    script: &mut MadxScript<'_>,
    finder: &ModelFileFinder,
    sequences: &[SequenceDefinition],
    default_sequence: Option<&str>,
) -> io::Result<()> {
    for sequence in sequences {
        let sequence_is_default = Some(sequence.name.as_str()) == default_sequence;
        script.comment(&format!("sequence: {}", sequence.name))?;
        script.set_commented(!sequence_is_default);
        if let Some(beam) = &sequence.beam {
            script.command(&beam_command(beam))?;
        }
        for range in &sequence.range_definitions {
            let range_is_default =
                Some(range.name.as_str()) == sequence.default_range.as_deref();
            script.set_commented(!(sequence_is_default && range_is_default));
            range_section(script, finder, sequence, range)?;
            script.set_commented(!sequence_is_default);
        }
        script.set_commented(false);
        script.blank()?;
    }
    Ok(())
}

fn range_section(
    script: &mut MadxScript<'_>,
    finder: &ModelFileFinder,
    sequence: &SequenceDefinition,
    range: &RangeDefinition,
) -> io::Result<()> {
    script.command(&format!(
        "use, period={}, range={}/{};",
        sequence.name, range.madx_range.first, range.madx_range.last
    ))?;
    for file in &range.post_use_files {
        script.call(&finder.archive_path(file))?;
    }
    if let Some(twiss) = &range.twiss {
        script.command(&twiss_command(twiss))?;
    }
    Ok(())
}

fn beam_command(beam: &Beam) -> String {
    let mut attributes = Vec::new();
    if let Some(particle) = &beam.particle {
        attributes.push(format!("particle={particle}"));
    }
    push_attr(&mut attributes, "mass", beam.mass);
    push_attr(&mut attributes, "charge", beam.charge);
    push_attr(&mut attributes, "energy", beam.energy);
    push_attr(&mut attributes, "pc", beam.momentum);
    push_attr(&mut attributes, "gamma", beam.gamma);
    push_attr(&mut attributes, "ex", beam.horizontal_emittance);
    push_attr(&mut attributes, "ey", beam.vertical_emittance);
    push_attr(&mut attributes, "sige", beam.energy_spread);
    push_attr(&mut attributes, "sigt", beam.bunch_length);
    if let Some(direction) = beam.direction {
        attributes.push(format!("bv={direction}"));
    }
    command_with("beam", attributes)
}

fn twiss_command(twiss: &TwissInitialConditions) -> String {
    let mut attributes = Vec::new();
    push_attr(&mut attributes, "betx", twiss.betx);
    push_attr(&mut attributes, "alfx", twiss.alfx);
    push_attr(&mut attributes, "bety", twiss.bety);
    push_attr(&mut attributes, "alfy", twiss.alfy);
    push_attr(&mut attributes, "dx", twiss.dx);
    push_attr(&mut attributes, "dpx", twiss.dpx);
    push_attr(&mut attributes, "dy", twiss.dy);
    push_attr(&mut attributes, "dpy", twiss.dpy);
    push_attr(&mut attributes, "deltap", twiss.deltap);
    if twiss.calc_at_center {
        attributes.push("centre".to_string());
    }
    attributes.push(format!("file=\"{TWISS_OUTPUT_FILE}\""));
    command_with("twiss", attributes)
}

fn push_attr(attributes: &mut Vec<String>, name: &str, value: Option<f64>) {
    if let Some(value) = value {
        attributes.push(format!("{name}={value}"));
    }
}

fn command_with(keyword: &str, attributes: Vec<String>) -> String {
    if attributes.is_empty() {
        format!("{keyword};")
    } else {
        format!("{keyword}, {};", attributes.join(", "))
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Line-oriented writer with an explicit commented/active state.
///
/// Initial state is active. Every command and comment ends in a newline; a
/// blank separator is therefore exactly two newlines. While commented, each
/// emitted line (including every line of a multi-line command) carries the
/// `"! "` prefix.
struct MadxScript<'w> {
    out: &'w mut dyn Write,
    commented: bool,
}

const COMMENT_PREFIX: &str = "! ";

impl<'w> MadxScript<'w> {
    fn new(out: &'w mut dyn Write) -> Self {
        Self {
            out,
            commented: false,
        }
    }

    fn set_commented(&mut self, commented: bool) {
        self.commented = commented;
    }

    fn header(&mut self, model_name: &str) -> io::Result<()> {
        self.comment(&format!(
            "MAD-X script for model '{model_name}'\ngenerated at {}\nnon-default blocks are retained as comments",
            timestamp()
        ))?;
        self.blank()
    }

    /// An always-commented line, independent of the current state.
    fn comment(&mut self, text: &str) -> io::Result<()> {
        for line in text.split('\n') {
            writeln!(self.out, "{COMMENT_PREFIX}{line}")?;
        }
        Ok(())
    }

    /// A command line; commented out while the state is commented.
    fn command(&mut self, text: &str) -> io::Result<()> {
        if self.commented {
            self.comment(text)
        } else {
            for line in text.split('\n') {
                writeln!(self.out, "{line}")?;
            }
            Ok(())
        }
    }

    fn call(&mut self, archive_path: &str) -> io::Result<()> {
        self.command(&format!("call, file=\"{archive_path}\";"))
    }

    fn blank(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use crate::domain::definition::ModelDefinition;
    use crate::domain::file::{ModelFile, ModelPathOffsets};
    use crate::infra::source::ModelSource;

    fn finder() -> ModelFileFinder {
        ModelFileFinder::new(
            ModelPathOffsets::default(),
            ModelSource::memory(BTreeMap::new()),
        )
    }

    /// Optics {nominal, squeezed (default)}; sequence "ring" with beam and
    /// ranges {all (default), arc}.
    fn ring_model() -> ModelDefinition {
        let mut model = ModelDefinition::new("ring-2024");
        model.init_files.push(ModelFile::resource("init.madx"));
        model.optics_definitions.push(OpticsDefinition::new(
            "nominal",
            vec![ModelFile::resource("nominal.str")],
        ));
        model.optics_definitions.push(OpticsDefinition::new(
            "squeezed",
            vec![ModelFile::resource("squeezed.str")],
        ));
        model.default_optics = Some("squeezed".into());
        let mut sequence = SequenceDefinition::new("ring");
        sequence.beam = Some(Beam {
            particle: Some("proton".into()),
            energy: Some(450.0),
            ..Default::default()
        });
        let mut all = RangeDefinition::new("all");
        all.twiss = Some(TwissInitialConditions {
            betx: Some(0.5),
            bety: Some(0.5),
            ..Default::default()
        });
        sequence.range_definitions.push(all);
        sequence.range_definitions.push(RangeDefinition::new("arc"));
        sequence.default_range = Some("all".into());
        model.sequence_definitions.push(sequence);
        model.default_sequence = Some("ring".into());
        model
    }

    fn generate(model: &ModelDefinition) -> String {
        let request = ExportRequest::all_from(model);
        let mut out = Vec::new();
        write_script(&request, &finder(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn default_optics_block_is_active_others_are_commented() {
        let script = generate(&ring_model());
        assert!(script.contains("\ncall, file=\"resdata/squeezed.str\";\n"));
        assert!(script.contains("\n! call, file=\"resdata/nominal.str\";\n"));
    }

    #[test]
    fn init_files_are_always_active() {
        let script = generate(&ring_model());
        assert!(script.contains("\ncall, file=\"resdata/init.madx\";\n"));
    }

    #[test]
    fn default_range_is_active_and_others_commented() {
        let script = generate(&ring_model());
        assert!(script.contains("\nuse, period=ring, range=#s/#e;\n"));
        assert!(script.contains("! use, period=ring, range=#s/#e;"));
        assert!(script.contains("\ntwiss, betx=0.5, bety=0.5, file=\"twiss.tfs\";\n"));
    }

    #[test]
    fn beam_is_active_for_the_default_sequence() {
        let script = generate(&ring_model());
        assert!(script.contains("\nbeam, particle=proton, energy=450;\n"));
    }

    #[test]
    fn commented_state_does_not_leak_across_blocks() {
        let mut model = ring_model();
        // second sequence, not the default: everything in it is commented
        let mut injection = SequenceDefinition::new("injection");
        injection
            .range_definitions
            .push(RangeDefinition::new("all"));
        injection.default_range = Some("all".into());
        model.sequence_definitions.insert(0, injection);

        let script = generate(&model);
        assert!(script.contains("! use, period=injection, range=#s/#e;"));
        // the default sequence that follows is back to active
        assert!(script.contains("\nuse, period=ring, range=#s/#e;\n"));
    }

    #[test]
    fn multi_line_comments_repeat_the_prefix() {
        let mut out = Vec::new();
        let mut script = MadxScript::new(&mut out);
        script.comment("first\nsecond").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "! first\n! second\n");
    }

    #[test]
    fn commenting_follows_the_tailored_defaults() {
        let mut model = ring_model();
        model.default_optics = Some("nominal".into());

        // excluding the default leaves "squeezed" as the repaired default
        let squeezed = model.optics_definition("squeezed").unwrap();
        let request = ExportRequest::build_from(&model)
            .export_optics(squeezed)
            .export_all_ranges()
            .build();
        let mut out = Vec::new();
        write_script(&request, &finder(), &mut out).unwrap();
        let script = String::from_utf8(out).unwrap();

        assert!(script.contains("\ncall, file=\"resdata/squeezed.str\";\n"));
        assert!(!script.contains("nominal.str"));
    }

    #[test]
    fn optics_scripts_are_written_one_per_optics() {
        let model = ring_model();
        let request = ExportRequest::all_from(&model);
        let dir = tempfile::tempdir().unwrap();

        let written = write_optics_scripts(&request, &finder(), dir.path()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["nominal.madx", "squeezed.madx"]);

        let nominal = std::fs::read_to_string(&written[0]).unwrap();
        assert!(nominal.contains("call, file=\"resdata/nominal.str\";"));
        assert!(!nominal.contains("squeezed.str"));
    }
}
