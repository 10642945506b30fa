//! Pluggable persistence of model definition documents, keyed by file
//! extension.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::se::Serializer;
use serde::Serialize;

use crate::domain::definition::ModelDefinition;
use crate::domain::errors::PersistError;
use crate::infra::document::ModelDefinitionDocument;

/// Extension used when a destination name matches no registered persister.
pub const DEFAULT_DOCUMENT_EXTENSION: &str = ".jmd.xml";
/// Extension appended to zip exports whose name carries no recognized one.
pub const ZIP_FILE_EXTENSION: &str = ".jmd.zip";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Saves and loads model definition documents in one concrete format.
pub trait ModelDefinitionPersister {
    /// The file extension of this format, including the leading dot.
    fn file_extension(&self) -> &'static str;

    /// Whether a file name belongs to this format.
    fn matches_file_name(&self, file_name: &str) -> bool {
        file_name.ends_with(self.file_extension())
    }

    fn save(&self, model: &ModelDefinition, out: &mut dyn Write) -> Result<(), PersistError>;

    fn load(&self, input: &mut dyn Read) -> Result<ModelDefinition, PersistError>;
}

/// XML persistence via the shared document model.
#[derive(Debug, Default)]
pub struct XmlPersister;

impl ModelDefinitionPersister for XmlPersister {
    fn file_extension(&self) -> &'static str {
        ".jmd.xml"
    }

    fn save(&self, model: &ModelDefinition, out: &mut dyn Write) -> Result<(), PersistError> {
        let document = ModelDefinitionDocument::from_model(model);
        let mut body = String::new();
        let mut serializer = Serializer::new(&mut body);
        serializer.indent(' ', 2);
        document.serialize(serializer)?;
        out.write_all(XML_DECLARATION.as_bytes())?;
        out.write_all(body.as_bytes())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn load(&self, input: &mut dyn Read) -> Result<ModelDefinition, PersistError> {
        let mut data = String::new();
        input.read_to_string(&mut data)?;
        let document: ModelDefinitionDocument = quick_xml::de::from_str(&data)?;
        document.into_model()
    }
}

/// JSON persistence via the shared document model.
#[derive(Debug, Default)]
pub struct JsonPersister;

impl ModelDefinitionPersister for JsonPersister {
    fn file_extension(&self) -> &'static str {
        ".jmd.json"
    }

    fn save(&self, model: &ModelDefinition, out: &mut dyn Write) -> Result<(), PersistError> {
        let document = ModelDefinitionDocument::from_model(model);
        serde_json::to_writer_pretty(&mut *out, &document)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn load(&self, input: &mut dyn Read) -> Result<ModelDefinition, PersistError> {
        let document: ModelDefinitionDocument = serde_json::from_reader(input)?;
        document.into_model()
    }
}

/// The default persister set: xml first (the default format), then json.
pub fn default_persisters() -> Vec<Box<dyn ModelDefinitionPersister>> {
    vec![Box::new(XmlPersister), Box::new(JsonPersister)]
}

/// Find the first persister recognizing the given file name.
pub fn find_persister<'a>(
    persisters: &'a [Box<dyn ModelDefinitionPersister>],
    file_name: &str,
) -> Option<&'a dyn ModelDefinitionPersister> {
    persisters
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.matches_file_name(file_name))
}

/// Derive a file-system friendly identifier from a model name: lowercased,
/// with anything outside `[a-z0-9._-]` collapsed to a dash.
pub fn proposed_id_string(model_name: &str) -> String {
    let mut id = String::with_capacity(model_name.len());
    for ch in model_name.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            id.push(ch);
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    id.trim_matches('-').to_string()
}

/// The default document file name for a model, in the default format.
pub fn proposed_default_file_name(model: &ModelDefinition) -> String {
    format!(
        "{}{}",
        proposed_id_string(&model.name),
        DEFAULT_DOCUMENT_EXTENSION
    )
}

/// Append the default zip extension unless the path already names a zip file.
pub fn ensure_zip_file_extension(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.to_lowercase().ends_with(".zip") {
        path.to_path_buf()
    } else {
        let mut name = name;
        name.push_str(ZIP_FILE_EXTENSION);
        path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::file::ModelFile;
    use crate::domain::machine::{RangeDefinition, SequenceDefinition, TwissInitialConditions};
    use crate::domain::optics::OpticsDefinition;

    fn sample_model() -> ModelDefinition {
        let mut model = ModelDefinition::new("Demo Ring 2024");
        model.init_files.push(ModelFile::resource("init.madx"));
        model.optics_definitions.push(OpticsDefinition::new(
            "nominal",
            vec![ModelFile::resource("nominal.str")],
        ));
        model.default_optics = Some("nominal".into());
        let mut sequence = SequenceDefinition::new("ring");
        let mut range = RangeDefinition::new("all");
        range.twiss = Some(TwissInitialConditions {
            betx: Some(4.999),
            bety: Some(5.0),
            calc_at_center: true,
            ..Default::default()
        });
        sequence.range_definitions.push(range);
        sequence.default_range = Some("all".into());
        model.sequence_definitions.push(sequence);
        model.default_sequence = Some("ring".into());
        model
    }

    #[test]
    fn xml_save_and_load_are_symmetric() {
        let model = sample_model();
        let mut buf = Vec::new();
        XmlPersister.save(&model, &mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<model-definition>"));

        let restored = XmlPersister.load(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn json_save_and_load_are_symmetric() {
        let model = sample_model();
        let mut buf = Vec::new();
        JsonPersister.save(&model, &mut buf).unwrap();
        let restored = JsonPersister.load(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn persisters_match_their_extensions() {
        let persisters = default_persisters();
        assert_eq!(
            find_persister(&persisters, "lhc.jmd.xml").unwrap().file_extension(),
            ".jmd.xml"
        );
        assert_eq!(
            find_persister(&persisters, "lhc.jmd.json").unwrap().file_extension(),
            ".jmd.json"
        );
        assert!(find_persister(&persisters, "lhc.zip").is_none());
        assert!(find_persister(&persisters, "lhc").is_none());
    }

    #[test]
    fn id_strings_are_file_system_friendly() {
        assert_eq!(proposed_id_string("Demo Ring 2024"), "demo-ring-2024");
        assert_eq!(proposed_id_string("  LHC (nominal)  "), "lhc-nominal");
    }

    #[test]
    fn zip_extension_is_appended_only_when_missing() {
        assert_eq!(
            ensure_zip_file_extension(Path::new("/tmp/model")),
            PathBuf::from("/tmp/model.jmd.zip")
        );
        assert_eq!(
            ensure_zip_file_extension(Path::new("/tmp/model.zip")),
            PathBuf::from("/tmp/model.zip")
        );
        assert_eq!(
            ensure_zip_file_extension(Path::new("/tmp/model.jmd.zip")),
            PathBuf::from("/tmp/model.jmd.zip")
        );
    }
}
