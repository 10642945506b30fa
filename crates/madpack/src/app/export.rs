//! Exporting tailored model definitions as directory trees or zip archives.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::app::request::ExportRequest;
use crate::app::tailor::tailor;
use crate::domain::definition::ModelDefinition;
use crate::domain::errors::ExportError;
use crate::domain::file::ModelFile;
use crate::infra::finder::ModelFileFinder;
use crate::infra::persist::{
    DEFAULT_DOCUMENT_EXTENSION, ModelDefinitionPersister, ensure_zip_file_extension,
    find_persister, proposed_default_file_name, proposed_id_string,
};

/// Writes tailored model definitions plus all their required files.
///
/// All collaborators are explicit: the persisters define which document
/// formats are written (and which destination names are recognized), the
/// finder supplies byte content and archive paths for the model the exporter
/// is scoped to.
pub struct ModelDefinitionExporter {
    persisters: Vec<Box<dyn ModelDefinitionPersister>>,
    finder: ModelFileFinder,
}

impl ModelDefinitionExporter {
    pub fn new(persisters: Vec<Box<dyn ModelDefinitionPersister>>, finder: ModelFileFinder) -> Self {
        Self { persisters, finder }
    }

    /// Export with the default persister set (xml + json).
    pub fn with_default_persisters(finder: ModelFileFinder) -> Self {
        Self::new(crate::infra::persist::default_persisters(), finder)
    }

    pub fn finder(&self) -> &ModelFileFinder {
        &self.finder
    }

    /// Export the requested subset to the given destination.
    ///
    /// The destination decides the artifact kind: an existing directory, or a
    /// name matching a recognized document extension, yields a directory
    /// tree; anything else yields a zip archive (with the default zip
    /// extension appended when the name carries no recognized one). Returns
    /// the path of the written document or archive.
    pub fn export(
        &self,
        request: &ExportRequest<'_>,
        destination: &Path,
    ) -> Result<PathBuf, ExportError> {
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if destination.is_dir() || find_persister(&self.persisters, &file_name).is_some() {
            self.export_as_files(request, destination)
        } else {
            self.export_as_zip(request, destination)
        }
    }

    /// Export as a directory tree: the definition document at the
    /// destination, every required file at its archive-relative path.
    pub fn export_as_files(
        &self,
        request: &ExportRequest<'_>,
        destination: &Path,
    ) -> Result<PathBuf, ExportError> {
        let tailored = tailor(request)?;

        let (dest_dir, mut document_path) = if destination.is_dir() {
            let document = destination.join(document_file_name(&tailored));
            (destination.to_path_buf(), document)
        } else {
            let parent = destination.parent().unwrap_or(Path::new(".")).to_path_buf();
            (parent, destination.to_path_buf())
        };

        // fall back once to the default extension before giving up
        let mut persister = self.persister_for(&document_path);
        if persister.is_none() {
            document_path = append_extension(&document_path, DEFAULT_DOCUMENT_EXTENSION);
            persister = self.persister_for(&document_path);
        }
        let persister = persister.ok_or_else(|| ExportError::PersistenceFormat {
            name: document_path.to_string_lossy().to_string(),
        })?;

        fs::create_dir_all(&dest_dir).map_err(|err| partial(&dest_dir, err))?;
        let mut document_out =
            File::create(&document_path).map_err(|err| partial(&document_path, err))?;
        persister.save(&tailored, &mut document_out)?;

        for (archive_path, model_file) in self.required_files(&tailored) {
            let target = join_archive_path(&dest_dir, &archive_path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| partial(parent, err))?;
            }
            let mut stream = self.finder.open_stream(model_file)?;
            let mut out = File::create(&target).map_err(|err| partial(&target, err))?;
            io::copy(&mut stream, &mut out).map_err(|err| partial(&target, err))?;
            tracing::debug!(file = %model_file.name, target = %target.display(), "copied model file");
        }

        tracing::info!(model = %tailored.name, document = %document_path.display(), "exported model definition as files");
        Ok(document_path)
    }

    /// Export as a single zip archive: one entry per available document
    /// format, one entry per required file at its archive path.
    ///
    /// There is no transactional guarantee: a failure partway through leaves
    /// a partial archive behind, and the caller has to discard it.
    pub fn export_as_zip(
        &self,
        request: &ExportRequest<'_>,
        destination: &Path,
    ) -> Result<PathBuf, ExportError> {
        let tailored = tailor(request)?;
        let zip_path = ensure_zip_file_extension(destination);

        let out = File::create(&zip_path).map_err(|err| partial(&zip_path, err))?;
        let mut zip = ZipWriter::new(out);
        let options = SimpleFileOptions::default();

        let base_name = proposed_id_string(&tailored.name);
        for persister in &self.persisters {
            zip.start_file(
                format!("{base_name}{}", persister.file_extension()),
                options,
            )
            .map_err(|err| partial(&zip_path, io::Error::other(err)))?;
            persister.save(&tailored, &mut zip)?;
        }

        for (archive_path, model_file) in self.required_files(&tailored) {
            zip.start_file(archive_path.clone(), options)
                .map_err(|err| partial(&zip_path, io::Error::other(err)))?;
            let mut stream = self.finder.open_stream(model_file)?;
            io::copy(&mut stream, &mut zip).map_err(|err| partial(&zip_path, err))?;
        }

        zip.finish()
            .map_err(|err| partial(&zip_path, io::Error::other(err)))?;
        tracing::info!(model = %tailored.name, archive = %zip_path.display(), "exported model definition as zip");
        Ok(zip_path)
    }

    /// All files required by a tailored definition, deduplicated by archive
    /// path in first-reference order. Distinct optics may legitimately
    /// reference the same underlying file; it is still written exactly once.
    fn required_files<'m>(&self, model: &'m ModelDefinition) -> Vec<(String, &'m ModelFile)> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for model_file in model.required_files() {
            let archive_path = self.finder.archive_path(model_file);
            if seen.insert(archive_path.clone()) {
                files.push((archive_path, model_file));
            }
        }
        files
    }

    fn persister_for(&self, path: &Path) -> Option<&dyn ModelDefinitionPersister> {
        let name = path.file_name()?.to_string_lossy();
        find_persister(&self.persisters, &name)
    }
}

/// The document file name for a directory export: the name the definition
/// was originally loaded under, or a proposed one derived from its name.
fn document_file_name(model: &ModelDefinition) -> String {
    model
        .source_information
        .as_ref()
        .map(|info| info.file_name.clone())
        .unwrap_or_else(|| proposed_default_file_name(model))
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(extension);
    path.with_file_name(name)
}

fn join_archive_path(root: &Path, archive_path: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in archive_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

fn partial(path: &Path, source: io::Error) -> ExportError {
    ExportError::PartialWrite {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use crate::domain::file::ModelPathOffsets;
    use crate::domain::machine::{RangeDefinition, SequenceDefinition};
    use crate::domain::optics::OpticsDefinition;
    use crate::infra::source::ModelSource;

    fn shared_file_model() -> (ModelDefinition, ModelFileFinder) {
        let mut model = ModelDefinition::new("demo");
        model.init_files.push(ModelFile::resource("init.madx"));
        // both optics reference the same strengths file
        model.optics_definitions.push(OpticsDefinition::new(
            "nominal",
            vec![ModelFile::resource("shared.str")],
        ));
        model.optics_definitions.push(OpticsDefinition::new(
            "squeezed",
            vec![ModelFile::resource("shared.str")],
        ));
        model.default_optics = Some("nominal".into());
        let mut sequence = SequenceDefinition::new("ring");
        sequence.range_definitions.push(RangeDefinition::new("all"));
        sequence.default_range = Some("all".into());
        model.sequence_definitions.push(sequence);
        model.default_sequence = Some("ring".into());

        let mut files = BTreeMap::new();
        files.insert("resdata/init.madx".to_string(), b"! init".to_vec());
        files.insert("resdata/shared.str".to_string(), b"! shared".to_vec());
        let finder = ModelFileFinder::new(ModelPathOffsets::default(), ModelSource::memory(files));
        (model, finder)
    }

    #[test]
    fn required_files_are_deduplicated_by_archive_path() {
        let (model, finder) = shared_file_model();
        let exporter = ModelDefinitionExporter::with_default_persisters(finder);
        let files = exporter.required_files(&model);
        let paths: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["resdata/init.madx", "resdata/shared.str"]);
    }

    #[test]
    fn directory_export_falls_back_to_the_default_extension() {
        let (model, finder) = shared_file_model();
        let exporter = ModelDefinitionExporter::with_default_persisters(finder);
        let dir = tempfile::tempdir().unwrap();

        let request = ExportRequest::all_from(&model);
        let document = exporter
            .export_as_files(&request, &dir.path().join("mydef"))
            .unwrap();
        assert_eq!(
            document.file_name().unwrap().to_string_lossy(),
            "mydef.jmd.xml"
        );
        assert!(document.is_file());
    }
}
