//! Maintenance checks for on-disk model repositories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::definition::ModelDefinition;
use crate::domain::errors::MaintenanceError;
use crate::infra::finder::ModelFileFinder;
use crate::infra::persist::default_persisters;

/// Find every file below `root` that none of the given model definitions
/// references.
///
/// Each definition comes paired with the finder scoped to it, because only
/// the finder knows how its file references map onto the directory layout.
/// Definition documents themselves (any recognized persistence extension)
/// are never reported. The scan is refused with
/// [`MaintenanceError::NotLocal`] when any referenced file cannot be located
/// below the root, since the unused-set would be meaningless in that case.
pub fn detect_unused_files(
    root: &Path,
    models: &[(&ModelDefinition, &ModelFileFinder)],
) -> Result<BTreeSet<PathBuf>, MaintenanceError> {
    let mut referenced = BTreeSet::new();
    for (model, finder) in models {
        for file in model.required_files() {
            let local = finder
                .local_source_file(file)
                .filter(|path| path.is_file())
                .ok_or_else(|| MaintenanceError::NotLocal {
                    model: model.name.clone(),
                    name: file.name.clone(),
                })?;
            referenced.insert(local);
        }
    }

    let persisters = default_persisters();
    let mut unused = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| MaintenanceError::Scan {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if persisters.iter().any(|p| p.matches_file_name(&name)) {
            continue;
        }
        let path = entry.into_path();
        if !referenced.contains(&path) {
            unused.insert(path);
        }
    }

    tracing::info!(root = %root.display(), unused = unused.len(), "scanned model repository for unused files");
    Ok(unused)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::fs;

    use crate::domain::file::{ModelFile, ModelPathOffsets};
    use crate::infra::source::ModelSource;

    fn model_with(name: &str, files: Vec<ModelFile>) -> ModelDefinition {
        let mut model = ModelDefinition::new(name);
        model.init_files = files;
        model
    }

    #[test]
    fn reports_only_unreferenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let resdata = dir.path().join("resdata");
        fs::create_dir_all(&resdata).unwrap();
        fs::write(resdata.join("init.madx"), b"call;").unwrap();
        fs::write(resdata.join("stray.str"), b"x := 1;").unwrap();
        fs::write(dir.path().join("demo.jmd.xml"), b"<model-definition/>").unwrap();

        let model = model_with("demo", vec![ModelFile::resource("init.madx")]);
        let finder = ModelFileFinder::new(
            ModelPathOffsets::default(),
            ModelSource::directory(dir.path()),
        );

        let unused = detect_unused_files(dir.path(), &[(&model, &finder)]).unwrap();
        assert_eq!(
            unused.into_iter().collect::<Vec<_>>(),
            vec![resdata.join("stray.str")]
        );
    }

    #[test]
    fn refuses_models_without_local_sources() {
        let dir = tempfile::tempdir().unwrap();
        let model = model_with("demo", vec![ModelFile::resource("init.madx")]);
        let finder = ModelFileFinder::new(
            ModelPathOffsets::default(),
            ModelSource::memory(BTreeMap::new()),
        );

        let err = detect_unused_files(dir.path(), &[(&model, &finder)]).unwrap_err();
        assert!(matches!(err, MaintenanceError::NotLocal { .. }));
    }
}
