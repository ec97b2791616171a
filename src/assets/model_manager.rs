use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::io::FileSystem;
use crate::loaders::load_entity_model;
use crate::model::EntityModelData;
use crate::resources::{Resource, ResourceManager};
use crate::settings::LoaderSettings;

/// Path-keyed cache of entity model resources.
///
/// The first request for a path creates an `Unloaded` resource and registers
/// it with the [`ResourceManager`], which loads it on its task runner.
/// Later requests share the same resource.
pub struct EntityModelManager {
    fs: Arc<dyn FileSystem>,
    settings: Arc<LoaderSettings>,
    models: FxHashMap<PathBuf, Arc<Resource<EntityModelData>>>,
}

impl EntityModelManager {
    /// Models are read from `fs` and decoded with `settings`.
    pub fn new(fs: Arc<dyn FileSystem>, settings: LoaderSettings) -> Self {
        Self {
            fs,
            settings: Arc::new(settings),
            models: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// The cached resource for `path`, created and registered on first use.
    pub fn model(
        &mut self,
        path: impl AsRef<Path>,
        resource_manager: &mut ResourceManager,
    ) -> Arc<Resource<EntityModelData>> {
        let path = path.as_ref();
        if let Some(model) = self.models.get(path) {
            return Arc::clone(model);
        }

        let fs = Arc::clone(&self.fs);
        let settings = Arc::clone(&self.settings);
        let model_path = path.to_path_buf();
        let resource = Arc::new(Resource::from_loader(move || {
            load_entity_model(&model_path, fs.as_ref(), &settings)
        }));

        log::debug!("Created model resource {} for {}", resource.id(), path.display());
        resource_manager.add_resource(Arc::clone(&resource));
        self.models.insert(path.to_path_buf(), Arc::clone(&resource));
        resource
    }

    /// Forgets every cached model. Resources nobody else holds are collected
    /// by the resource manager on its next pass.
    pub fn clear(&mut self) {
        self.models.clear();
    }

    /// Cached model paths, sorted.
    #[must_use]
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.models.keys().cloned().collect();
        paths.sort();
        paths
    }
}
