#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod errors;
pub mod io;
pub mod loaders;
pub mod model;
pub mod resources;
pub mod settings;

pub use assets::{EntityModelManager, Material, Palette, PaletteTransparency, Texture};
pub use errors::{ForgeError, Result};
pub use io::{DiskFileSystem, FileSystem, MemoryFileSystem, Reader};
pub use loaders::{LoadContext, ModelFormat, load_entity_model};
pub use model::{
    Aabb, EntityModelData, EntityModelFrame, EntityModelMesh, EntityModelSurface,
    EntityModelVertex, Orientation, PitchType, PrimType,
};
pub use resources::{
    GraphicsContext, ProcessContext, Resource, ResourceManager, ResourcePayload, ResourceState,
    TaskRunner,
};
pub use settings::{LoaderSettings, ProcessSettings};
