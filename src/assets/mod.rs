//! Skins, palettes and the model cache.
//!
//! Everything a parser needs to turn skin references into [`Material`]s, plus
//! the [`EntityModelManager`] that hands out shared model resources.

pub mod material;
pub mod model_manager;
pub mod palette;
pub mod skin;
pub mod texture;

pub use material::Material;
pub use model_manager::EntityModelManager;
pub use palette::{Palette, PaletteTransparency};
pub use skin::{
    PaletteSource, find_skin, find_skin_with_extensions, load_indexed_skin, load_skin,
    load_skin_with, resolve_and_load_skin, resolve_and_load_skin_with,
};
pub use texture::Texture;
