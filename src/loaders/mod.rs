//! Entity Model Loaders
//!
//! One module per file format. Every parser exposes the same pair of
//! functions:
//!
//! - `can_load(path, reader) -> bool` checks the extension and, for binary
//!   formats, the ident and version. It never fails.
//! - `load(...) -> Result<EntityModelData>` decodes the whole file or
//!   returns an error. A partially decoded model is never returned.
//!
//! [`ModelFormat`] ties the parsers together: [`ModelFormat::detect`] tries
//! them in a fixed order and [`load_entity_model`] opens, sniffs and parses a
//! file from a [`FileSystem`].

pub mod alias;
pub mod ase;
pub mod dkm;
pub mod gltf;
pub mod image_sprite;
pub mod md2;
pub mod md3;
pub mod mdl;
pub mod mdx;
pub mod obj;
pub mod sin;
pub mod spr;

use std::cell::OnceCell;
use std::fmt;
use std::path::Path;

use crate::assets::{Palette, PaletteSource};
use crate::errors::{ForgeError, Result};
use crate::io::{FileSystem, Reader};
use crate::model::EntityModelData;
use crate::settings::LoaderSettings;

/// Builds a file ident from its four magic bytes as they appear on disk.
///
/// Equivalent to `(c3 << 24) + (c2 << 16) + (c1 << 8) + c0`, the value an
/// `i32` little-endian read of the magic produces.
#[must_use]
pub const fn ident(magic: &[u8; 4]) -> i32 {
    i32::from_le_bytes(*magic)
}

/// Collaborators shared by all parsers.
///
/// The palette named by the settings is read on first use, so formats that
/// never expand palette indices load without one.
pub struct LoadContext<'a> {
    pub fs: &'a dyn FileSystem,
    pub settings: &'a LoaderSettings,
    preset_palette: Option<&'a Palette>,
    loaded_palette: OnceCell<Palette>,
}

impl fmt::Debug for LoadContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("preset_palette", &self.preset_palette.is_some())
            .field("palette_loaded", &self.loaded_palette.get().is_some())
            .field("settings", self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a> LoadContext<'a> {
    /// A `palette` given here takes precedence over `settings.palette`.
    pub fn new(fs: &'a dyn FileSystem, palette: Option<&'a Palette>, settings: &'a LoaderSettings) -> Self {
        Self {
            fs,
            settings,
            preset_palette: palette,
            loaded_palette: OnceCell::new(),
        }
    }

    /// The palette, or an error naming the format that needs one.
    pub fn require_palette(&self, format: &str) -> Result<&Palette> {
        self.palette()?.ok_or_else(|| {
            ForgeError::Palette(format!("Loading {format} models requires a palette"))
        })
    }
}

impl PaletteSource for LoadContext<'_> {
    fn palette(&self) -> Result<Option<&Palette>> {
        if let Some(palette) = self.preset_palette {
            return Ok(Some(palette));
        }
        let Some(path) = self.settings.palette.as_deref() else {
            return Ok(None);
        };
        if let Some(palette) = self.loaded_palette.get() {
            return Ok(Some(palette));
        }
        let palette = Palette::load(self.fs, path)?;
        log::debug!("Loaded palette {}", path.display());
        Ok(Some(self.loaded_palette.get_or_init(|| palette)))
    }
}

/// Every supported model format, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Md2,
    Md3,
    Mdl,
    Mdx,
    Dkm,
    Spr,
    ImageSprite,
    Ase,
    Gltf,
    Obj,
    Sin,
}

impl ModelFormat {
    pub const ALL: [Self; 11] = [
        Self::Md2,
        Self::Md3,
        Self::Mdl,
        Self::Mdx,
        Self::Dkm,
        Self::Spr,
        Self::ImageSprite,
        Self::Ase,
        Self::Gltf,
        Self::Obj,
        Self::Sin,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Md2 => "MD2",
            Self::Md3 => "MD3",
            Self::Mdl => "MDL",
            Self::Mdx => "MDX",
            Self::Dkm => "DKM",
            Self::Spr => "SPR",
            Self::ImageSprite => "image sprite",
            Self::Ase => "ASE",
            Self::Gltf => "glTF",
            Self::Obj => "OBJ",
            Self::Sin => "SiN",
        }
    }

    /// Returns true if this format's parser accepts the file.
    #[must_use]
    pub fn can_load(self, path: &Path, reader: &Reader, settings: &LoaderSettings) -> bool {
        let reader = reader.clone();
        match self {
            Self::Md2 => md2::can_load(path, reader),
            Self::Md3 => md3::can_load(path, reader),
            Self::Mdl => mdl::can_load(path, reader),
            Self::Mdx => mdx::can_load(path, reader),
            Self::Dkm => dkm::can_load(path, reader),
            Self::Spr => spr::can_load(path, reader),
            Self::ImageSprite => image_sprite::can_load(path, &settings.image_sprite_extensions),
            Self::Ase => ase::can_load(path),
            Self::Gltf => gltf::can_load(path),
            Self::Obj => obj::can_load(path),
            Self::Sin => sin::can_load(path, reader),
        }
    }

    /// First format, in [`ModelFormat::ALL`] order, whose parser accepts the file.
    #[must_use]
    pub fn detect(path: &Path, reader: &Reader, settings: &LoaderSettings) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.can_load(path, reader, settings))
    }

    /// Decodes the file with this format's parser.
    pub fn load(self, path: &Path, reader: Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
        let name = model_name(path);
        match self {
            Self::Md2 => md2::load(&name, reader, ctx),
            Self::Md3 => md3::load(&name, reader, ctx),
            Self::Mdl => mdl::load(&name, reader, ctx),
            Self::Mdx => mdx::load(&name, reader, ctx),
            Self::Dkm => dkm::load(&name, reader, ctx),
            Self::Spr => spr::load(&name, reader, ctx),
            Self::ImageSprite => image_sprite::load(&name, &reader),
            Self::Ase => ase::load(&name, &reader, ctx),
            Self::Gltf => gltf::load(path, &reader, ctx),
            Self::Obj => obj::load(path, &reader, ctx),
            Self::Sin => sin::load(path, &reader, ctx),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The file name of a model path, used to name its surfaces and frames.
#[must_use]
pub fn model_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Opens `path`, detects its format and decodes it.
///
/// The palette named by `settings` is loaded only if the model needs it.
pub fn load_entity_model(
    path: &Path,
    fs: &dyn FileSystem,
    settings: &LoaderSettings,
) -> Result<EntityModelData> {
    let reader = fs.open_file(path)?;
    let format = ModelFormat::detect(path, &reader, settings)
        .ok_or_else(|| ForgeError::UnknownFormat(path.to_path_buf()))?;
    log::debug!("Loading {} as {format} model", path.display());

    let ctx = LoadContext::new(fs, None, settings);
    format.load(path, reader, &ctx)
}
