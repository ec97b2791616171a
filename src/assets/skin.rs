//! Skin Resolution & Decoding
//!
//! Model files reference their skins by path, and those paths are often
//! wrong: Daikatana models name `.bmp` files that only exist as `.wal`, and
//! Quake 3 shaders omit the extension entirely. [`find_skin`] repairs the
//! path, [`load_skin`] decodes whatever it points at.
//!
//! Loading a skin never fails. Missing or undecodable files are logged and
//! replaced by [`Material::default_placeholder`].

use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::assets::material::Material;
use crate::assets::palette::{Palette, PaletteTransparency};
use crate::assets::texture::Texture;
use crate::errors::{ForgeError, Result};
use crate::io::{FileSystem, PathInfo, PathMatcher, Reader, TraversalMode, extension_lowercase};

// ============================================================================
// Path resolution
// ============================================================================

/// Repairs a skin path referenced by a model.
///
/// Tries, in order: the path itself, the path with `.bmp` replaced by
/// `.wal`, and a unique file named `stem.*` in the same directory. Falls
/// back to the original path, which [`load_skin`] will then fail to open.
pub fn find_skin(name: &str, fs: &dyn FileSystem) -> Result<PathBuf> {
    let path = PathBuf::from(name);
    if fs.path_info(&path) == PathInfo::File {
        return Ok(path);
    }

    if extension_lowercase(&path) == "bmp" {
        let wal_path = path.with_extension("wal");
        if fs.path_info(&wal_path) == PathInfo::File {
            return Ok(wal_path);
        }
    }

    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(path);
    };
    let folder = path.parent().unwrap_or_else(|| Path::new(""));
    if fs.path_info(folder) != PathInfo::Directory {
        return Ok(path);
    }

    let matches = fs.find(
        folder,
        TraversalMode::Flat,
        &PathMatcher::filename_glob(format!("{stem}.*")),
    )?;
    match matches.as_slice() {
        [single] => Ok(single.clone()),
        _ => Ok(path),
    }
}

/// Resolves a skin name that may lack an extension by trying `extensions` in order.
///
/// Names that already resolve through [`find_skin`] are returned unchanged.
pub fn find_skin_with_extensions(
    name: &str,
    fs: &dyn FileSystem,
    extensions: &[String],
) -> Result<PathBuf> {
    let path = find_skin(name, fs)?;
    if fs.path_info(&path) == PathInfo::File {
        return Ok(path);
    }
    for extension in extensions {
        let candidate = path.with_extension(extension);
        if fs.path_info(&candidate) == PathInfo::File {
            return Ok(candidate);
        }
    }
    Ok(path)
}

// ============================================================================
// Decoding
// ============================================================================

/// Supplies the palette that Quake 2 WAL skins are expanded with.
///
/// Asked only when such a skin is actually decoded, so a source may load
/// its palette lazily.
pub trait PaletteSource {
    fn palette(&self) -> Result<Option<&Palette>>;
}

impl PaletteSource for Option<&Palette> {
    fn palette(&self) -> Result<Option<&Palette>> {
        Ok(*self)
    }
}

/// Loads the skin at `path`, substituting a placeholder on failure.
pub fn load_skin(path: &Path, fs: &dyn FileSystem, palette: Option<&Palette>) -> Material {
    load_skin_with(path, fs, &palette)
}

/// [`load_skin`] with a palette that is only resolved for WAL skins.
pub fn load_skin_with(path: &Path, fs: &dyn FileSystem, palette: &dyn PaletteSource) -> Material {
    let name = path.to_string_lossy().into_owned();
    match read_texture(path, fs, palette) {
        Ok(texture) => Material::new(name, texture),
        Err(error) => {
            log::warn!("Could not load skin '{name}': {error}");
            Material::default_placeholder(name)
        }
    }
}

/// [`find_skin`] followed by [`load_skin`].
pub fn resolve_and_load_skin(name: &str, fs: &dyn FileSystem, palette: Option<&Palette>) -> Material {
    resolve_and_load_skin_with(name, fs, &palette)
}

pub fn resolve_and_load_skin_with(
    name: &str,
    fs: &dyn FileSystem,
    palette: &dyn PaletteSource,
) -> Material {
    match find_skin(name, fs) {
        Ok(path) => load_skin_with(&path, fs, palette),
        Err(error) => {
            log::warn!("Could not find skin '{name}': {error}");
            Material::default_placeholder(name)
        }
    }
}

/// Decodes a skin embedded in a model file as `width * height` palette indices.
pub fn load_indexed_skin(
    name: impl Into<String>,
    reader: &mut Reader,
    width: u32,
    height: u32,
    palette: &Palette,
    transparency: PaletteTransparency,
) -> Result<Material> {
    let name = name.into();
    let texture = Texture::from_indexed(name.clone(), width, height, reader, palette, transparency)?;
    Ok(Material::new(name, texture))
}

fn read_texture(path: &Path, fs: &dyn FileSystem, palette: &dyn PaletteSource) -> Result<Texture> {
    let mut reader = fs.open_file(path)?;
    let name = path.to_string_lossy();
    if extension_lowercase(path) == "wal" {
        return read_wal(&name, &mut reader, palette);
    }

    let bytes = reader.remaining();
    let image = match ImageFormat::from_path(path) {
        Ok(format) => image::load_from_memory_with_format(bytes, format)?,
        Err(_) => image::load_from_memory(bytes)?,
    };
    Ok(Texture::from_image(name, &image))
}

// ============================================================================
// WAL textures
// ============================================================================

const WAL_NAME_LENGTH: usize = 32;
const DK_WAL_VERSION: u8 = 3;
const DK_WAL_SIZE_OFFSET: usize = 1 + WAL_NAME_LENGTH + 3;
const DK_WAL_PALETTE_OFFSET: usize = DK_WAL_SIZE_OFFSET + 8 + 9 * 4 + WAL_NAME_LENGTH + 4 + 4;
const Q2_WAL_SIZE_OFFSET: usize = WAL_NAME_LENGTH;

fn read_wal(name: &str, reader: &mut Reader, palette: &dyn PaletteSource) -> Result<Texture> {
    let version = reader.read_u8()?;
    reader.seek_from_begin(0)?;
    if version == DK_WAL_VERSION {
        read_dk_wal(name, reader)
    } else {
        let palette = palette.palette()?.ok_or_else(|| {
            ForgeError::Palette(format!("Quake 2 WAL texture '{name}' requires a palette"))
        })?;
        read_q2_wal(name, reader, palette)
    }
}

/// Quake 2 layout: name, width, height, four mip offsets, anim name, flags, contents, value.
fn read_q2_wal(name: &str, reader: &mut Reader, palette: &Palette) -> Result<Texture> {
    reader.seek_from_begin(Q2_WAL_SIZE_OFFSET)?;
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let mip0_offset = reader.read_u32()? as usize;

    let mut pixels = reader.sub_reader_from_begin_to_end(mip0_offset)?;
    Texture::from_indexed(name, width, height, &mut pixels, palette, PaletteTransparency::Opaque)
}

/// Daikatana layout: version byte, name, padding, size, nine mip offsets,
/// anim name, flags, contents, embedded palette, value.
fn read_dk_wal(name: &str, reader: &mut Reader) -> Result<Texture> {
    reader.seek_from_begin(DK_WAL_SIZE_OFFSET)?;
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let mip0_offset = reader.read_u32()? as usize;

    reader.seek_from_begin(DK_WAL_PALETTE_OFFSET)?;
    let palette = Palette::from_rgb(reader.read_bytes(768)?)?;

    let mut pixels = reader.sub_reader_from_begin_to_end(mip0_offset)?;
    Texture::from_indexed(
        name,
        width,
        height,
        &mut pixels,
        &palette,
        PaletteTransparency::Index255Transparent,
    )
}
