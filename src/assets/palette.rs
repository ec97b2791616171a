//! 256-colour palettes used by indexed skins and textures.

use std::path::Path;
use std::sync::Arc;

use glam::Vec4;

use crate::errors::{ForgeError, Result};
use crate::io::{FileSystem, Reader, extension_lowercase};

const PALETTE_SIZE: usize = 768;
const PCX_PALETTE_MARKER: u8 = 0x0C;

/// How palette index 255 is treated when expanding indexed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteTransparency {
    #[default]
    Opaque,
    /// Index 255 becomes fully transparent.
    Index255Transparent,
}

/// RGB colour table with 256 entries. Cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct Palette {
    rgb: Arc<[u8; PALETTE_SIZE]>,
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette").finish_non_exhaustive()
    }
}

impl Palette {
    /// Palette from the first 768 bytes of `data`.
    pub fn from_rgb(data: &[u8]) -> Result<Self> {
        let rgb: [u8; PALETTE_SIZE] = data
            .get(..PALETTE_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| {
                ForgeError::Palette(format!(
                    "Expected {PALETTE_SIZE} bytes of palette data, got {}",
                    data.len()
                ))
            })?;
        Ok(Self { rgb: Arc::new(rgb) })
    }

    /// Palette stored at the end of a PCX image, preceded by the `0x0C` marker.
    pub fn from_pcx(data: &[u8]) -> Result<Self> {
        let start = data
            .len()
            .checked_sub(PALETTE_SIZE + 1)
            .ok_or_else(|| ForgeError::Palette("PCX file is too small".to_string()))?;
        if data[start] != PCX_PALETTE_MARKER {
            return Err(ForgeError::Palette(
                "PCX file has no 256 colour palette".to_string(),
            ));
        }
        Self::from_rgb(&data[start + 1..])
    }

    /// Loads a `.lmp` or `.pcx` palette from the file system.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let data = fs.read_file(path)?;
        match extension_lowercase(path).as_str() {
            "lmp" => Self::from_rgb(&data),
            "pcx" => Self::from_pcx(&data),
            other => Err(ForgeError::Palette(format!(
                "Unsupported palette format '{other}' for {}",
                path.display()
            ))),
        }
    }

    #[inline]
    #[must_use]
    pub fn color(&self, index: u8) -> [u8; 3] {
        let i = usize::from(index) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }

    /// Expands `pixel_count` indices read from `reader` into RGBA pixels appended to `out`.
    ///
    /// Returns the average colour of the expanded pixels, normalized to `[0, 1]`.
    pub fn indexed_to_rgba(
        &self,
        reader: &mut Reader,
        pixel_count: usize,
        out: &mut Vec<u8>,
        transparency: PaletteTransparency,
    ) -> Result<Vec4> {
        let indices = reader.read_bytes(pixel_count)?;
        out.reserve(pixel_count * 4);

        let mut sum = [0u64; 4];
        for &index in indices {
            let [r, g, b] = self.color(index);
            let a = if transparency == PaletteTransparency::Index255Transparent && index == 255 {
                0
            } else {
                255
            };
            out.extend_from_slice(&[r, g, b, a]);
            for (acc, channel) in sum.iter_mut().zip([r, g, b, a]) {
                *acc += u64::from(channel);
            }
        }

        if pixel_count == 0 {
            return Ok(Vec4::ZERO);
        }
        let scale = 255.0 * pixel_count as f32;
        Ok(Vec4::new(
            sum[0] as f32 / scale,
            sum[1] as f32 / scale,
            sum[2] as f32 / scale,
            sum[3] as f32 / scale,
        ))
    }
}
