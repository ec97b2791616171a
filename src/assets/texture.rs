use glam::Vec4;

use crate::assets::palette::{Palette, PaletteTransparency};
use crate::errors::{ForgeError, Result};
use crate::io::Reader;
use crate::resources::{ProcessContext, ResourcePayload, TextureId};

/// CPU-side RGBA8 texture.
///
/// The pixel data stays resident after upload so the texture can be
/// re-uploaded to another context.
#[derive(Debug, Clone)]
pub struct Texture {
    name: String,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    average_color: Vec4,
    gpu: Option<TextureId>,
}

impl Texture {
    /// Texture from tightly packed RGBA8 pixels.
    pub fn from_rgba(name: impl Into<String>, width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ForgeError::ImageDecode(format!(
                "Texture data has {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            )));
        }
        let average_color = average_rgba(&rgba);
        Ok(Self {
            name: name.into(),
            width,
            height,
            rgba,
            average_color,
            gpu: None,
        })
    }

    pub fn from_image(name: impl Into<String>, image: &image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();
        Self {
            name: name.into(),
            width,
            height,
            average_color: average_rgba(&data),
            rgba: data,
            gpu: None,
        }
    }

    /// Reads `width * height` palette indices from `reader`.
    pub fn from_indexed(
        name: impl Into<String>,
        width: u32,
        height: u32,
        reader: &mut Reader,
        palette: &Palette,
        transparency: PaletteTransparency,
    ) -> Result<Self> {
        let name = name.into();
        let pixel_count = (width as usize)
            .checked_mul(height as usize)
            .filter(|&count| reader.can_read(count))
            .ok_or_else(|| {
                ForgeError::format(format!(
                    "Indexed image {name} of {width}x{height} pixels exceeds the available data"
                ))
            })?;
        let mut rgba = Vec::with_capacity(pixel_count * 4);
        let average_color = palette.indexed_to_rgba(reader, pixel_count, &mut rgba, transparency)?;
        Ok(Self {
            name,
            width,
            height,
            rgba,
            average_color,
            gpu: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    #[inline]
    #[must_use]
    pub fn average_color(&self) -> Vec4 {
        self.average_color
    }

    /// Handle assigned by the graphics context on upload.
    #[inline]
    #[must_use]
    pub fn gpu_id(&self) -> Option<TextureId> {
        self.gpu
    }
}

impl ResourcePayload for Texture {
    fn upload(&mut self, ctx: &ProcessContext<'_>) {
        if let Some(graphics) = ctx.graphics() {
            self.gpu = Some(graphics.create_texture(&self.name, self.width, self.height, &self.rgba));
        }
    }

    fn release(&mut self, ctx: &ProcessContext<'_>) {
        if let (Some(graphics), Some(id)) = (ctx.graphics(), self.gpu.take()) {
            graphics.delete_texture(id);
        }
    }
}

fn average_rgba(rgba: &[u8]) -> Vec4 {
    let pixel_count = rgba.len() / 4;
    if pixel_count == 0 {
        return Vec4::ZERO;
    }
    let mut sum = [0u64; 4];
    for pixel in rgba.chunks_exact(4) {
        for (acc, &channel) in sum.iter_mut().zip(pixel) {
            *acc += u64::from(channel);
        }
    }
    let scale = 255.0 * pixel_count as f32;
    Vec4::new(
        sum[0] as f32 / scale,
        sum[1] as f32 / scale,
        sum[2] as f32 / scale,
        sum[3] as f32 / scale,
    )
}
