//! Plain images shown as camera facing sprites.

use std::path::Path;

use glam::{Vec2, Vec3};
use image::ImageFormat;

use crate::assets::{Material, Texture};
use crate::errors::Result;
use crate::io::{Reader, extension_lowercase};
use crate::model::{
    AabbBuilder, EntityModelData, EntityModelVertex, IndexRangeMapBuilder, Orientation, PitchType,
    PrimType, Size,
};

/// Accepts any file whose extension is listed in `extensions`.
#[must_use]
pub fn can_load(path: &Path, extensions: &[String]) -> bool {
    let extension = extension_lowercase(path);
    !extension.is_empty()
        && extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&extension))
}

/// Decodes the image and builds a single quad centered on the origin, one
/// world unit per pixel.
pub fn load(name: &str, reader: &Reader) -> Result<EntityModelData> {
    let bytes = reader.remaining();
    let image = match ImageFormat::from_path(name) {
        Ok(format) => image::load_from_memory_with_format(bytes, format)?,
        Err(_) => image::load_from_memory(bytes)?,
    };
    let texture = Texture::from_image(name, &image);

    let w = texture.width() as f32;
    let h = texture.height() as f32;
    let x1 = -w / 2.0;
    let y1 = -h / 2.0;
    let x2 = x1 + w;
    let y2 = y1 + h;

    let corner = |x: f32, y: f32, u: f32, v: f32| {
        EntityModelVertex::new(Vec3::new(x, y, 0.0), Vec2::new(u, v))
    };
    let triangles = [
        corner(x1, y1, 0.0, 1.0),
        corner(x1, y2, 0.0, 0.0),
        corner(x2, y2, 1.0, 0.0),
        corner(x2, y2, 1.0, 0.0),
        corner(x2, y1, 1.0, 1.0),
        corner(x1, y1, 0.0, 1.0),
    ];

    let mut bounds = AabbBuilder::default();
    bounds.add_all(triangles.iter().map(|v| v.position));

    let mut size = Size::default();
    size.inc(PrimType::Triangles);
    let mut builder = IndexRangeMapBuilder::new(triangles.len(), &size);
    builder.add_triangles(triangles);
    let (vertices, ranges) = builder.finish();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::ViewPlaneParallel);
    let frame_index = model.add_frame(name, bounds.bounds());
    let surface = model.add_surface(name, 1);
    surface.set_skins(vec![Material::new(name, texture)]);
    surface.add_mesh(frame_index, vertices, ranges);
    Ok(model)
}
