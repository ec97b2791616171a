//! Wavefront OBJ models, decoded with `tobj`.
//!
//! Faces are triangulated and de-indexed into a single static frame. Material
//! libraries are read through the model's file system, relative to the
//! model; each material's diffuse map becomes a skin.

use std::io::{BufReader, Cursor};
use std::path::Path;

use glam::{Vec2, Vec3};

use crate::assets::skin::load_skin_with;
use crate::assets::Material;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension, parse_model_path};
use crate::loaders::{LoadContext, model_name};
use crate::model::{
    AabbBuilder, EntityModelData, EntityModelVertex, MaterialIndexRangeMapBuilder, Orientation,
    PitchType, Size,
};

const DEFAULT_MATERIAL_NAME: &str = "__default";

#[must_use]
pub fn can_load(path: &Path) -> bool {
    has_extension(path, &["obj"])
}

pub fn load(path: &Path, reader: &Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let name = model_name(path);
    let base_path = path.parent().unwrap_or_else(|| Path::new(""));

    let mut obj_reader = BufReader::new(Cursor::new(reader.remaining()));
    let (models, obj_materials) = tobj::load_obj_buf(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        },
        |mtl_path| {
            let data = ctx
                .fs
                .read_file(&base_path.join(mtl_path))
                .map_err(|_| tobj::LoadError::OpenFileFailed)?;
            tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(data)))
        },
    )?;

    let obj_materials = obj_materials.unwrap_or_else(|error| {
        log::warn!("Could not load materials of OBJ model {name}: {error}");
        Vec::new()
    });
    let mut skins = obj_materials
        .iter()
        .map(|material| match &material.diffuse_texture {
            Some(texture) => load_skin_with(&base_path.join(parse_model_path(texture)), ctx.fs, ctx),
            None => {
                log::debug!("OBJ material '{}' has no diffuse map", material.name);
                Material::default_placeholder(material.name.as_str())
            }
        })
        .collect::<Vec<_>>();
    let default_material = skins.len();
    skins.push(Material::default_placeholder(DEFAULT_MATERIAL_NAME));

    let mut bounds = AabbBuilder::default();
    let vertex_count = models.iter().map(|m| m.mesh.indices.len()).sum();
    let mut builder = MaterialIndexRangeMapBuilder::new(vertex_count, &Size::default());
    for model in &models {
        let mesh = &model.mesh;
        let material = mesh
            .material_id
            .filter(|&index| index < default_material)
            .unwrap_or(default_material);

        let positions = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect::<Vec<_>>();
        bounds.add_all(positions.iter().copied());

        let vertices = mesh
            .indices
            .iter()
            .map(|&index| {
                let index = index as usize;
                let position = positions.get(index).copied().ok_or_else(|| {
                    ForgeError::Obj(format!(
                        "Object '{}' references vertex {index}, but has {} vertices",
                        model.name,
                        positions.len()
                    ))
                })?;
                let uv = mesh
                    .texcoords
                    .get(index * 2..index * 2 + 2)
                    .map_or(Vec2::ZERO, |uv| Vec2::new(uv[0], 1.0 - uv[1]));
                Ok(EntityModelVertex::new(position, uv))
            })
            .collect::<Result<Vec<_>>>()?;

        let triangle_vertices = vertices.len() / 3 * 3;
        builder.add_triangles(Some(material), vertices.into_iter().take(triangle_vertices));
    }
    let (vertices, ranges) = builder.finish();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);
    let frame_index = model.add_frame(name.as_str(), bounds.bounds());
    let surface = model.add_surface(name.as_str(), 1);
    surface.set_skins(skins);
    surface.add_material_mesh(frame_index, vertices, ranges);
    Ok(model)
}
