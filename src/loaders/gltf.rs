//! glTF 2.0 (`.gltf` / `.glb`) models, decoded with the `gltf` crate.
//!
//! The default scene is flattened into a single static frame: every mesh
//! primitive is transformed by its node's world matrix and appended to one
//! surface, with ranges keyed by the primitive's material. Base colour
//! textures become the surface skins; one extra default skin is appended for
//! primitives without a material.

use std::path::Path;

use base64::Engine;
use glam::{Mat4, Vec2, Vec3};

use crate::assets::skin::load_skin_with;
use crate::assets::{Material, Texture};
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension};
use crate::loaders::{LoadContext, model_name};
use crate::model::{
    AabbBuilder, EntityModelData, EntityModelVertex, MaterialIndexRangeMapBuilder, Orientation,
    PitchType, PrimType, Size,
};

const DEFAULT_MATERIAL_NAME: &str = "__default";

#[must_use]
pub fn can_load(path: &Path) -> bool {
    has_extension(path, &["gltf", "glb"])
}

pub fn load(path: &Path, reader: &Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let name = model_name(path);
    let base_path = path.parent().unwrap_or_else(|| Path::new(""));

    let gltf = ::gltf::Gltf::from_slice(reader.remaining())?;
    let buffers = load_buffers(&gltf, base_path, ctx)?;

    let mut skins = gltf
        .materials()
        .enumerate()
        .map(|(index, material)| load_material(index, &material, &buffers, base_path, ctx))
        .collect::<Vec<_>>();
    let default_material = skins.len();
    skins.push(Material::default_placeholder(DEFAULT_MATERIAL_NAME));

    let mut builder = MaterialIndexRangeMapBuilder::new(0, &Size::default());
    let mut bounds = AabbBuilder::default();
    if let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) {
        for node in scene.nodes() {
            visit_node(&node, Mat4::IDENTITY, &buffers, default_material, &mut builder, &mut bounds)?;
        }
    } else {
        log::warn!("glTF model {name} has no scene");
    }
    let (vertices, ranges) = builder.finish();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);
    let frame_index = model.add_frame(name.as_str(), bounds.bounds());
    let surface = model.add_surface(name.as_str(), 1);
    surface.set_skins(skins);
    surface.add_material_mesh(frame_index, vertices, ranges);
    Ok(model)
}

fn load_buffers(gltf: &::gltf::Gltf, base_path: &Path, ctx: &LoadContext<'_>) -> Result<Vec<Vec<u8>>> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            ::gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| ForgeError::Gltf("Missing GLB binary chunk".to_string()))?,
            ::gltf::buffer::Source::Uri(uri) => read_uri(uri, base_path, ctx)?,
        };
        if data.len() < buffer.length() {
            return Err(ForgeError::Gltf(format!(
                "Buffer {} has {} bytes, expected {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffer_data.push(data);
    }
    Ok(buffer_data)
}

/// Reads a `data:` URI or a file relative to the model.
fn read_uri(uri: &str, base_path: &Path, ctx: &LoadContext<'_>) -> Result<Vec<u8>> {
    if let Some(data) = uri.strip_prefix("data:") {
        let (_, payload) = data
            .split_once(";base64,")
            .ok_or_else(|| ForgeError::Gltf(format!("Unsupported data URI: {uri:.32}")))?;
        return Ok(base64::engine::general_purpose::STANDARD.decode(payload)?);
    }
    ctx.fs.read_file(&base_path.join(uri))
}

fn load_material(
    index: usize,
    material: &::gltf::Material<'_>,
    buffers: &[Vec<u8>],
    base_path: &Path,
    ctx: &LoadContext<'_>,
) -> Material {
    let name = material
        .name()
        .map_or_else(|| format!("material_{index}"), str::to_string);
    let Some(info) = material.pbr_metallic_roughness().base_color_texture() else {
        log::debug!("glTF material '{name}' has no base colour texture");
        return Material::default_placeholder(name);
    };

    match info.texture().source().source() {
        ::gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => {
            load_skin_with(&base_path.join(uri), ctx.fs, ctx)
        }
        ::gltf::image::Source::Uri { uri, .. } => {
            decode_embedded(&name, read_uri(uri, base_path, ctx))
        }
        ::gltf::image::Source::View { view, .. } => {
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
                .map(<[u8]>::to_vec)
                .ok_or_else(|| ForgeError::Gltf(format!("Image view of '{name}' is out of bounds")));
            decode_embedded(&name, bytes)
        }
    }
}

fn decode_embedded(name: &str, bytes: Result<Vec<u8>>) -> Material {
    let texture = bytes.and_then(|bytes| Ok(Texture::from_image(name, &image::load_from_memory(&bytes)?)));
    match texture {
        Ok(texture) => Material::new(name, texture),
        Err(error) => {
            log::warn!("Could not decode embedded glTF image '{name}': {error}");
            Material::default_placeholder(name)
        }
    }
}

fn visit_node(
    node: &::gltf::Node<'_>,
    parent: Mat4,
    buffers: &[Vec<u8>],
    default_material: usize,
    builder: &mut MaterialIndexRangeMapBuilder<EntityModelVertex>,
    bounds: &mut AabbBuilder,
) -> Result<()> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let material = primitive
                .material()
                .index()
                .filter(|&index| index < default_material)
                .unwrap_or(default_material);
            add_primitive(&primitive, world, buffers, material, builder, bounds)?;
        }
    }

    for child in node.children() {
        visit_node(&child, world, buffers, default_material, builder, bounds)?;
    }
    Ok(())
}

fn prim_type(mode: ::gltf::mesh::Mode) -> PrimType {
    use ::gltf::mesh::Mode;
    match mode {
        Mode::Points => PrimType::Points,
        Mode::Lines => PrimType::Lines,
        Mode::LineLoop => PrimType::LineLoop,
        Mode::LineStrip => PrimType::LineStrip,
        Mode::Triangles => PrimType::Triangles,
        Mode::TriangleStrip => PrimType::TriangleStrip,
        Mode::TriangleFan => PrimType::TriangleFan,
    }
}

fn add_primitive(
    primitive: &::gltf::Primitive<'_>,
    world: Mat4,
    buffers: &[Vec<u8>],
    material: usize,
    builder: &mut MaterialIndexRangeMapBuilder<EntityModelVertex>,
    bounds: &mut AabbBuilder,
) -> Result<()> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let Some(positions) = reader.read_positions() else {
        log::warn!("Skipping glTF primitive {} without positions", primitive.index());
        return Ok(());
    };
    let positions = positions
        .map(|p| world.transform_point3(Vec3::from_array(p)))
        .collect::<Vec<_>>();
    let uvs = reader
        .read_tex_coords(0)
        .map(|uvs| uvs.into_f32().map(Vec2::from_array).collect::<Vec<_>>())
        .unwrap_or_default();
    bounds.add_all(positions.iter().copied());

    let vertex = |index: usize| -> Result<EntityModelVertex> {
        let position = positions.get(index).copied().ok_or_else(|| {
            ForgeError::Gltf(format!(
                "Primitive {} references vertex {index}, but has {} vertices",
                primitive.index(),
                positions.len()
            ))
        })?;
        let uv = uvs.get(index).copied().unwrap_or(Vec2::ZERO);
        Ok(EntityModelVertex::new(position, uv))
    };

    let vertices = match reader.read_indices() {
        Some(indices) => indices
            .into_u32()
            .map(|index| vertex(index as usize))
            .collect::<Result<Vec<_>>>()?,
        None => (0..positions.len()).map(vertex).collect::<Result<Vec<_>>>()?,
    };

    builder.add_primitive(Some(material), prim_type(primitive.mode()), vertices);
    Ok(())
}
