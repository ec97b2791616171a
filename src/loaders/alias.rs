//! Shared pieces of the Quake 2 family of vertex-animated models (MD2, MDX, DKM).
//!
//! All three store one compressed vertex set per frame and describe their
//! triangles as "mesh commands": runs of triangle strips and fans whose
//! vertices index into the frame's vertex set and carry their own UVs.

use glam::{Vec2, Vec3};

use crate::assets::Material;
use crate::errors::{ForgeError, Result};
use crate::io::Reader;
use crate::model::normals;
use crate::model::{
    Aabb, AabbBuilder, EntityModelData, EntityModelVertex, IndexRangeMap, IndexRangeMapBuilder,
    PrimType, Size,
};

pub const SKIN_NAME_LENGTH: usize = 64;
pub const FRAME_NAME_LENGTH: usize = 16;
/// Scale, offset and name preceding a frame's vertices.
pub const FRAME_HEADER_SIZE: usize = 6 * 4 + FRAME_NAME_LENGTH;
/// Vertex index and two UV floats.
const COMMAND_VERTEX_SIZE: usize = 3 * 4;

/// Byte size of a frame with one 4-byte vertex per model vertex.
#[must_use]
pub fn frame_size(vertex_count: usize) -> usize {
    FRAME_HEADER_SIZE + vertex_count * 4
}

/// Decompressed frame vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AliasVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasFrame {
    pub name: String,
    pub vertices: Vec<AliasVertex>,
}

impl AliasFrame {
    fn position(&self, index: usize) -> Result<Vec3> {
        self.vertices
            .get(index)
            .map(|vertex| vertex.position)
            .ok_or_else(|| {
                ForgeError::format(format!(
                    "Mesh command references vertex {index}, but the frame has {} vertices",
                    self.vertices.len()
                ))
            })
    }
}

/// How a frame stores its vertex positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexPacking {
    /// One byte per axis followed by a normal index byte.
    Bytes,
    /// 11/10/11 bits for x/y/z in one `u32`, followed by a normal index byte.
    Packed32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandVertex {
    pub index: usize,
    pub uv: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshCommand {
    pub prim: PrimType,
    pub vertices: Vec<CommandVertex>,
}

/// Where a command vertex keeps its UVs relative to its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVertexOrder {
    UvThenIndex,
    IndexThenUv,
}

/// Layout of a mesh command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLayout {
    pub vertex_order: CommandVertexOrder,
    /// `i32` words following each count that carry no geometry.
    pub skipped_words: usize,
    /// Upper bound on the number of commands read.
    pub max_commands: Option<usize>,
}

pub fn parse_skin_names(mut reader: Reader, count: usize) -> Result<Vec<String>> {
    reader.ensure_count(count, SKIN_NAME_LENGTH)?;
    (0..count)
        .map(|_| reader.read_string(SKIN_NAME_LENGTH))
        .collect()
}

fn read_normal(reader: &mut Reader) -> Result<Vec3> {
    Ok(normals::normal(reader.read_u8()?).unwrap_or(Vec3::ZERO))
}

/// Parses one frame: scale, offset, name and `vertex_count` vertices.
///
/// Positions are decompressed as `offset + scale * raw` per axis.
pub fn parse_frame(mut reader: Reader, vertex_count: usize, packing: VertexPacking) -> Result<AliasFrame> {
    let scale = reader.read_vec3()?;
    let offset = reader.read_vec3()?;
    let name = reader.read_string(FRAME_NAME_LENGTH)?;

    let vertex_size = match packing {
        VertexPacking::Bytes => 4,
        VertexPacking::Packed32 => 5,
    };
    reader.ensure_count(vertex_count, vertex_size)?;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let raw = match packing {
            VertexPacking::Bytes => {
                let [x, y, z] = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
                Vec3::new(f32::from(x), f32::from(y), f32::from(z))
            }
            VertexPacking::Packed32 => {
                let packed = reader.read_u32()?;
                Vec3::new(
                    ((packed & 0xFFE0_0000) >> 21) as f32,
                    ((packed & 0x001F_F800) >> 11) as f32,
                    (packed & 0x7FF) as f32,
                )
            }
        };
        let normal = read_normal(&mut reader)?;
        vertices.push(AliasVertex {
            position: offset + scale * raw,
            normal,
        });
    }

    Ok(AliasFrame { name, vertices })
}

fn parse_command_vertices(
    reader: &mut Reader,
    count: usize,
    order: CommandVertexOrder,
) -> Result<Vec<CommandVertex>> {
    reader.ensure_count(count, COMMAND_VERTEX_SIZE)?;
    let mut vertices = Vec::with_capacity(count);
    for _ in 0..count {
        let vertex = match order {
            CommandVertexOrder::UvThenIndex => {
                let uv = reader.read_vec2()?;
                let index = reader.read_size()?;
                CommandVertex { index, uv }
            }
            CommandVertexOrder::IndexThenUv => {
                let index = reader.read_size()?;
                let uv = reader.read_vec2()?;
                CommandVertex { index, uv }
            }
        };
        vertices.push(vertex);
    }
    Ok(vertices)
}

/// Parses mesh commands until a zero count, the end of the reader, or
/// `layout.max_commands` commands.
///
/// A negative count introduces a triangle fan, a positive one a triangle strip.
pub fn parse_commands(mut reader: Reader, layout: CommandLayout) -> Result<Vec<MeshCommand>> {
    let mut commands = Vec::new();
    while !reader.eof() && layout.max_commands.is_none_or(|max| commands.len() < max) {
        let count = reader.read_i32()?;
        if count == 0 {
            break;
        }
        for _ in 0..layout.skipped_words {
            reader.read_i32()?;
        }

        let prim = if count < 0 {
            PrimType::TriangleFan
        } else {
            PrimType::TriangleStrip
        };
        let vertices =
            parse_command_vertices(&mut reader, count.unsigned_abs() as usize, layout.vertex_order)?;
        commands.push(MeshCommand { prim, vertices });
    }
    Ok(commands)
}

/// Turns one frame into a mesh by resolving every command vertex against it.
pub fn build_frame_mesh(
    frame: &AliasFrame,
    commands: &[MeshCommand],
) -> Result<(Vec<EntityModelVertex>, IndexRangeMap, Aabb)> {
    let mut size = Size::default();
    let mut vertex_count = 0;
    for command in commands {
        vertex_count += command.vertices.len();
        size.inc(command.prim);
    }

    let mut builder = IndexRangeMapBuilder::new(vertex_count, &size);
    let mut bounds = AabbBuilder::default();
    for command in commands.iter().filter(|command| !command.vertices.is_empty()) {
        let vertices = command
            .vertices
            .iter()
            .map(|vertex| Ok(EntityModelVertex::new(frame.position(vertex.index)?, vertex.uv)))
            .collect::<Result<Vec<_>>>()?;
        bounds.add_all(vertices.iter().map(|vertex| vertex.position));
        builder.add_primitive(command.prim, vertices);
    }

    let (vertices, ranges) = builder.finish();
    Ok((vertices, ranges, bounds.bounds()))
}

/// Adds every frame to `model` and their meshes to a new surface named
/// `surface_name` that uses `skins`.
pub fn add_frames(
    model: &mut EntityModelData,
    surface_name: &str,
    skins: Vec<Material>,
    frames: &[AliasFrame],
    commands: &[MeshCommand],
) -> Result<()> {
    let mut meshes = Vec::with_capacity(frames.len());
    for frame in frames {
        let (vertices, ranges, bounds) = build_frame_mesh(frame, commands)?;
        let frame_index = model.add_frame(frame.name.clone(), bounds);
        meshes.push((frame_index, vertices, ranges));
    }

    let surface = model.add_surface(surface_name, frames.len());
    surface.set_skins(skins);
    for (frame_index, vertices, ranges) in meshes {
        surface.add_mesh(frame_index, vertices, ranges);
    }
    Ok(())
}
