//! Binary fixture writers shared by the integration tests.
//!
//! Each writer produces the smallest well-formed file of its format that
//! still exercises frames, skins and mesh records.

#![allow(dead_code)]

use glam::Vec3;

// ============================================================================
// Byte writer
// ============================================================================

#[derive(Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    pub fn size(&mut self, value: usize) -> &mut Self {
        self.i32(i32::try_from(value).unwrap())
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    pub fn vec3(&mut self, value: Vec3) -> &mut Self {
        self.f32(value.x).f32(value.y).f32(value.z)
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(value);
        self
    }

    /// NUL padded fixed-length string.
    pub fn string(&mut self, value: &str, len: usize) -> &mut Self {
        assert!(value.len() <= len, "'{value}' does not fit in {len} bytes");
        let mut padded = vec![0u8; len];
        padded[..value.len()].copy_from_slice(value.as_bytes());
        self.bytes(&padded)
    }

    /// Overwrites the `i32` at `offset`, used to patch header offsets.
    pub fn patch_size(&mut self, offset: usize, value: usize) {
        let value = i32::try_from(value).unwrap().to_le_bytes();
        self.bytes[offset..offset + 4].copy_from_slice(&value);
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

// ============================================================================
// Quake 2 family (MD2, MDX, DKM)
// ============================================================================

pub struct AliasFrameFixture {
    pub name: &'static str,
    pub scale: Vec3,
    pub offset: Vec3,
    /// Raw x, y, z and normal index per vertex.
    pub vertices: Vec<[u8; 4]>,
}

/// A mesh command: positive counts are strips, negative counts fans.
pub struct CommandFixture {
    pub count: i32,
    /// Vertex index and UV per command vertex.
    pub vertices: Vec<(i32, f32, f32)>,
}

pub struct AliasModelFixture {
    pub skins: Vec<&'static str>,
    pub frames: Vec<AliasFrameFixture>,
    pub commands: Vec<CommandFixture>,
}

impl AliasModelFixture {
    /// Two frames of a unit triangle fan, the second one shifted along x.
    pub fn triangle(skins: Vec<&'static str>) -> Self {
        let vertices = vec![[0, 0, 0, 0], [2, 0, 0, 0], [0, 2, 0, 0]];
        Self {
            skins,
            frames: vec![
                AliasFrameFixture {
                    name: "stand01",
                    scale: Vec3::splat(0.5),
                    offset: Vec3::ZERO,
                    vertices: vertices.clone(),
                },
                AliasFrameFixture {
                    name: "stand02",
                    scale: Vec3::splat(0.5),
                    offset: Vec3::new(4.0, 0.0, 0.0),
                    vertices,
                },
            ],
            commands: vec![CommandFixture {
                count: -3,
                vertices: vec![(0, 0.0, 0.0), (1, 1.0, 0.0), (2, 0.0, 1.0)],
            }],
        }
    }

    fn vertex_count(&self) -> usize {
        self.frames.first().map_or(0, |frame| frame.vertices.len())
    }

    fn write_skins(&self, writer: &mut ByteWriter) {
        for skin in &self.skins {
            writer.string(skin, 64);
        }
    }

    fn write_frames(&self, writer: &mut ByteWriter, packed: bool) {
        for frame in &self.frames {
            writer.vec3(frame.scale).vec3(frame.offset).string(frame.name, 16);
            for &[x, y, z, normal] in &frame.vertices {
                if packed {
                    writer.u32((u32::from(x) << 21) | (u32::from(y) << 11) | u32::from(z));
                    writer.bytes(&[normal]);
                } else {
                    writer.bytes(&[x, y, z, normal]);
                }
            }
        }
    }

    /// Writes the command stream and returns its length in `i32` words.
    fn write_commands(&self, writer: &mut ByteWriter, uv_first: bool, skipped_words: usize) -> usize {
        let start = writer.position();
        for command in &self.commands {
            writer.i32(command.count);
            for _ in 0..skipped_words {
                writer.i32(0);
            }
            for &(index, u, v) in &command.vertices {
                if uv_first {
                    writer.f32(u).f32(v).i32(index);
                } else {
                    writer.i32(index).f32(u).f32(v);
                }
            }
        }
        writer.i32(0);
        (writer.position() - start) / 4
    }

    pub fn md2(&self) -> Vec<u8> {
        const HEADER_SIZE: usize = 17 * 4;
        let mut writer = ByteWriter::new();
        let frame_size = 40 + self.vertex_count() * 4;
        writer
            .bytes(b"IDP2")
            .i32(8)
            .i32(64)
            .i32(64)
            .size(frame_size)
            .size(self.skins.len())
            .size(self.vertex_count())
            .i32(0)
            .i32(0);
        let command_count_at = writer.position();
        writer.i32(0).size(self.frames.len());
        let offsets_at = writer.position();
        writer.i32(0).i32(0).i32(0).i32(0).i32(0).i32(0);
        assert_eq!(writer.position(), HEADER_SIZE);

        let skin_offset = writer.position();
        self.write_skins(&mut writer);
        let frame_offset = writer.position();
        self.write_frames(&mut writer, false);
        let command_offset = writer.position();
        let command_count = self.write_commands(&mut writer, true, 0);

        writer.patch_size(command_count_at, command_count);
        writer.patch_size(offsets_at, skin_offset);
        writer.patch_size(offsets_at + 4, frame_offset);
        writer.patch_size(offsets_at + 8, frame_offset);
        writer.patch_size(offsets_at + 12, frame_offset);
        writer.patch_size(offsets_at + 16, command_offset);
        let end = writer.position();
        writer.patch_size(offsets_at + 20, end);
        writer.finish()
    }

    pub fn mdx(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        let frame_size = 40 + self.vertex_count() * 4;
        writer
            .bytes(b"IDPX")
            .i32(4)
            .i32(64)
            .i32(64)
            .size(frame_size)
            .size(self.skins.len())
            .size(self.vertex_count())
            .i32(0);
        let command_count_at = writer.position();
        writer.i32(0).size(self.frames.len()).i32(0).i32(0).i32(1);
        let offsets_at = writer.position();
        writer.i32(0).i32(0).i32(0).i32(0);
        // Vertex info, sfx and bounding box offsets, then the end offset.
        for _ in 0..6 {
            writer.i32(0);
        }

        let skin_offset = writer.position();
        self.write_skins(&mut writer);
        let frame_offset = writer.position();
        self.write_frames(&mut writer, false);
        let command_offset = writer.position();
        let command_count = self.write_commands(&mut writer, false, 0);

        writer.patch_size(command_count_at, command_count);
        writer.patch_size(offsets_at, skin_offset);
        writer.patch_size(offsets_at + 4, frame_offset);
        writer.patch_size(offsets_at + 8, frame_offset);
        writer.patch_size(offsets_at + 12, command_offset);
        writer.finish()
    }

    pub fn dkm(&self, version: i32) -> Vec<u8> {
        let packed = version == 2;
        let vertex_size = if packed { 5 } else { 4 };
        let frame_size = 40 + self.vertex_count() * vertex_size;

        let mut writer = ByteWriter::new();
        writer
            .bytes(b"DKMD")
            .i32(version)
            .vec3(Vec3::ZERO)
            .size(frame_size)
            .size(self.skins.len())
            .size(self.vertex_count())
            .i32(0)
            .i32(0);
        let command_count_at = writer.position();
        writer.i32(0).size(self.frames.len()).i32(1);
        let offsets_at = writer.position();
        for _ in 0..6 {
            writer.i32(0);
        }

        let skin_offset = writer.position();
        self.write_skins(&mut writer);
        let frame_offset = writer.position();
        self.write_frames(&mut writer, packed);
        let command_offset = writer.position();
        let command_count = self.write_commands(&mut writer, false, 2);

        writer.patch_size(command_count_at, command_count);
        writer.patch_size(offsets_at, skin_offset);
        writer.patch_size(offsets_at + 4, frame_offset);
        writer.patch_size(offsets_at + 8, frame_offset);
        writer.patch_size(offsets_at + 12, frame_offset);
        writer.patch_size(offsets_at + 16, command_offset);
        writer.patch_size(offsets_at + 20, command_offset);
        writer.finish()
    }
}

// ============================================================================
// Palettes
// ============================================================================

/// `.lmp` palette where colour `i` is `(i, 255 - i, 0)`.
pub fn gradient_palette() -> Vec<u8> {
    (0..=255u8).flat_map(|i| [i, 255 - i, 0]).collect()
}

// ============================================================================
// Quake 1 MDL
// ============================================================================

/// Header of a three vertex model with one 4x2 skin.
fn mdl_header(writer: &mut ByteWriter, frames: usize, flags: u32) {
    writer
        .bytes(b"IDPO")
        .i32(6)
        .vec3(Vec3::ONE)
        .vec3(Vec3::new(-1.0, -1.0, -1.0))
        .f32(10.0)
        .vec3(Vec3::new(0.0, 0.0, 22.0))
        .i32(1)
        .i32(4)
        .i32(2)
        .i32(3)
        .i32(1)
        .size(frames)
        .i32(0)
        .u32(flags)
        .f32(1.0);
    assert_eq!(writer.position(), 0x54);
}

/// Skin vertices and the single back facing triangle.
fn mdl_geometry(writer: &mut ByteWriter) {
    for (onseam, s, t) in [(0, 0, 0), (1, 2, 0), (0, 0, 2)] {
        writer.i32(onseam).i32(s).i32(t);
    }
    writer.i32(0).i32(0).i32(1).i32(2);
}

/// Bounding vertices, name and three packed vertices of one frame.
fn mdl_frame(writer: &mut ByteWriter, name: &str, vertices: [[u8; 3]; 3]) {
    writer
        .bytes(&[0, 0, 0, 0])
        .bytes(&[4, 4, 4, 0])
        .string(name, 16);
    for [x, y, z] in vertices {
        writer.bytes(&[x, y, z, 0]);
    }
}

const MDL_FRAME_VERTICES: [[u8; 3]; 3] = [[1, 1, 1], [3, 1, 1], [1, 3, 1]];

/// A 4x2 skin and one triangle whose second vertex lies on the seam and
/// whose face points backwards. `frames` simple frames are written.
pub fn mdl_triangle(frames: usize, flags: u32) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    mdl_header(&mut writer, frames, flags);

    // One single skin picture using palette indices 0..8.
    writer.i32(0).bytes(&[0, 1, 2, 3, 4, 5, 6, 7]);
    mdl_geometry(&mut writer);

    for frame in 0..frames {
        writer.i32(0);
        mdl_frame(&mut writer, &format!("frame{frame}"), MDL_FRAME_VERTICES);
    }
    writer.finish()
}

/// Animated variant of [`mdl_triangle`]: the skin is a group of two
/// pictures and the first of two frames is a group of two sub-frames. The
/// second frame is a simple frame named `after` whose last vertex moves to
/// byte coordinates (5, 1, 1).
pub fn mdl_grouped() -> Vec<u8> {
    let mut writer = ByteWriter::new();
    mdl_header(&mut writer, 2, 0);

    writer
        .i32(1)
        .i32(2)
        .f32(0.1)
        .f32(0.2)
        .bytes(&[0, 1, 2, 3, 4, 5, 6, 7])
        .bytes(&[200; 8]);
    mdl_geometry(&mut writer);

    writer
        .i32(1)
        .i32(2)
        .bytes(&[0, 0, 0, 0])
        .bytes(&[4, 4, 4, 0])
        .f32(0.1)
        .f32(0.2);
    mdl_frame(&mut writer, "group0", MDL_FRAME_VERTICES);
    mdl_frame(&mut writer, "group1", [[2, 2, 2], [2, 2, 2], [2, 2, 2]]);

    writer.i32(0);
    mdl_frame(&mut writer, "after", [[1, 1, 1], [3, 1, 1], [5, 1, 1]]);
    writer.finish()
}

// ============================================================================
// Quake 3 MD3
// ============================================================================

/// One surface with one triangle, one shader and `frames` frames.
///
/// The surface declares `surface_frames` frames so mismatches can be produced.
pub fn md3_triangle(frames: usize, surface_frames: usize, shader: &str) -> Vec<u8> {
    const HEADER_SIZE: usize = 108;
    const FRAME_SIZE: usize = 56;

    let mut writer = ByteWriter::new();
    let surface_offset = HEADER_SIZE + frames * FRAME_SIZE;
    writer
        .bytes(b"IDP3")
        .i32(15)
        .string("models/box.md3", 64)
        .i32(0)
        .size(frames)
        .i32(0)
        .i32(1)
        .i32(0)
        .size(HEADER_SIZE)
        .size(surface_offset)
        .size(surface_offset)
        .i32(0);
    assert_eq!(writer.position(), HEADER_SIZE);

    for frame in 0..frames {
        writer
            .vec3(Vec3::ZERO)
            .vec3(Vec3::ONE)
            .vec3(Vec3::ZERO)
            .f32(1.0)
            .string(&format!("frame{frame}"), 16);
    }

    // Surface header, then shaders, triangles, UVs and positions.
    let shader_offset = 108;
    let triangle_offset = shader_offset + 68;
    let uv_offset = triangle_offset + 12;
    let vertex_offset = uv_offset + 3 * 8;
    let end_offset = vertex_offset + surface_frames * 3 * 8;
    writer
        .bytes(b"IDP3")
        .string("body", 64)
        .i32(0)
        .size(surface_frames)
        .i32(1)
        .i32(3)
        .i32(1)
        .size(triangle_offset)
        .size(shader_offset)
        .size(uv_offset)
        .size(vertex_offset)
        .size(end_offset);
    writer.string(shader, 64).i32(0);
    writer.i32(0).i32(1).i32(2);
    writer.f32(0.0).f32(0.0).f32(1.0).f32(0.0).f32(0.0).f32(1.0);
    for frame in 0..surface_frames {
        let x = i16::try_from(frame).unwrap() * 64;
        for [vx, vy, vz] in [[0, 0, 0], [64, 0, 0], [0, 128, 0]] {
            writer.i16(vx + x).i16(vy).i16(vz).i16(0);
        }
    }
    writer.finish()
}

// ============================================================================
// SPR
// ============================================================================

/// Picture origin and size.
pub type Picture = (i32, i32, u32, u32);

pub enum SpriteFrameFixture {
    Single(Picture),
    Group(Vec<Picture>),
}

fn write_picture(writer: &mut ByteWriter, (x, y, w, h): Picture, index: u8) {
    writer
        .i32(x)
        .i32(y)
        .size(w as usize)
        .size(h as usize)
        .bytes(&vec![index; (w * h) as usize]);
}

/// Version 1 sprite, expanded with an external palette.
pub fn spr_v1(sprite_type: i32, frames: &[SpriteFrameFixture]) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer
        .bytes(b"IDSP")
        .i32(1)
        .i32(sprite_type)
        .f32(16.0)
        .i32(8)
        .i32(8)
        .size(frames.len())
        .f32(0.0)
        .i32(0);
    for frame in frames {
        match frame {
            SpriteFrameFixture::Single(picture) => {
                writer.i32(0);
                write_picture(&mut writer, *picture, 1);
            }
            SpriteFrameFixture::Group(pictures) => {
                writer.i32(1).size(pictures.len());
                for _ in pictures {
                    writer.f32(0.1);
                }
                for (index, picture) in pictures.iter().enumerate() {
                    write_picture(&mut writer, *picture, u8::try_from(index).unwrap() + 1);
                }
            }
        }
    }
    writer.finish()
}

// ============================================================================
// SiN
// ============================================================================

/// A `.def` file: the `SDEF` ident followed by `body`.
pub fn sin_definition(body: &str) -> Vec<u8> {
    let mut bytes = b"SDEF\n".to_vec();
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

/// Base model with two groups of one triangle each over four vertices.
///
/// Group 0 uses vertices 0, 1, 2 and UVs 0, 1, 2. Group 1 uses vertices
/// 0, 2, 3 and UVs 0, 2, 1. The UVs are (0, 0), (1, 0) and (0, 1).
pub fn sin_base_model() -> Vec<u8> {
    const HEADER_SIZE: usize = 28;
    const GROUP_SIZE: usize = 24;
    const TRIANGLES_AT: usize = HEADER_SIZE + 2 * GROUP_SIZE;
    const UVS_AT: usize = TRIANGLES_AT + 2 * 16;

    let mut writer = ByteWriter::new();
    writer
        .bytes(b"SBM ")
        .i32(1)
        .i32(4)
        .i32(3)
        .i32(2)
        .size(UVS_AT)
        .size(UVS_AT + 3 * 8);
    assert_eq!(writer.position(), HEADER_SIZE);

    for group in 0..2 {
        let record_at = HEADER_SIZE + group * GROUP_SIZE;
        let triangle_at = TRIANGLES_AT + group * 16;
        writer
            .size(group)
            .i32(1)
            .i32(0)
            .i32(0)
            .size(triangle_at - record_at)
            .i32(0);
    }

    for ([a, b, c], [s, t, u]) in [([0, 1, 2], [0, 1, 2]), ([0, 2, 3], [0, 2, 1])] {
        writer.i16(a).i16(b).i16(c).i16(s).i16(t).i16(u).i32(0);
    }
    assert_eq!(writer.position(), UVS_AT);
    writer.f32(0.0).f32(0.0).f32(1.0).f32(0.0).f32(0.0).f32(1.0);
    writer.finish()
}

/// Animation with one frame scaled by 2 and translated by (1, 0, 0). The
/// raw vertices are the origin and the three unit axes.
pub fn sin_animation() -> Vec<u8> {
    const HEADER_SIZE: usize = 128;
    const FRAME_HEADER_SIZE: usize = 44;

    let mut writer = ByteWriter::new();
    writer
        .bytes(b"SAM ")
        .i32(1)
        .string("idle", 64)
        .vec3(Vec3::ONE)
        .vec3(Vec3::ZERO)
        .vec3(Vec3::ZERO)
        .f32(0.1)
        .i32(4)
        .i32(1)
        .size(HEADER_SIZE)
        .size(HEADER_SIZE + FRAME_HEADER_SIZE + 4 * 4);
    assert_eq!(writer.position(), HEADER_SIZE);

    writer
        .vec3(Vec3::ZERO)
        .f32(0.1)
        .vec3(Vec3::splat(2.0))
        .vec3(Vec3::X)
        .size(FRAME_HEADER_SIZE);
    for vertex in [[0, 0, 0, 0], [1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0]] {
        writer.bytes(&vertex);
    }
    writer.finish()
}

// ============================================================================
// Images
// ============================================================================

/// Uncompressed 32 bit true colour TGA with the origin in the top left corner.
pub fn tga(width: u16, height: u16, bgra: [u8; 4]) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer
        .bytes(&[0, 0, 2])
        .bytes(&[0; 5])
        .u16(0)
        .u16(0)
        .u16(width)
        .u16(height)
        .bytes(&[32, 0x28]);
    for _ in 0..usize::from(width) * usize::from(height) {
        writer.bytes(&bgra);
    }
    writer.finish()
}

pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Daikatana WAL (version 3) with an embedded palette where colour `i` is `(i, i, i)`.
pub fn dk_wal(width: u32, height: u32, index: u8) -> Vec<u8> {
    const SIZE_OFFSET: usize = 1 + 32 + 3;
    const PALETTE_OFFSET: usize = SIZE_OFFSET + 8 + 9 * 4 + 32 + 4 + 4;

    let mut writer = ByteWriter::new();
    writer.bytes(&[3]).string("skin", 32).bytes(&[0, 0, 0]);
    assert_eq!(writer.position(), SIZE_OFFSET);
    writer.u32(width).u32(height);
    let mip_offsets_at = writer.position();
    for _ in 0..9 {
        writer.u32(0);
    }
    writer.string("", 32).i32(0).i32(0);
    assert_eq!(writer.position(), PALETTE_OFFSET);
    writer.bytes(&(0..=255u8).flat_map(|i| [i, i, i]).collect::<Vec<_>>());
    writer.i32(0);
    let pixels_at = writer.position();
    writer.bytes(&vec![index; (width * height) as usize]);
    writer.patch_size(mip_offsets_at, pixels_at);
    writer.finish()
}
