//! Daikatana DKM models.
//!
//! Version 1 stores frame vertices like MD2. Version 2 packs each position
//! into 32 bits, so its frames are read with the stride from the header.
//! Skin paths in these files frequently point at `.bmp` files that only
//! exist as `.wal`; they are repaired with [`find_skin`](crate::assets::find_skin).

use std::path::Path;

use crate::assets::skin::resolve_and_load_skin_with;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension, parse_model_path};
use crate::loaders::alias::{
    self, CommandLayout, CommandVertexOrder, VertexPacking, parse_commands, parse_frame,
};
use crate::loaders::{LoadContext, ident};
use crate::model::{EntityModelData, Orientation, PitchType};

pub const IDENT: i32 = ident(b"DKMD");
pub const VERSION_1: i32 = 1;
pub const VERSION_2: i32 = 2;

// Each command count is followed by a skin index and a surface index.
const COMMANDS: CommandLayout = CommandLayout {
    vertex_order: CommandVertexOrder::IndexThenUv,
    skipped_words: 2,
    max_commands: None,
};

fn is_supported_version(version: i32) -> bool {
    version == VERSION_1 || version == VERSION_2
}

#[must_use]
pub fn can_load(path: &Path, mut reader: Reader) -> bool {
    has_extension(path, &["dkm"])
        && reader.read_i32().is_ok_and(|i| i == IDENT)
        && reader.read_i32().is_ok_and(is_supported_version)
}

pub fn load(name: &str, mut reader: Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown DKM model ident: {ident}")));
    }
    let version = reader.read_i32()?;
    if !is_supported_version(version) {
        return Err(ForgeError::format(format!("Unknown DKM model version: {version}")));
    }

    let _origin = reader.read_vec3()?;
    let frame_size = reader.read_size()?;
    let skin_count = reader.read_size()?;
    let vertex_count = reader.read_size()?;
    let _uv_count = reader.read_size()?;
    let _triangle_count = reader.read_size()?;
    let command_count = reader.read_size()?;
    let frame_count = reader.read_size()?;
    let _surface_count = reader.read_size()?;
    let skin_offset = reader.read_size()?;
    let _uv_offset = reader.read_size()?;
    let _triangle_offset = reader.read_size()?;
    let frame_offset = reader.read_size()?;
    let command_offset = reader.read_size()?;
    let _surface_offset = reader.read_size()?;

    let skin_names = alias::parse_skin_names(reader.sub_reader_from_begin_to_end(skin_offset)?, skin_count)?;
    let commands = parse_commands(
        reader.sub_reader_from_begin(command_offset, command_count * 4)?,
        COMMANDS,
    )?;

    let packing = if version == VERSION_1 {
        VertexPacking::Bytes
    } else {
        VertexPacking::Packed32
    };
    let frames = (0..frame_count)
        .map(|i| {
            parse_frame(
                reader.sub_reader_from_begin(frame_offset + i * frame_size, frame_size)?,
                vertex_count,
                packing,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let skins = skin_names
        .iter()
        .map(|skin| {
            let path = parse_model_path(skin);
            resolve_and_load_skin_with(&path.to_string_lossy(), ctx.fs, ctx)
        })
        .collect();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);
    alias::add_frames(&mut model, name, skins, &frames, &commands)?;
    Ok(model)
}
