//! Quake 2 MD2 models.

use std::path::Path;

use crate::assets::skin::load_skin_with;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension, parse_model_path};
use crate::loaders::LoadContext;
use crate::loaders::alias::{
    self, CommandLayout, CommandVertexOrder, VertexPacking, frame_size, parse_commands, parse_frame,
};
use crate::loaders::ident;
use crate::model::{EntityModelData, Orientation, PitchType};

pub const IDENT: i32 = ident(b"IDP2");
pub const VERSION: i32 = 8;

const COMMANDS: CommandLayout = CommandLayout {
    vertex_order: CommandVertexOrder::UvThenIndex,
    skipped_words: 0,
    max_commands: None,
};

#[must_use]
pub fn can_load(path: &Path, mut reader: Reader) -> bool {
    has_extension(path, &["md2"])
        && reader.read_i32().is_ok_and(|i| i == IDENT)
        && reader.read_i32().is_ok_and(|v| v == VERSION)
}

pub fn load(name: &str, mut reader: Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown MD2 model ident: {ident}")));
    }
    let version = reader.read_i32()?;
    if version != VERSION {
        return Err(ForgeError::format(format!("Unknown MD2 model version: {version}")));
    }

    let _skin_width = reader.read_size()?;
    let _skin_height = reader.read_size()?;
    let _frame_size = reader.read_size()?;
    let skin_count = reader.read_size()?;
    let vertex_count = reader.read_size()?;
    let _uv_count = reader.read_size()?;
    let _triangle_count = reader.read_size()?;
    let command_count = reader.read_size()?;
    let frame_count = reader.read_size()?;
    let skin_offset = reader.read_size()?;
    let _uv_offset = reader.read_size()?;
    let _triangle_offset = reader.read_size()?;
    let frame_offset = reader.read_size()?;
    let command_offset = reader.read_size()?;

    let skin_names = alias::parse_skin_names(reader.sub_reader_from_begin_to_end(skin_offset)?, skin_count)?;
    let commands = parse_commands(
        reader.sub_reader_from_begin(command_offset, command_count * 4)?,
        COMMANDS,
    )?;

    let frame_size = frame_size(vertex_count);
    let frames = (0..frame_count)
        .map(|i| {
            parse_frame(
                reader.sub_reader_from_begin(frame_offset + i * frame_size, frame_size)?,
                vertex_count,
                VertexPacking::Bytes,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let skins = skin_names
        .iter()
        .map(|skin| load_skin_with(&parse_model_path(skin), ctx.fs, ctx))
        .collect();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);
    alias::add_frames(&mut model, name, skins, &frames, &commands)?;
    Ok(model)
}
