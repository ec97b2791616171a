//! SiN models.
//!
//! A SiN entity model is spread over three files. The `.def` file is text
//! after a four byte `SDEF` ident and names the other two: a base model
//! (`.sbm`) with triangle groups and UVs, and an animation (`.sam`) with
//! the vertex positions of every frame. Only the first animation frame is
//! decoded.
//!
//! ```text
//! SDEF
//! path models/guard
//! scale 0.5
//! origin 0 0 12
//! guard.sbm
//! skin skin guard.tga
//! idle idle.sam
//! id 1 body 0 twosided
//! !server parameters are ignored
//! ```

use std::path::Path;

use glam::{Vec2, Vec3};
use rustc_hash::FxHashSet;

use crate::assets::Material;
use crate::assets::skin::load_skin;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension, parse_model_path};
use crate::loaders::{LoadContext, ident, model_name};
use crate::model::{
    AabbBuilder, EntityModelData, EntityModelVertex, IndexRangeMapBuilder, Orientation,
    PitchType, PrimType, Size,
};

pub const IDENT: i32 = ident(b"SDEF");
pub const BASE_MODEL_IDENT: i32 = ident(b"SBM ");
pub const BASE_MODEL_VERSION: i32 = 1;
pub const ANIMATION_IDENT: i32 = ident(b"SAM ");
pub const ANIMATION_VERSION: i32 = 1;

const BASE_HEADER_SIZE: usize = 7 * 4;
const GROUP_SIZE: usize = 6 * 4;
const TRIANGLE_SIZE: usize = 6 * 2 + 4;
const UV_SIZE: usize = 2 * 4;
const ANIMATION_NAME_LENGTH: usize = 64;
const VERTEX_SIZE: usize = 4;

#[must_use]
pub fn can_load(path: &Path, mut reader: Reader) -> bool {
    has_extension(path, &["def"]) && reader.read_i32().is_ok_and(|i| i == IDENT)
}

/// Decodes the definition at `path` together with the base model and
/// animation it names.
pub fn load(path: &Path, reader: &Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let mut reader = reader.clone();
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown SiN model ident: {ident}")));
    }

    let name = model_name(path);
    let text = String::from_utf8_lossy(reader.remaining());
    let definition = Definition::parse(&text)?;

    let directory = definition
        .path
        .as_deref()
        .map_or_else(|| path.with_extension(""), parse_model_path);
    let base_model = definition.model.clone().unwrap_or_else(|| {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        format!("{stem}.sbm")
    });
    let Some(animation) = definition.animation.as_deref() else {
        return Err(ForgeError::format(format!("SiN model {name} names no animation")));
    };

    let frame = AnimationFrame::parse(ctx.fs.open_file(&directory.join(animation))?)?;
    let base = BaseModel::parse(
        ctx.fs.open_file(&directory.join(&base_model))?,
        frame.vertices.len(),
    )?;

    let skin = match definition.skin.as_deref() {
        Some(skin) => load_skin(&directory.join(skin), ctx.fs, None),
        None => {
            log::warn!("SiN model {name} names no skin");
            Material::default_placeholder(name.clone())
        }
    };

    let offset = (frame.translate + definition.origin) * definition.scale;
    let scale = frame.scale * definition.scale;
    let position = |index: usize| offset + frame.vertices[index] * scale;

    let mut vertices = Vec::new();
    for group in &base.groups {
        let two_sided = definition.two_sided_groups.contains(&group.id);
        for triangle in &group.triangles {
            let corner = |k: usize| {
                EntityModelVertex::new(position(triangle.positions[k]), base.uvs[triangle.uvs[k]])
            };
            vertices.extend([corner(0), corner(1), corner(2)]);
            if two_sided {
                vertices.extend([corner(2), corner(1), corner(0)]);
            }
        }
    }

    let mut bounds = AabbBuilder::default();
    bounds.add_all(vertices.iter().map(|vertex| vertex.position));

    let mut size = Size::default();
    size.inc(PrimType::Triangles);
    let mut builder = IndexRangeMapBuilder::new(vertices.len(), &size);
    builder.add_triangles(vertices);
    let (vertices, ranges) = builder.finish();

    let frame_name = Path::new(animation)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);
    let frame_index = model.add_frame(frame_name, bounds.bounds());
    let surface = model.add_surface(name, 1);
    surface.set_skins(vec![skin]);
    surface.add_mesh(frame_index, vertices, ranges);
    Ok(model)
}

// ============================================================================
// Definition
// ============================================================================

/// What a `.def` file says about the model.
#[derive(Debug, Clone)]
struct Definition {
    path: Option<String>,
    model: Option<String>,
    skin: Option<String>,
    animation: Option<String>,
    origin: Vec3,
    scale: f32,
    /// Zero-based ids of the triangle groups that are drawn from both sides.
    two_sided_groups: FxHashSet<i32>,
}

impl Default for Definition {
    fn default() -> Self {
        Self {
            path: None,
            model: None,
            skin: None,
            animation: None,
            origin: Vec3::ZERO,
            scale: 1.0,
            two_sided_groups: FxHashSet::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    line: usize,
    column: usize,
}

impl Word {
    fn error(&self, message: impl Into<String>) -> ForgeError {
        ForgeError::Parse {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn is(&self, keyword: &str) -> bool {
        self.text.eq_ignore_ascii_case(keyword)
    }

    fn has_suffix(&self, suffix: &str) -> bool {
        self.text.len() >= suffix.len()
            && self.text.as_bytes()[self.text.len() - suffix.len()..]
                .eq_ignore_ascii_case(suffix.as_bytes())
    }

    fn float(&self) -> Result<f32> {
        self.text
            .parse()
            .map_err(|_| self.error(format!("Expected number but got '{}'", self.text)))
    }

    fn integer(&self) -> Result<i32> {
        self.text
            .parse()
            .map_err(|_| self.error(format!("Expected integer but got '{}'", self.text)))
    }
}

impl Definition {
    fn parse(text: &str) -> Result<Self> {
        let mut definition = Self::default();
        for words in split_lines(text)? {
            let Some((first, arguments)) = words.split_first() else {
                continue;
            };
            // Server side parameters follow.
            if first.text.starts_with('!') {
                break;
            }

            if first.is("path") {
                definition.path = Some(argument(first, arguments, 0)?.text.clone());
            } else if first.is("scale") {
                definition.scale = argument(first, arguments, 0)?.float()?;
            } else if first.is("origin") {
                definition.origin = Vec3::new(
                    argument(first, arguments, 0)?.float()?,
                    argument(first, arguments, 1)?.float()?,
                    argument(first, arguments, 2)?.float()?,
                );
            } else if first.has_suffix(".sbm") {
                definition.model = Some(first.text.clone());
            } else {
                definition.parse_entry(&words)?;
            }
        }
        Ok(definition)
    }

    /// Lines naming a skin or an animation end with the file name. Group
    /// lines start with `id`, a one-based group id and two more words
    /// before their flags.
    fn parse_entry(&mut self, words: &[Word]) -> Result<()> {
        let (Some(first), Some(last)) = (words.first(), words.last()) else {
            return Ok(());
        };
        if last.has_suffix(".tga") {
            self.skin.get_or_insert_with(|| last.text.clone());
        } else if last.has_suffix(".sam") {
            self.animation.get_or_insert_with(|| last.text.clone());
        } else if first.is("id") {
            let id = argument(first, &words[1..], 0)?.integer()? - 1;
            if words.iter().skip(4).any(|word| word.is("twosided")) {
                self.two_sided_groups.insert(id);
            }
        }
        Ok(())
    }
}

fn argument<'w>(directive: &Word, arguments: &'w [Word], index: usize) -> Result<&'w Word> {
    arguments.get(index).ok_or_else(|| {
        directive.error(format!("Missing argument {} of '{}'", index + 1, directive.text))
    })
}

/// Splits the text into lines of words. Quoted words may contain
/// whitespace, and comments are dropped. A block comment that spans a line
/// break joins the lines around it.
fn split_lines(text: &str) -> Result<Vec<Vec<Word>>> {
    let bytes = text.as_bytes();
    let mut lines = vec![Vec::new()];
    let mut pos = 0;
    let mut line = 1;
    let mut line_start = 0;

    while pos < bytes.len() {
        let column = pos - line_start + 1;
        match bytes[pos] {
            b'\n' => {
                pos += 1;
                line += 1;
                line_start = pos;
                lines.push(Vec::new());
            }
            c if c.is_ascii_whitespace() => pos += 1,
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                loop {
                    match bytes.get(pos) {
                        None => {
                            return Err(ForgeError::Parse {
                                line,
                                column,
                                message: "Unterminated comment".to_string(),
                            });
                        }
                        Some(b'*') if bytes.get(pos + 1) == Some(&b'/') => {
                            pos += 2;
                            break;
                        }
                        Some(b'\n') => {
                            pos += 1;
                            line += 1;
                            line_start = pos;
                        }
                        Some(_) => pos += 1,
                    }
                }
            }
            b'"' => {
                let start = pos + 1;
                pos = start;
                while pos < bytes.len() && bytes[pos] != b'"' && bytes[pos] != b'\n' {
                    pos += if bytes[pos] == b'\\' { 2 } else { 1 };
                }
                if bytes.get(pos) != Some(&b'"') {
                    return Err(ForgeError::Parse {
                        line,
                        column,
                        message: "Unterminated string".to_string(),
                    });
                }
                let text = text[start..pos].to_string();
                pos += 1;
                push_word(&mut lines, Word { text, line, column });
            }
            _ => {
                let start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                let text = text[start..pos].to_string();
                push_word(&mut lines, Word { text, line, column });
            }
        }
    }
    Ok(lines)
}

fn push_word(lines: &mut [Vec<Word>], word: Word) {
    if let Some(words) = lines.last_mut() {
        words.push(word);
    }
}

// ============================================================================
// Base model and animation
// ============================================================================

#[derive(Debug)]
struct Triangle {
    positions: [usize; 3],
    uvs: [usize; 3],
}

#[derive(Debug)]
struct Group {
    id: i32,
    triangles: Vec<Triangle>,
}

/// Triangle groups and UVs of an `.sbm` file.
#[derive(Debug)]
struct BaseModel {
    groups: Vec<Group>,
    uvs: Vec<Vec2>,
}

impl BaseModel {
    /// Triangles may only reference the `vertex_count` vertices of the
    /// animation frame.
    fn parse(mut reader: Reader, vertex_count: usize) -> Result<Self> {
        let ident = reader.read_i32()?;
        if ident != BASE_MODEL_IDENT {
            return Err(ForgeError::format(format!("Unknown SiN base model ident: {ident}")));
        }
        let version = reader.read_i32()?;
        if version != BASE_MODEL_VERSION {
            return Err(ForgeError::format(format!(
                "Unknown SiN base model version: {version}"
            )));
        }

        let _vertex_count = reader.read_size()?;
        let uv_count = reader.read_size()?;
        let group_count = reader.read_size()?;
        let uv_offset = reader.read_size()?;
        let _end_offset = reader.read_size()?;

        reader.ensure_count(group_count, GROUP_SIZE)?;
        let mut groups = Vec::with_capacity(group_count);
        for index in 0..group_count {
            let id = reader.read_i32()?;
            let triangle_count = reader.read_size()?;
            let _command_count = reader.read_i32()?;
            let _command_offset = reader.read_i32()?;
            // Relative to the start of the group record.
            let triangle_offset = reader.read_size()?;
            let _end_offset = reader.read_i32()?;

            let start = BASE_HEADER_SIZE + index * GROUP_SIZE + triangle_offset;
            let mut triangle_reader = reader.sub_reader_from_begin_to_end(start)?;
            triangle_reader.ensure_count(triangle_count, TRIANGLE_SIZE)?;
            let triangles = (0..triangle_count)
                .map(|_| {
                    let positions = read_indices(&mut triangle_reader, vertex_count, "vertex")?;
                    let uvs = read_indices(&mut triangle_reader, uv_count, "UV")?;
                    let _id = triangle_reader.read_i32()?;
                    Ok(Triangle { positions, uvs })
                })
                .collect::<Result<Vec<_>>>()?;
            groups.push(Group { id, triangles });
        }

        let mut uv_reader = reader.sub_reader_from_begin_to_end(uv_offset)?;
        uv_reader.ensure_count(uv_count, UV_SIZE)?;
        let uvs = (0..uv_count)
            .map(|_| uv_reader.read_vec2())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { groups, uvs })
    }
}

fn read_indices(reader: &mut Reader, count: usize, kind: &str) -> Result<[usize; 3]> {
    let mut indices = [0; 3];
    for index in &mut indices {
        let raw = reader.read_i16()?;
        *index = usize::try_from(raw)
            .ok()
            .filter(|&i| i < count)
            .ok_or_else(|| {
                ForgeError::format(format!(
                    "SiN triangle references {kind} {raw}, but the model has {count}"
                ))
            })?;
    }
    Ok(indices)
}

/// The first frame of a `.sam` file.
#[derive(Debug)]
struct AnimationFrame {
    scale: Vec3,
    translate: Vec3,
    /// Raw byte coordinates.
    vertices: Vec<Vec3>,
}

impl AnimationFrame {
    fn parse(mut reader: Reader) -> Result<Self> {
        let ident = reader.read_i32()?;
        if ident != ANIMATION_IDENT {
            return Err(ForgeError::format(format!("Unknown SiN animation ident: {ident}")));
        }
        let version = reader.read_i32()?;
        if version != ANIMATION_VERSION {
            return Err(ForgeError::format(format!(
                "Unknown SiN animation version: {version}"
            )));
        }

        let _name = reader.read_string(ANIMATION_NAME_LENGTH)?;
        let _scale = reader.read_vec3()?;
        let _translate = reader.read_vec3()?;
        let _total_delta = reader.read_vec3()?;
        let _total_time = reader.read_f32()?;
        let vertex_count = reader.read_size()?;
        let frame_count = reader.read_size()?;
        let frame_offset = reader.read_size()?;
        let _end_offset = reader.read_size()?;

        if frame_count == 0 {
            return Err(ForgeError::format("SiN animation has no frames"));
        }

        let mut frame = reader.sub_reader_from_begin_to_end(frame_offset)?;
        let _move_delta = frame.read_vec3()?;
        let _frame_time = frame.read_f32()?;
        let scale = frame.read_vec3()?;
        let translate = frame.read_vec3()?;
        let vertex_offset = frame.read_size()?;

        let mut vertex_reader = reader.sub_reader_from_begin_to_end(
            frame_offset.checked_add(vertex_offset).ok_or_else(|| {
                ForgeError::format(format!("SiN vertex offset {vertex_offset} is out of range"))
            })?,
        )?;
        vertex_reader.ensure_count(vertex_count, VERTEX_SIZE)?;
        let vertices = (0..vertex_count)
            .map(|_| {
                let packed = vertex_reader.read_bytes(VERTEX_SIZE)?;
                Ok(Vec3::new(
                    f32::from(packed[0]),
                    f32::from(packed[1]),
                    f32::from(packed[2]),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            scale,
            translate,
            vertices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<Vec<String>> {
        split_lines(text)
            .unwrap()
            .into_iter()
            .map(|line| line.into_iter().map(|word| word.text).collect())
            .collect()
    }

    #[test]
    fn test_split_lines_drops_comments() {
        assert_eq!(
            words("path \"models/a b\" // trailing\n/* x */ scale 2\n"),
            vec![
                vec!["path".to_string(), "models/a b".to_string()],
                vec!["scale".to_string(), "2".to_string()],
                vec![],
            ]
        );
        // A block comment across a line break joins both lines.
        assert_eq!(words("id 1 /*\n*/ x"), vec![vec!["id", "1", "x"]]);
    }

    #[test]
    fn test_definition_directives() {
        let definition = Definition::parse(
            "PATH models/guard\nscale 0.5\norigin 1 2 3\nGuard.SBM\n\
             skin skin guard.tga\nskin other other.tga\nidle idle.sam\n\
             id 2 body 0 twosided\n!sound ignored.tga\n",
        )
        .unwrap();

        assert_eq!(definition.path.as_deref(), Some("models/guard"));
        assert!((definition.scale - 0.5).abs() < f32::EPSILON);
        assert_eq!(definition.origin, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(definition.model.as_deref(), Some("Guard.SBM"));
        assert_eq!(definition.skin.as_deref(), Some("guard.tga"));
        assert_eq!(definition.animation.as_deref(), Some("idle.sam"));
        assert!(definition.two_sided_groups.contains(&1));
        assert_eq!(definition.two_sided_groups.len(), 1);
    }

    #[test]
    fn test_bad_number_reports_position() {
        let error = Definition::parse("scale\nscale big\n").unwrap_err();
        assert!(matches!(error, ForgeError::Parse { line: 1, column: 1, .. }));

        let error = Definition::parse("path x\nscale big\n").unwrap_err();
        assert!(matches!(error, ForgeError::Parse { line: 2, column: 7, .. }));
    }

    #[test]
    fn test_can_load_checks_extension_and_ident() {
        assert!(can_load(Path::new("models/guard.DEF"), Reader::from_bytes(b"SDEF\n".to_vec())));
        assert!(!can_load(Path::new("models/guard.def"), Reader::from_bytes(b"SBM \n".to_vec())));
        assert!(!can_load(Path::new("models/guard.sbm"), Reader::from_bytes(b"SDEF\n".to_vec())));
    }
}
