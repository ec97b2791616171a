//! 3ds Max ASCII Scene Export (ASE) models.
//!
//! ASE is a text format made of `*DIRECTIVE` tokens followed by arguments and
//! optional `{ ... }` blocks. Only the directives needed to build a static
//! textured mesh are interpreted; everything else is skipped together with
//! its block.
//!
//! ```text
//! *3DSMAX_ASCIIEXPORT 200
//! *MATERIAL_LIST {
//!     *MATERIAL_COUNT 1
//!     *MATERIAL 0 {
//!         *MAP_DIFFUSE { *BITMAP "..\textures\wall.tga" }
//!     }
//! }
//! *GEOMOBJECT {
//!     *NODE_NAME "box"
//!     *MATERIAL_REF 0
//!     *MESH { ... }
//! }
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

use glam::{Vec2, Vec3};

use crate::assets::skin::{find_skin_with_extensions, load_skin_with};
use crate::assets::Material;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension, parse_model_path};
use crate::loaders::LoadContext;
use crate::model::{
    AabbBuilder, EntityModelData, EntityModelVertex, MaterialIndexRangeMapBuilder, Orientation,
    PitchType, Size,
};

/// Name of the material appended for geometry without a usable material.
pub const DEFAULT_MATERIAL_NAME: &str = "__default";

// Upper bound for capacity hints taken from the file.
const MAX_RESERVE: usize = 1 << 16;

#[must_use]
pub fn can_load(path: &Path) -> bool {
    has_extension(path, &["ase"])
}

pub fn load(name: &str, reader: &Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let text = String::from_utf8_lossy(reader.remaining());
    let scene = AseParser::new(&text).parse()?;
    Ok(build_model(name, &scene, ctx))
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Directive,
    OpenBrace,
    CloseBrace,
    Colon,
    String,
    Integer,
    Decimal,
    Keyword,
    /// A word immediately followed by `:`, such as `A:` in a face definition.
    ArgumentName,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Directive => "directive",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::Colon => "':'",
            Self::String => "quoted string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Keyword => "keyword",
            Self::ArgumentName => "argument name",
            Self::Eof => "end of file",
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    line: usize,
    column: usize,
}

impl Token<'_> {
    fn error(&self, message: impl Into<String>) -> ForgeError {
        ForgeError::Parse {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

fn is_word_delimiter(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b':')
}

fn is_integer(word: &str) -> bool {
    let digits = word.strip_prefix(['-', '+']).unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit())
}

fn is_decimal(word: &str) -> bool {
    word.bytes().any(|c| c.is_ascii_digit())
        && word
            .bytes()
            .all(|c| c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.' | b'e' | b'E'))
        && word.parse::<f32>().is_ok()
}

struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    peeked: Option<Token<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Token<'a>> {
        match self.peeked {
            Some(token) => Ok(token),
            None => {
                let token = self.emit()?;
                self.peeked = Some(token);
                Ok(token)
            }
        }
    }

    fn next(&mut self) -> Result<Token<'a>> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.emit(),
        }
    }

    fn current(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn read_while(&mut self, mut predicate: impl FnMut(u8) -> bool) -> &'a str {
        let text = self.text;
        let start = self.pos;
        while self.current().is_some_and(&mut predicate) {
            self.advance();
        }
        &text[start..self.pos]
    }

    fn emit(&mut self) -> Result<Token<'a>> {
        loop {
            let (line, column) = (self.line, self.column);
            let token = |kind: TokenKind, text: &'a str| Token {
                kind,
                text,
                line,
                column,
            };

            let Some(c) = self.current() else {
                return Ok(token(TokenKind::Eof, ""));
            };
            match c {
                b' ' | b'\t' | b'\n' | b'\r' => self.advance(),
                b'*' => {
                    self.advance();
                    let name = self.read_while(|c| !is_word_delimiter(c));
                    return Ok(token(TokenKind::Directive, name));
                }
                b'{' => {
                    self.advance();
                    return Ok(token(TokenKind::OpenBrace, "{"));
                }
                b'}' => {
                    self.advance();
                    return Ok(token(TokenKind::CloseBrace, "}"));
                }
                b':' => {
                    self.advance();
                    return Ok(token(TokenKind::Colon, ":"));
                }
                b'"' => {
                    self.advance();
                    let content = self.read_while(|c| c != b'"');
                    if self.current().is_none() {
                        return Err(token(TokenKind::String, content).error("Unterminated string"));
                    }
                    self.advance();
                    return Ok(token(TokenKind::String, content));
                }
                _ => {
                    let word = self.read_while(|c| !is_word_delimiter(c));
                    let kind = if is_integer(word) {
                        TokenKind::Integer
                    } else if is_decimal(word) {
                        TokenKind::Decimal
                    } else if self.current() == Some(b':') {
                        self.advance();
                        TokenKind::ArgumentName
                    } else {
                        TokenKind::Keyword
                    };
                    return Ok(token(kind, word));
                }
            }
        }
    }
}

// ============================================================================
// Scene
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MaterialEntry {
    name: Option<String>,
    bitmap: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FaceVertex {
    vertex: usize,
    uv: usize,
}

#[derive(Debug, Default)]
struct Mesh {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    faces: Vec<[FaceVertex; 3]>,
}

impl Mesh {
    fn is_valid_face(&self, face: &[FaceVertex; 3]) -> bool {
        face.iter().all(|fv| {
            fv.vertex < self.vertices.len() && (self.uvs.is_empty() || fv.uv < self.uvs.len())
        })
    }

    fn vertex(&self, fv: FaceVertex) -> EntityModelVertex {
        let uv = self.uvs.get(fv.uv).copied().unwrap_or(Vec2::ZERO);
        EntityModelVertex::new(self.vertices[fv.vertex], uv)
    }
}

#[derive(Debug, Default)]
struct GeomObject {
    name: String,
    material: Option<usize>,
    mesh: Mesh,
}

#[derive(Debug, Default)]
struct Scene {
    materials: Vec<MaterialEntry>,
    objects: Vec<GeomObject>,
}

// ============================================================================
// Parser
// ============================================================================

struct AseParser<'a> {
    tokens: Tokenizer<'a>,
}

impl<'a> AseParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(text),
        }
    }

    fn parse(mut self) -> Result<Scene> {
        let mut scene = Scene::default();

        self.expect_directive("3DSMAX_ASCIIEXPORT")?;
        self.expect(TokenKind::Integer)?;

        self.skip_optional_directive("COMMENT")?;
        self.skip_optional_directive("SCENE")?;

        self.parse_material_list(&mut scene.materials)?;

        loop {
            let token = self.tokens.peek()?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Directive if token.text == "GEOMOBJECT" => {
                    let object = self.parse_geom_object(scene.materials.len())?;
                    scene.objects.push(object);
                }
                TokenKind::Directive => {
                    log::debug!("Line {}: skipping ASE directive '{}'", token.line, token.text);
                    self.skip_directive()?;
                }
                kind => {
                    return Err(token.error(format!("Expected directive, but got {kind} '{}'", token.text)));
                }
            }
        }

        Ok(scene)
    }

    fn parse_material_list(&mut self, materials: &mut Vec<MaterialEntry>) -> Result<()> {
        self.expect_directive("MATERIAL_LIST")?;
        self.parse_block(|parser, directive| match directive {
            "MATERIAL_COUNT" => {
                parser.expect_directive(directive)?;
                let token = parser.tokens.peek()?;
                let count = parser.parse_size()?;
                // Every material takes at least one byte of the file.
                if count > parser.tokens.text.len() {
                    return Err(token.error(format!("Material count {count} exceeds the file size")));
                }
                materials.resize(count, MaterialEntry::default());
                Ok(true)
            }
            "MATERIAL" => {
                parser.parse_material(materials)?;
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    fn parse_material(&mut self, materials: &mut [MaterialEntry]) -> Result<()> {
        self.expect_directive("MATERIAL")?;
        let token = self.tokens.peek()?;
        let index = self.parse_size()?;
        if index >= materials.len() {
            log::warn!(
                "Line {}: material index {index} is out of bounds, ignoring material",
                token.line
            );
            return self.parse_block(|_, _| Ok(false));
        }

        let entry = &mut materials[index];
        self.parse_block(|parser, directive| match directive {
            "MATERIAL_NAME" => {
                parser.expect_directive(directive)?;
                entry.name = Some(parser.parse_string()?);
                Ok(true)
            }
            "MAP_DIFFUSE" => {
                parser.expect_directive(directive)?;
                parser.parse_block(|parser, directive| {
                    if directive != "BITMAP" {
                        return Ok(false);
                    }
                    parser.expect_directive(directive)?;
                    entry.bitmap = Some(parser.parse_string()?);
                    Ok(true)
                })?;
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    fn parse_geom_object(&mut self, material_count: usize) -> Result<GeomObject> {
        self.expect_directive("GEOMOBJECT")?;
        let mut object = GeomObject::default();
        self.parse_block(|parser, directive| match directive {
            "NODE_NAME" => {
                parser.expect_directive(directive)?;
                object.name = parser.parse_string()?;
                Ok(true)
            }
            "MATERIAL_REF" => {
                parser.expect_directive(directive)?;
                let token = parser.tokens.peek()?;
                let index = parser.parse_size()?;
                if index >= material_count {
                    log::warn!(
                        "Line {}: material index {index} is out of bounds, using the default material",
                        token.line
                    );
                }
                object.material = Some(index);
                Ok(true)
            }
            "MESH" => {
                parser.parse_mesh(&mut object.mesh)?;
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(object)
    }

    fn parse_mesh(&mut self, mesh: &mut Mesh) -> Result<()> {
        self.expect_directive("MESH")?;
        self.parse_block(|parser, directive| {
            match directive {
                "MESH_NUMVERTEX" => {
                    parser.expect_directive(directive)?;
                    let count = parser.parse_size()?;
                    mesh.vertices.reserve(count.min(MAX_RESERVE));
                }
                "MESH_NUMFACES" => {
                    parser.expect_directive(directive)?;
                    let count = parser.parse_size()?;
                    mesh.faces.reserve(count.min(MAX_RESERVE));
                }
                "MESH_NUMTVERTEX" => {
                    parser.expect_directive(directive)?;
                    let count = parser.parse_size()?;
                    mesh.uvs.reserve(count.min(MAX_RESERVE));
                }
                "MESH_VERTEX_LIST" => {
                    parser.expect_directive(directive)?;
                    parser.parse_block(|parser, directive| {
                        if directive != "MESH_VERTEX" {
                            return Ok(false);
                        }
                        parser.expect_directive(directive)?;
                        parser.expect_size(mesh.vertices.len())?;
                        mesh.vertices.push(parser.parse_vec3()?);
                        Ok(true)
                    })?;
                }
                "MESH_FACE_LIST" => {
                    parser.expect_directive(directive)?;
                    parser.parse_block(|parser, directive| {
                        if directive != "MESH_FACE" {
                            return Ok(false);
                        }
                        let face = parser.parse_face(mesh.faces.len())?;
                        mesh.faces.push(face);
                        Ok(true)
                    })?;
                }
                "MESH_TVERTLIST" => {
                    parser.expect_directive(directive)?;
                    parser.parse_block(|parser, directive| {
                        if directive != "MESH_TVERT" {
                            return Ok(false);
                        }
                        parser.expect_directive(directive)?;
                        parser.expect_size(mesh.uvs.len())?;
                        let uvw = parser.parse_vec3()?;
                        mesh.uvs.push(Vec2::new(uvw.x, 1.0 - uvw.y));
                        Ok(true)
                    })?;
                }
                "MESH_TFACELIST" => {
                    parser.expect_directive(directive)?;
                    parser.parse_block(|parser, directive| {
                        if directive != "MESH_TFACE" {
                            return Ok(false);
                        }
                        parser.expect_directive(directive)?;
                        let token = parser.tokens.peek()?;
                        let index = parser.parse_size()?;
                        let Some(face) = mesh.faces.get_mut(index) else {
                            return Err(token.error(format!("Invalid face index {index}")));
                        };
                        for face_vertex in face.iter_mut() {
                            face_vertex.uv = parser.parse_size()?;
                        }
                        Ok(true)
                    })?;
                }
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn parse_face(&mut self, expected_index: usize) -> Result<[FaceVertex; 3]> {
        self.expect_directive("MESH_FACE")?;
        self.expect_size(expected_index)?;
        if self.tokens.peek()?.kind == TokenKind::Colon {
            self.tokens.next()?;
        }

        let mut face = [FaceVertex::default(); 3];
        for (face_vertex, name) in face.iter_mut().zip(["A", "B", "C"]) {
            self.expect_argument_name(name)?;
            face_vertex.vertex = self.parse_size()?;
        }
        for edge in ["AB", "BC", "CA"] {
            self.expect_argument_name(edge)?;
            self.parse_size()?;
        }

        // Smoothing groups may be absent or a comma separated list.
        self.expect_directive("MESH_SMOOTHING")?;
        self.skip_arguments()?;

        self.expect_directive("MESH_MTLID")?;
        self.parse_size()?;

        Ok(face)
    }

    // ------------------------------------------------------------------------
    // Blocks and directives
    // ------------------------------------------------------------------------

    /// Parses `{ ... }`, offering each directive to `handle`. Directives it
    /// declines are skipped along with their arguments and blocks.
    fn parse_block(
        &mut self,
        mut handle: impl FnMut(&mut Self, &'a str) -> Result<bool>,
    ) -> Result<()> {
        self.expect(TokenKind::OpenBrace)?;
        loop {
            let token = self.tokens.peek()?;
            if token.kind != TokenKind::Directive {
                break;
            }
            if !handle(self, token.text)? {
                self.skip_directive()?;
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(())
    }

    /// Skips the next directive if it is `name`.
    fn skip_optional_directive(&mut self, name: &str) -> Result<()> {
        let token = self.tokens.peek()?;
        if token.kind == TokenKind::Directive && token.text == name {
            self.skip_directive()?;
        }
        Ok(())
    }

    fn skip_directive(&mut self) -> Result<()> {
        self.expect(TokenKind::Directive)?;
        self.skip_arguments()?;

        if self.tokens.peek()?.kind == TokenKind::OpenBrace {
            self.tokens.next()?;
            loop {
                let token = self.tokens.peek()?;
                match token.kind {
                    TokenKind::CloseBrace => break,
                    TokenKind::Directive => self.skip_directive()?,
                    kind => {
                        return Err(token.error(format!("Expected directive, but got {kind} '{}'", token.text)));
                    }
                }
            }
            self.expect(TokenKind::CloseBrace)?;
        }
        Ok(())
    }

    fn skip_arguments(&mut self) -> Result<()> {
        while !matches!(
            self.tokens.peek()?.kind,
            TokenKind::OpenBrace | TokenKind::CloseBrace | TokenKind::Directive | TokenKind::Eof
        ) {
            self.tokens.next()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Arguments
    // ------------------------------------------------------------------------

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        let token = self.tokens.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(token.error(format!("Expected {kind}, but got {} '{}'", token.kind, token.text)))
        }
    }

    fn expect_directive(&mut self, name: &str) -> Result<()> {
        let token = self.expect(TokenKind::Directive)?;
        if token.text == name {
            Ok(())
        } else {
            Err(token.error(format!("Expected directive '{name}', but got '{}'", token.text)))
        }
    }

    fn expect_argument_name(&mut self, name: &str) -> Result<()> {
        let token = self.expect(TokenKind::ArgumentName)?;
        if token.text == name {
            Ok(())
        } else {
            Err(token.error(format!("Expected argument name '{name}', but got '{}'", token.text)))
        }
    }

    fn expect_size(&mut self, expected: usize) -> Result<()> {
        let token = self.tokens.peek()?;
        let actual = self.parse_size()?;
        if actual == expected {
            Ok(())
        } else {
            Err(token.error(format!("Expected value '{expected}', but got '{actual}'")))
        }
    }

    fn parse_size(&mut self) -> Result<usize> {
        let token = self.expect(TokenKind::Integer)?;
        token
            .text
            .parse::<i64>()
            .ok()
            .and_then(|value| usize::try_from(value).ok())
            .ok_or_else(|| {
                token.error(format!("Expected positive integer, but got '{}'", token.text))
            })
    }

    fn parse_string(&mut self) -> Result<String> {
        Ok(self.expect(TokenKind::String)?.text.to_string())
    }

    fn parse_float(&mut self) -> Result<f32> {
        let token = self.tokens.next()?;
        match token.kind {
            TokenKind::Decimal | TokenKind::Integer => token
                .text
                .parse()
                .map_err(|_| token.error(format!("Invalid number '{}'", token.text))),
            kind => Err(token.error(format!("Expected decimal, but got {kind} '{}'", token.text))),
        }
    }

    fn parse_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.parse_float()?, self.parse_float()?, self.parse_float()?))
    }
}

// ============================================================================
// Model
// ============================================================================

/// Strips the leading `..` components of a relative material path.
fn fix_material_path(raw: &str) -> PathBuf {
    let path = parse_model_path(raw);
    let mut components = path.components().peekable();
    while components.peek() == Some(&Component::ParentDir) {
        components.next();
    }
    components.collect()
}

fn load_material(index: usize, entry: &MaterialEntry, ctx: &LoadContext<'_>) -> Material {
    let raw = match (&entry.bitmap, &entry.name) {
        (Some(bitmap), _) => bitmap,
        (None, Some(name)) => {
            log::warn!("Material {index} has no diffuse bitmap, using its name '{name}'");
            name
        }
        (None, None) => {
            log::warn!("Material {index} has neither a bitmap nor a name");
            return Material::default_placeholder(format!("material_{index}"));
        }
    };

    let path = fix_material_path(raw);
    let name = path.to_string_lossy();
    match find_skin_with_extensions(&name, ctx.fs, &ctx.settings.skin_extensions) {
        Ok(resolved) => load_skin_with(&resolved, ctx.fs, ctx),
        Err(error) => {
            log::warn!("Could not resolve ASE material '{name}': {error}");
            Material::default_placeholder(name)
        }
    }
}

fn build_model(name: &str, scene: &Scene, ctx: &LoadContext<'_>) -> EntityModelData {
    let mut skins = scene
        .materials
        .iter()
        .enumerate()
        .map(|(index, entry)| load_material(index, entry, ctx))
        .collect::<Vec<_>>();
    let default_material = skins.len();
    skins.push(Material::default_placeholder(DEFAULT_MATERIAL_NAME));

    let mut bounds = AabbBuilder::default();
    let mut vertex_count = 0;
    for object in &scene.objects {
        bounds.add_all(object.mesh.vertices.iter().copied());
        vertex_count += object.mesh.faces.len() * 3;
    }

    let mut builder = MaterialIndexRangeMapBuilder::new(vertex_count, &Size::default());
    for object in &scene.objects {
        let material = object
            .material
            .filter(|&index| index < default_material)
            .unwrap_or(default_material);
        let mesh = &object.mesh;
        for (face_index, face) in mesh.faces.iter().enumerate() {
            if !mesh.is_valid_face(face) {
                log::warn!(
                    "Skipping face {face_index} of object '{}' with out of range indices",
                    object.name
                );
                continue;
            }
            let [v0, v1, v2] = face.map(|fv| mesh.vertex(fv));
            builder.add_triangle(Some(material), v2, v1, v0);
        }
    }
    let (vertices, ranges) = builder.finish();

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);
    let frame_index = model.add_frame(name, bounds.bounds());
    let surface = model.add_surface(name, 1);
    surface.set_skins(skins);
    surface.add_material_mesh(frame_index, vertices, ranges);
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFileSystem;
    use crate::settings::LoaderSettings;

    const TRIANGLE: &str = r#"*3DSMAX_ASCIIEXPORT	200
*COMMENT "exported"
*SCENE {
	*SCENE_FILENAME "tri.max"
	*SCENE_BACKGROUND_STATIC 0.0000	0.0000	0.0000
}
*MATERIAL_LIST {
	*MATERIAL_COUNT 1
	*MATERIAL 0 {
		*MATERIAL_NAME "wall"
		*MAP_DIFFUSE {
			*MAP_NAME "Map #1"
			*BITMAP "..\..\textures\wall.tga"
		}
	}
}
*GEOMOBJECT {
	*NODE_NAME "tri"
	*NODE_TM {
		*TM_ROW0 1.0000	0.0000	0.0000
	}
	*MESH {
		*TIMEVALUE 0
		*MESH_NUMVERTEX 3
		*MESH_NUMFACES 1
		*MESH_VERTEX_LIST {
			*MESH_VERTEX    0	0.0000	0.0000	0.0000
			*MESH_VERTEX    1	8.0000	0.0000	0.0000
			*MESH_VERTEX    2	0.0000	4.0000	2.0000
		}
		*MESH_FACE_LIST {
			*MESH_FACE    0:    A:    0 B:    1 C:    2 AB:    1 BC:    1 CA:    1	 *MESH_SMOOTHING 1,2 	*MESH_MTLID 0
		}
		*MESH_NUMTVERTEX 3
		*MESH_TVERTLIST {
			*MESH_TVERT 0	0.0000	0.0000	0.0000
			*MESH_TVERT 1	1.0000	0.0000	0.0000
			*MESH_TVERT 2	0.0000	0.2500	0.0000
		}
		*MESH_NUMTVFACES 1
		*MESH_TFACELIST {
			*MESH_TFACE 0	0	1	2
		}
	}
	*MATERIAL_REF 0
}
"#;

    fn load_text(text: &str) -> Result<EntityModelData> {
        let fs = MemoryFileSystem::new();
        let settings = LoaderSettings::default();
        let ctx = LoadContext::new(&fs, None, &settings);
        load("tri.ase", &Reader::from_bytes(text.as_bytes().to_vec()), &ctx)
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut tokenizer = Tokenizer::new(text);
        let mut kinds = Vec::new();
        loop {
            let token = tokenizer.next().unwrap();
            kinds.push(token.kind);
            if token.kind == TokenKind::Eof {
                return kinds;
            }
        }
    }

    #[test]
    fn test_tokenizer_kinds() {
        use TokenKind::*;
        assert_eq!(
            kinds("*MESH_FACE 0: A: -1 \"a b\" 1.5 word { }"),
            vec![Directive, Integer, Colon, ArgumentName, Integer, String, Decimal, Keyword, OpenBrace, CloseBrace, Eof]
        );
    }

    #[test]
    fn test_tokenizer_tracks_position() {
        let mut tokenizer = Tokenizer::new("*A\n  *B");
        tokenizer.next().unwrap();
        let token = tokenizer.next().unwrap();
        assert_eq!((token.text, token.line, token.column), ("B", 2, 3));
    }

    #[test]
    fn test_material_path_loses_parent_components() {
        assert_eq!(fix_material_path("..\\..\\textures\\wall.tga"), PathBuf::from("textures/wall.tga"));
        assert_eq!(fix_material_path("textures/../x.tga"), PathBuf::from("textures/../x.tga"));
    }

    #[test]
    fn test_triangle_model() {
        let model = load_text(TRIANGLE).unwrap();

        assert_eq!(model.frame_count(), 1);
        let frame = &model.frames()[0];
        assert_eq!(frame.name, "tri.ase");
        assert_eq!(frame.bounds.max, Vec3::new(8.0, 4.0, 2.0));

        let surface = model.surface("tri.ase").unwrap();
        assert_eq!(surface.skin_count(), 2);
        assert_eq!(surface.skins()[0].name(), "textures/wall.tga");
        assert_eq!(surface.skins()[1].name(), DEFAULT_MATERIAL_NAME);

        let mesh = surface.mesh(0).unwrap();
        // Reversed winding: C, B, A.
        assert_eq!(mesh.vertices[0].position, Vec3::new(0.0, 4.0, 2.0));
        assert_eq!(mesh.vertices[0].uv, Vec2::new(0.0, 0.75));
        assert_eq!(mesh.vertices[2].position, Vec3::ZERO);
        assert_eq!(mesh.vertices[2].uv, Vec2::new(0.0, 1.0));
        assert!(mesh.material_ranges().unwrap().ranges_for(Some(0)).is_some());
    }

    #[test]
    fn test_out_of_range_material_ref_uses_default() {
        let text = TRIANGLE.replace("*MATERIAL_REF 0", "*MATERIAL_REF 7");
        let model = load_text(&text).unwrap();
        let mesh = model.surfaces()[0].mesh(0).unwrap();
        assert!(mesh.material_ranges().unwrap().ranges_for(Some(1)).is_some());
    }

    #[test]
    fn test_invalid_face_is_skipped() {
        let text = TRIANGLE.replace("C:    2 AB", "C:    9 AB");
        let model = load_text(&text).unwrap();
        assert!(model.surfaces()[0].mesh(0).unwrap().vertices.is_empty());
    }

    #[test]
    fn test_tface_index_out_of_range_is_parse_error() {
        let text = TRIANGLE.replace("*MESH_TFACE 0", "*MESH_TFACE 3");
        match load_text(&text) {
            Err(ForgeError::Parse { line, message, .. }) => {
                assert_eq!(line, 42);
                assert!(message.contains("Invalid face index 3"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let text = TRIANGLE.replace("*MATERIAL_COUNT 1", "*MATERIAL_COUNT -1");
        assert!(matches!(load_text(&text), Err(ForgeError::Parse { line: 8, .. })));
    }

    #[test]
    fn test_scene_block_is_optional() {
        let start = TRIANGLE.find("*COMMENT").unwrap();
        let end = TRIANGLE.find("*MATERIAL_LIST").unwrap();
        let text = format!("{}{}", &TRIANGLE[..start], &TRIANGLE[end..]);

        let model = load_text(&text).unwrap();
        assert_eq!(model.surfaces()[0].skins()[0].name(), "textures/wall.tga");
        assert_eq!(model.frames()[0].bounds.max, Vec3::new(8.0, 4.0, 2.0));
    }

    #[test]
    fn test_huge_material_count_is_rejected() {
        let text = TRIANGLE.replace("*MATERIAL_COUNT 1", "*MATERIAL_COUNT 4000000000");
        assert!(matches!(load_text(&text), Err(ForgeError::Parse { line: 8, .. })));
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert!(matches!(load_text("*SCENE { }"), Err(ForgeError::Parse { line: 1, column: 1, .. })));
    }
}
