//! Skin & Palette Tests
//!
//! Tests for:
//! - Palette loading from `.lmp` and `.pcx` files
//! - Skin path repair: exact match, `.bmp` → `.wal`, unique stem, extension list
//! - WAL decoding: Quake 2 (external palette) and Daikatana (embedded palette)
//! - Placeholders for missing or undecodable skins

mod common;

use std::path::{Path, PathBuf};

use forge::assets::{find_skin, find_skin_with_extensions, load_skin, resolve_and_load_skin};
use forge::{FileSystem, ForgeError, MemoryFileSystem, Palette};

fn first_pixel(material: &forge::Material) -> [u8; 4] {
    let texture = material.texture().get().expect("texture is loaded");
    texture.rgba()[..4].try_into().unwrap()
}

/// Quake 2 WAL: name, size, four mip offsets, then the first mip level.
fn q2_wal(width: u32, height: u32, index: u8) -> Vec<u8> {
    let mut writer = common::ByteWriter::new();
    writer.string("e1u1/wall", 32).u32(width).u32(height);
    let header_size = 32 + 8 + 16 + 32 + 12;
    writer.size(header_size).i32(0).i32(0).i32(0);
    writer.string("", 32).i32(0).i32(0).i32(0);
    assert_eq!(writer.position(), header_size);
    writer.bytes(&vec![index; (width * height) as usize]);
    writer.finish()
}

// ============================================================================
// Palettes
// ============================================================================

#[test]
fn lmp_palette_loads_colors() {
    let fs = MemoryFileSystem::new().with_file("gfx/palette.lmp", common::gradient_palette());
    let palette = Palette::load(&fs, Path::new("gfx/palette.lmp")).unwrap();
    assert_eq!(palette.color(0), [0, 255, 0]);
    assert_eq!(palette.color(200), [200, 55, 0]);
}

#[test]
fn pcx_palette_is_read_from_file_end() {
    let mut pcx = vec![0u8; 128];
    pcx.push(0x0C);
    pcx.extend(common::gradient_palette());
    let fs = MemoryFileSystem::new().with_file("pics/colormap.pcx", pcx);

    let palette = Palette::load(&fs, Path::new("pics/colormap.pcx")).unwrap();
    assert_eq!(palette.color(255), [255, 0, 0]);
}

#[test]
fn short_or_unknown_palettes_are_rejected() {
    let fs = MemoryFileSystem::new()
        .with_file("short.lmp", vec![0u8; 10])
        .with_file("palette.act", common::gradient_palette());

    assert!(matches!(
        Palette::load(&fs, Path::new("short.lmp")),
        Err(ForgeError::Palette(_))
    ));
    assert!(matches!(
        Palette::load(&fs, Path::new("palette.act")),
        Err(ForgeError::Palette(_))
    ));
    assert!(matches!(
        Palette::load(&fs, Path::new("missing.lmp")),
        Err(ForgeError::FileNotFound(_))
    ));
}

// ============================================================================
// Path Repair
// ============================================================================

#[test]
fn bmp_reference_resolves_to_wal() {
    let fs = MemoryFileSystem::new().with_file("textures/dk/wall.wal", vec![3u8]);
    assert_eq!(
        find_skin("textures/dk/wall.bmp", &fs).unwrap(),
        PathBuf::from("textures/dk/wall.wal")
    );
}

#[test]
fn unresolvable_reference_is_returned_unchanged() {
    let fs = MemoryFileSystem::new().with_file("textures/other.tga", vec![0u8]);
    assert_eq!(
        find_skin("textures/wall.bmp", &fs).unwrap(),
        PathBuf::from("textures/wall.bmp")
    );
    assert_eq!(
        find_skin("nowhere/wall.bmp", &fs).unwrap(),
        PathBuf::from("nowhere/wall.bmp")
    );
}

#[test]
fn extension_list_order_decides() {
    let fs = MemoryFileSystem::new()
        .with_file("models/head.jpg", vec![0u8])
        .with_file("models/head.wal", vec![0u8]);
    let extensions = vec!["tga".to_string(), "wal".to_string(), "jpg".to_string()];
    assert_eq!(
        find_skin_with_extensions("models/head", &fs, &extensions).unwrap(),
        PathBuf::from("models/head.wal")
    );
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn q2_wal_uses_external_palette() {
    let palette = Palette::from_rgb(&common::gradient_palette()).unwrap();
    let fs = MemoryFileSystem::new().with_file("textures/wall.wal", q2_wal(4, 4, 255));

    let material = load_skin(Path::new("textures/wall.wal"), &fs, Some(&palette));
    assert_eq!(material.name(), "textures/wall.wal");
    assert_eq!(material.size(), Some((4, 4)));
    // Quake 2 WAL textures are opaque, even at index 255.
    assert_eq!(first_pixel(&material), [255, 0, 0, 255]);
}

#[test]
fn dk_wal_uses_embedded_palette_and_transparency() {
    let fs = MemoryFileSystem::new().with_file("skins/fence.wal", common::dk_wal(2, 1, 255));

    let material = load_skin(Path::new("skins/fence.wal"), &fs, None);
    assert_eq!(material.size(), Some((2, 1)));
    assert_eq!(first_pixel(&material), [255, 255, 255, 0]);
}

#[test]
fn png_skin_is_decoded() {
    let fs = MemoryFileSystem::new().with_file("skins/a.png", common::png(3, 5, [1, 2, 3, 4]));
    let material = resolve_and_load_skin("skins/a", &fs, None);
    assert_eq!(material.name(), "skins/a.png");
    assert_eq!(material.size(), Some((3, 5)));
    let alpha = material.texture().get().unwrap().average_color().w;
    assert!((alpha - 4.0 / 255.0).abs() < 1e-6);
}

#[test]
fn corrupt_image_becomes_placeholder() {
    let fs = MemoryFileSystem::new().with_file("skins/broken.png", vec![0x89, b'P', b'N']);
    assert!(fs.path_exists(Path::new("skins/broken.png")));

    let material = load_skin(Path::new("skins/broken.png"), &fs, None);
    assert_eq!(material.name(), "skins/broken.png");
    assert_eq!(material.size(), Some((8, 8)));
}
