use std::fmt;
use std::sync::Arc;

use crate::assets::texture::Texture;
use crate::resources::Resource;

const PLACEHOLDER_SIZE: u32 = 8;
const PLACEHOLDER_DARK: [u8; 4] = [0, 0, 0, 255];
const PLACEHOLDER_LIGHT: [u8; 4] = [255, 0, 255, 255];

/// A named skin backed by a texture resource.
///
/// Cloning shares the texture resource.
#[derive(Clone)]
pub struct Material {
    name: String,
    texture: Arc<Resource<Texture>>,
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("texture", &self.texture.id())
            .finish()
    }
}

impl Material {
    /// Material whose texture resource starts out `Loaded`.
    pub fn new(name: impl Into<String>, texture: Texture) -> Self {
        Self {
            name: name.into(),
            texture: Arc::new(Resource::new(texture)),
        }
    }

    /// Checkerboard stand-in for skins that could not be found or decoded.
    pub fn default_placeholder(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut rgba = Vec::with_capacity((PLACEHOLDER_SIZE * PLACEHOLDER_SIZE * 4) as usize);
        for y in 0..PLACEHOLDER_SIZE {
            for x in 0..PLACEHOLDER_SIZE {
                let color = if (x / 4 + y / 4) % 2 == 0 {
                    PLACEHOLDER_DARK
                } else {
                    PLACEHOLDER_LIGHT
                };
                rgba.extend_from_slice(&color);
            }
        }
        let texture = Texture::from_rgba(name.clone(), PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, rgba);
        Self {
            texture: Arc::new(match texture {
                Ok(texture) => Resource::new(texture),
                Err(error) => Resource::with_state(crate::resources::ResourceState::Failed {
                    error: error.to_string(),
                }),
            }),
            name,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> &Arc<Resource<Texture>> {
        &self.texture
    }

    /// Dimensions of the texture while it is loaded.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.texture
            .get()
            .map(|texture| (texture.width(), texture.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_loaded() {
        let material = Material::default_placeholder("missing.tga");
        assert_eq!(material.name(), "missing.tga");
        assert_eq!(material.size(), Some((PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)));
    }

    #[test]
    fn test_clone_shares_texture() {
        let material = Material::default_placeholder("a");
        let copy = material.clone();
        assert!(Arc::ptr_eq(material.texture(), copy.texture()));
    }
}
