use std::fmt;

use crate::resources::resource::ResourceId;

/// Opaque handle of a texture living in a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// The privileged rendering context that upload and release steps run against.
///
/// Only the thread that owns the context may drive
/// [`Resource::process`](crate::resources::Resource::process).
pub trait GraphicsContext {
    fn create_texture(&self, label: &str, width: u32, height: u32, rgba: &[u8]) -> TextureId;

    fn delete_texture(&self, id: TextureId);
}

fn log_resource_error(id: ResourceId, message: &str) {
    log::error!("Resource {id} failed to load: {message}");
}

/// Everything a resource needs while it is being processed.
#[derive(Clone, Copy)]
pub struct ProcessContext<'a> {
    graphics: Option<&'a dyn GraphicsContext>,
    error_handler: &'a dyn Fn(ResourceId, &str),
}

impl fmt::Debug for ProcessContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("graphics", &self.graphics.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> ProcessContext<'a> {
    pub fn new(
        graphics: Option<&'a dyn GraphicsContext>,
        error_handler: &'a dyn Fn(ResourceId, &str),
    ) -> Self {
        Self {
            graphics,
            error_handler,
        }
    }

    /// Context with a graphics context whose load errors are logged.
    pub fn with_graphics(graphics: &'a dyn GraphicsContext) -> Self {
        Self {
            graphics: Some(graphics),
            error_handler: &log_resource_error,
        }
    }

    /// Context without a graphics context; uploads become CPU-only.
    #[must_use]
    pub fn headless() -> ProcessContext<'static> {
        ProcessContext {
            graphics: None,
            error_handler: &log_resource_error,
        }
    }

    #[inline]
    #[must_use]
    pub fn graphics(&self) -> Option<&'a dyn GraphicsContext> {
        self.graphics
    }

    pub(crate) fn report_error(&self, id: ResourceId, message: &str) {
        (self.error_handler)(id, message);
    }
}
