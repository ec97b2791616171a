pub mod context;
pub mod manager;
pub mod resource;
pub mod task;

pub use context::{GraphicsContext, ProcessContext, TextureId};
pub use manager::{ErasedResource, ResourceManager};
pub use resource::{
    Resource, ResourceId, ResourceLoader, ResourcePayload, ResourceState, ResourceStateKind,
};
pub use task::{
    ImmediateTaskRunner, Job, QueuedTaskRunner, Task, TaskRunner, ThreadPoolTaskRunner,
    TokioTaskRunner,
};
