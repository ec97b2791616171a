//! Resource State Machine
//!
//! A [`Resource<T>`] wraps one expensive asset together with its lifecycle
//! state:
//!
//! ```text
//! Unloaded ──process──▶ Loading ──process──▶ Loaded ──process──▶ Ready
//!    │                     │  └──────────────▶ Failed               │
//!    │                     │                                   request_drop
//!    │                     │                                        ▼
//!    └──request_drop──▶ Dropped ◀──process── Dropping ◀─────────────┘
//! ```
//!
//! Each [`Resource::process`] call advances the machine by at most one step.
//! `Failed` and `Dropped` are terminal.
//!
//! Resources are shared as `Arc<Resource<T>>`. The strong count of that
//! `Arc` is the resource's use count; the
//! [`ResourceManager`](crate::resources::ResourceManager) drops resources
//! that nobody but itself references.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

use crate::errors::Result;
use crate::resources::context::ProcessContext;
use crate::resources::task::{Task, TaskRunner};

// Global resource ID generator
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hooks a payload runs when it enters or leaves the rendering context.
///
/// Both default to doing nothing, which suits payloads without GPU state.
pub trait ResourcePayload: Send + Sync + 'static {
    fn upload(&mut self, _ctx: &ProcessContext<'_>) {}

    fn release(&mut self, _ctx: &ProcessContext<'_>) {}
}

/// Deferred producer of a resource payload.
pub type ResourceLoader<T> = Box<dyn FnOnce() -> Result<T> + Send + Sync + 'static>;

pub enum ResourceState<T> {
    Unloaded { loader: ResourceLoader<T> },
    Loading { task: Task<Result<T>> },
    Loaded { resource: T },
    Ready { resource: T },
    Dropping { resource: T },
    Dropped,
    Failed { error: String },
}

/// Payload-free tag of a [`ResourceState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStateKind {
    Unloaded,
    Loading,
    Loaded,
    Ready,
    Dropping,
    Dropped,
    Failed,
}

impl<T> ResourceState<T> {
    #[must_use]
    pub fn kind(&self) -> ResourceStateKind {
        match self {
            Self::Unloaded { .. } => ResourceStateKind::Unloaded,
            Self::Loading { .. } => ResourceStateKind::Loading,
            Self::Loaded { .. } => ResourceStateKind::Loaded,
            Self::Ready { .. } => ResourceStateKind::Ready,
            Self::Dropping { .. } => ResourceStateKind::Dropping,
            Self::Dropped => ResourceStateKind::Dropped,
            Self::Failed { .. } => ResourceStateKind::Failed,
        }
    }
}

impl<T> fmt::Debug for ResourceState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error } => f.debug_struct("Failed").field("error", error).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

pub struct Resource<T> {
    id: ResourceId,
    state: RwLock<ResourceState<T>>,
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl<T: ResourcePayload> Resource<T> {
    /// Resource that is already `Loaded`.
    pub fn new(resource: T) -> Self {
        Self::with_state(ResourceState::Loaded { resource })
    }

    /// `Unloaded` resource that runs `loader` on the first `process` call.
    pub fn from_loader(loader: impl FnOnce() -> Result<T> + Send + Sync + 'static) -> Self {
        Self::with_state(ResourceState::Unloaded {
            loader: Box::new(loader),
        })
    }

    pub fn with_state(state: ResourceState<T>) -> Self {
        Self {
            id: ResourceId::next(),
            state: RwLock::new(state),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[must_use]
    pub fn state_kind(&self) -> ResourceStateKind {
        self.state.read().kind()
    }

    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.state_kind() == ResourceStateKind::Dropped
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state_kind() == ResourceStateKind::Failed
    }

    /// Error message of a `Failed` resource.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match &*self.state.read() {
            ResourceState::Failed { error } => Some(error.clone()),
            _ => None,
        }
    }

    /// The payload while `Loaded` or `Ready`.
    ///
    /// The returned guard holds a read lock; keep it short-lived so the
    /// driving thread can continue processing.
    #[must_use]
    pub fn get(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.state.read(), |state| match state {
            ResourceState::Loaded { resource } | ResourceState::Ready { resource } => {
                Some(resource)
            }
            _ => None,
        })
        .ok()
    }

    /// False for the stable states `Ready` and `Failed`.
    #[must_use]
    pub fn needs_processing(&self) -> bool {
        !matches!(
            self.state_kind(),
            ResourceStateKind::Ready | ResourceStateKind::Failed
        )
    }

    /// Advances the state machine by one step. Returns true if the state changed.
    pub fn process(&self, task_runner: &dyn TaskRunner, ctx: &ProcessContext<'_>) -> bool {
        let mut state = self.state.write();
        let mut failure = None;

        let (next, changed) = match std::mem::replace(&mut *state, ResourceState::Dropped) {
            ResourceState::Unloaded { loader } => {
                let task = Task::run(task_runner, loader);
                (ResourceState::Loading { task }, true)
            }
            ResourceState::Loading { mut task } => match task.try_result() {
                None => (ResourceState::Loading { task }, false),
                Some(Ok(Ok(resource))) => (ResourceState::Loaded { resource }, true),
                Some(Ok(Err(error)) | Err(error)) => {
                    let error = error.to_string();
                    failure = Some(error.clone());
                    (ResourceState::Failed { error }, true)
                }
            },
            ResourceState::Loaded { mut resource } => {
                resource.upload(ctx);
                (ResourceState::Ready { resource }, true)
            }
            ResourceState::Dropping { mut resource } => {
                resource.release(ctx);
                (ResourceState::Dropped, true)
            }
            other => (other, false),
        };
        *state = next;
        drop(state);

        if let Some(error) = failure {
            ctx.report_error(self.id, &error);
        }
        changed
    }

    /// Requests release of the resource.
    ///
    /// `Ready` resources move to `Dropping` so the release step runs on the
    /// next `process` call. Everything else that is not terminal is dropped
    /// at once; an in-flight load keeps running but its result is discarded.
    pub fn request_drop(&self) {
        let mut state = self.state.write();
        let next = match std::mem::replace(&mut *state, ResourceState::Dropped) {
            ResourceState::Ready { resource } => ResourceState::Dropping { resource },
            dropping @ ResourceState::Dropping { .. } => dropping,
            failed @ ResourceState::Failed { .. } => failed,
            ResourceState::Unloaded { .. }
            | ResourceState::Loading { .. }
            | ResourceState::Loaded { .. }
            | ResourceState::Dropped => ResourceState::Dropped,
        };
        *state = next;
    }

    /// Runs the loader on the calling thread. No-op unless `Unloaded`.
    pub fn load_sync(&self) {
        let mut state = self.state.write();
        if !matches!(&*state, ResourceState::Unloaded { .. }) {
            return;
        }
        if let ResourceState::Unloaded { loader } =
            std::mem::replace(&mut *state, ResourceState::Dropped)
        {
            *state = match loader() {
                Ok(resource) => ResourceState::Loaded { resource },
                Err(error) => ResourceState::Failed {
                    error: error.to_string(),
                },
            };
        }
    }

    /// Uploads on the calling thread. No-op unless `Loaded`.
    pub fn upload_sync(&self, ctx: &ProcessContext<'_>) {
        let mut state = self.state.write();
        if !matches!(&*state, ResourceState::Loaded { .. }) {
            return;
        }
        if let ResourceState::Loaded { mut resource } =
            std::mem::replace(&mut *state, ResourceState::Dropped)
        {
            resource.upload(ctx);
            *state = ResourceState::Ready { resource };
        }
    }

    /// Drops on the calling thread, running the release step for `Ready` and `Dropping`.
    pub fn drop_sync(&self, ctx: &ProcessContext<'_>) {
        let mut state = self.state.write();
        match std::mem::replace(&mut *state, ResourceState::Dropped) {
            ResourceState::Ready { mut resource } | ResourceState::Dropping { mut resource } => {
                resource.release(ctx);
            }
            failed @ ResourceState::Failed { .. } => *state = failed,
            _ => {}
        }
    }
}
