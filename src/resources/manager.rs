//! Resource Manager
//!
//! Owns a heterogeneous collection of resources and advances all of them
//! once per [`ResourceManager::process`] call, typically once per frame on
//! the thread that owns the graphics context.
//!
//! Garbage collection is driven by reference counts: a resource referenced
//! only by the manager is dropped, and removed once it reached a terminal
//! state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::resources::context::ProcessContext;
use crate::resources::resource::{Resource, ResourceId, ResourcePayload, ResourceStateKind};
use crate::resources::task::{ImmediateTaskRunner, TaskRunner};
use crate::settings::ProcessSettings;

/// Type-erased view of a [`Resource`], as stored by the manager.
pub trait ErasedResource: Send + Sync {
    fn id(&self) -> ResourceId;

    fn state_kind(&self) -> ResourceStateKind;

    fn needs_processing(&self) -> bool;

    fn process(&self, task_runner: &dyn TaskRunner, ctx: &ProcessContext<'_>) -> bool;

    fn request_drop(&self);
}

impl<T: ResourcePayload> ErasedResource for Resource<T> {
    fn id(&self) -> ResourceId {
        Resource::id(self)
    }

    fn state_kind(&self) -> ResourceStateKind {
        Resource::state_kind(self)
    }

    fn needs_processing(&self) -> bool {
        Resource::needs_processing(self)
    }

    fn process(&self, task_runner: &dyn TaskRunner, ctx: &ProcessContext<'_>) -> bool {
        Resource::process(self, task_runner, ctx)
    }

    fn request_drop(&self) {
        Resource::request_drop(self);
    }
}

type ProcessedListener = Box<dyn FnMut(&[ResourceId]) + Send>;

#[derive(Default)]
pub struct ResourceManager {
    resources: Vec<Arc<dyn ErasedResource>>,
    listeners: Vec<ProcessedListener>,
    settings: ProcessSettings,
}

impl ResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: ProcessSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ProcessSettings {
        &self.settings
    }

    /// Takes shared ownership of `resource`.
    pub fn add_resource<T: ResourcePayload>(&mut self, resource: Arc<Resource<T>>) {
        log::debug!("Adding resource {}", resource.id());
        self.resources.push(resource);
    }

    /// Resources in processing order.
    #[inline]
    #[must_use]
    pub fn resources(&self) -> &[Arc<dyn ErasedResource>] {
        &self.resources
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Registers a callback receiving the ids changed by each `process` call.
    ///
    /// Calls that changed nothing do not notify.
    pub fn on_resources_processed(&mut self, listener: impl FnMut(&[ResourceId]) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// True if any resource is orphaned or not yet in a stable state.
    #[must_use]
    pub fn needs_processing(&self) -> bool {
        self.resources
            .iter()
            .any(|resource| Arc::strong_count(resource) == 1 || resource.needs_processing())
    }

    /// Advances every resource by one step and returns the ids that changed state.
    ///
    /// `timeout` is checked between resources; a resource is never interrupted
    /// and the first resource is always visited.
    pub fn process(
        &mut self,
        task_runner: &dyn TaskRunner,
        ctx: &ProcessContext<'_>,
        timeout: Option<Duration>,
    ) -> Vec<ResourceId> {
        let start = Instant::now();
        let mut processed = Vec::new();

        let mut index = 0;
        while index < self.resources.len() {
            if index > 0 && timeout.is_some_and(|timeout| start.elapsed() >= timeout) {
                break;
            }

            let resource = &self.resources[index];
            if Arc::strong_count(resource) == 1 {
                resource.request_drop();
            }
            if resource.needs_processing() && resource.process(task_runner, ctx) {
                processed.push(resource.id());
            }

            let terminal = matches!(
                resource.state_kind(),
                ResourceStateKind::Dropped | ResourceStateKind::Failed
            );
            if terminal && Arc::strong_count(resource) == 1 {
                log::debug!("Removing resource {}", resource.id());
                self.resources.remove(index);
            } else {
                index += 1;
            }
        }

        if !processed.is_empty() {
            for listener in &mut self.listeners {
                listener(&processed);
            }
        }
        processed
    }

    /// [`process`](Self::process) using the configured frame timeout.
    pub fn process_frame(
        &mut self,
        task_runner: &dyn TaskRunner,
        ctx: &ProcessContext<'_>,
    ) -> Vec<ResourceId> {
        let timeout = self.settings.timeout();
        self.process(task_runner, ctx, timeout)
    }

    /// Processes on the calling thread until every resource is stable.
    ///
    /// Stops early when a pass neither changes a state nor removes a resource,
    /// or after the configured number of passes. Returns the changed ids,
    /// sorted and deduplicated.
    pub fn process_sync(&mut self, ctx: &ProcessContext<'_>) -> Vec<ResourceId> {
        let mut all = Vec::new();
        for _ in 0..self.settings.max_sync_passes {
            if !self.needs_processing() {
                break;
            }
            let count_before = self.resources.len();
            let processed = self.process(&ImmediateTaskRunner, ctx, None);
            if processed.is_empty() && self.resources.len() == count_before {
                break;
            }
            all.extend(processed);
        }
        all.sort_unstable();
        all.dedup();
        all
    }
}
