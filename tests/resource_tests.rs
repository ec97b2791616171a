//! Resource Lifecycle Tests
//!
//! Tests for:
//! - Resource state machine: Unloaded → Loading → Loaded → Ready, one step per process
//! - Failure reporting through the process context's error handler
//! - request_drop from every state, release of uploaded textures
//! - Synchronous helpers: load_sync, upload_sync, drop_sync
//! - Task handles on the immediate, queued, thread pool and Tokio runners

use std::sync::Arc;

use parking_lot::Mutex;

use forge::resources::{
    ImmediateTaskRunner, QueuedTaskRunner, ResourceId, ResourceStateKind, Task, TextureId,
    ThreadPoolTaskRunner, TokioTaskRunner,
};
use forge::{ForgeError, GraphicsContext, ProcessContext, Resource, ResourceState, Texture};

/// Graphics context that hands out sequential ids and records deletions.
#[derive(Default)]
struct RecordingGraphics {
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<TextureId>>,
}

impl GraphicsContext for RecordingGraphics {
    fn create_texture(&self, label: &str, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        assert_eq!(rgba.len(), (width * height * 4) as usize);
        let mut created = self.created.lock();
        created.push(label.to_string());
        TextureId(created.len() as u64)
    }

    fn delete_texture(&self, id: TextureId) {
        self.deleted.lock().push(id);
    }
}

fn texture(name: &str) -> Texture {
    Texture::from_rgba(name, 1, 1, vec![255, 0, 0, 255]).unwrap()
}

// ============================================================================
// State Machine
// ============================================================================

#[test]
fn loader_resource_steps_through_every_state() {
    let runner = QueuedTaskRunner::new();
    let ctx = ProcessContext::headless();
    let resource = Resource::from_loader(|| Ok(texture("wall")));
    assert_eq!(resource.state_kind(), ResourceStateKind::Unloaded);
    assert!(resource.get().is_none());

    assert!(resource.process(&runner, &ctx));
    assert_eq!(resource.state_kind(), ResourceStateKind::Loading);
    assert_eq!(runner.pending(), 1);

    // The job has not run yet.
    assert!(!resource.process(&runner, &ctx));
    assert_eq!(resource.state_kind(), ResourceStateKind::Loading);

    assert_eq!(runner.run_all(), 1);
    assert!(resource.process(&runner, &ctx));
    assert_eq!(resource.state_kind(), ResourceStateKind::Loaded);
    assert_eq!(resource.get().unwrap().name(), "wall");

    assert!(resource.process(&runner, &ctx));
    assert_eq!(resource.state_kind(), ResourceStateKind::Ready);
    assert!(!resource.needs_processing());

    assert!(!resource.process(&runner, &ctx));
}

#[test]
fn upload_and_release_reach_the_graphics_context() {
    let graphics = RecordingGraphics::default();
    let ctx = ProcessContext::with_graphics(&graphics);
    let resource = Resource::new(texture("skin"));

    assert!(resource.process(&ImmediateTaskRunner, &ctx));
    assert_eq!(resource.state_kind(), ResourceStateKind::Ready);
    assert_eq!(resource.get().unwrap().gpu_id(), Some(TextureId(1)));
    assert_eq!(*graphics.created.lock(), vec!["skin".to_string()]);

    resource.request_drop();
    assert_eq!(resource.state_kind(), ResourceStateKind::Dropping);
    assert!(resource.get().is_none());

    assert!(resource.process(&ImmediateTaskRunner, &ctx));
    assert!(resource.is_dropped());
    assert_eq!(*graphics.deleted.lock(), vec![TextureId(1)]);
}

#[test]
fn headless_upload_keeps_cpu_data() {
    let resource = Resource::new(texture("skin"));
    resource.process(&ImmediateTaskRunner, &ProcessContext::headless());

    let texture = resource.get().unwrap();
    assert_eq!(texture.gpu_id(), None);
    assert_eq!(texture.rgba(), &[255, 0, 0, 255]);
}

#[test]
fn failed_load_is_reported_once() {
    let reported: Mutex<Vec<(ResourceId, String)>> = Mutex::new(Vec::new());
    let handler = |id: ResourceId, message: &str| reported.lock().push((id, message.to_string()));
    let ctx = ProcessContext::new(None, &handler);

    let resource: Resource<Texture> =
        Resource::from_loader(|| Err(ForgeError::Format("bad header".to_string())));
    resource.process(&ImmediateTaskRunner, &ctx);
    assert!(resource.process(&ImmediateTaskRunner, &ctx));

    assert!(resource.is_failed());
    assert_eq!(resource.error().as_deref(), Some("bad header"));
    assert!(!resource.needs_processing());
    assert!(!resource.process(&ImmediateTaskRunner, &ctx));

    let reported = reported.lock();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0], (resource.id(), "bad header".to_string()));
}

#[test]
fn resource_ids_are_unique() {
    let a = Resource::new(texture("a"));
    let b = Resource::new(texture("b"));
    assert_ne!(a.id(), b.id());
    assert!(a.id().value() > 0);
}

// ============================================================================
// Dropping
// ============================================================================

#[test]
fn drop_before_load_is_immediate() {
    let resource = Resource::from_loader(|| Ok(texture("never")));
    resource.request_drop();
    assert!(resource.is_dropped());
    assert!(!resource.process(&ImmediateTaskRunner, &ProcessContext::headless()));
}

#[test]
fn drop_while_loading_discards_result() {
    let runner = QueuedTaskRunner::new();
    let ctx = ProcessContext::headless();
    let resource = Resource::from_loader(|| Ok(texture("late")));
    resource.process(&runner, &ctx);

    resource.request_drop();
    assert!(resource.is_dropped());

    runner.run_all();
    assert!(!resource.process(&runner, &ctx));
    assert!(resource.is_dropped());
}

#[test]
fn failed_resource_ignores_drop() {
    let resource: Resource<Texture> = Resource::with_state(ResourceState::Failed {
        error: "missing".to_string(),
    });
    resource.request_drop();
    assert!(resource.is_failed());
}

// ============================================================================
// Synchronous Helpers
// ============================================================================

#[test]
fn sync_helpers_walk_the_lifecycle() {
    let graphics = RecordingGraphics::default();
    let ctx = ProcessContext::with_graphics(&graphics);
    let resource = Resource::from_loader(|| Ok(texture("sync")));

    resource.upload_sync(&ctx);
    assert_eq!(resource.state_kind(), ResourceStateKind::Unloaded);

    resource.load_sync();
    assert_eq!(resource.state_kind(), ResourceStateKind::Loaded);

    resource.upload_sync(&ctx);
    assert_eq!(resource.state_kind(), ResourceStateKind::Ready);
    assert_eq!(graphics.created.lock().len(), 1);

    resource.drop_sync(&ctx);
    assert!(resource.is_dropped());
    assert_eq!(*graphics.deleted.lock(), vec![TextureId(1)]);
}

#[test]
fn load_sync_records_failure() {
    let resource: Resource<Texture> = Resource::from_loader(|| Err(ForgeError::TaskCancelled));
    resource.load_sync();
    assert!(resource.is_failed());

    resource.drop_sync(&ProcessContext::headless());
    assert!(resource.is_failed());
}

// ============================================================================
// Task Runners
// ============================================================================

#[test]
fn ready_task_resolves_without_runner() {
    let mut task = Task::ready("done");
    assert_eq!(task.try_result().unwrap().unwrap(), "done");
}

#[test]
fn dropped_queue_cancels_task() {
    let runner = QueuedTaskRunner::new();
    let mut task = Task::run(&runner, || 1);
    assert!(task.try_result().is_none());

    drop(runner);
    assert!(matches!(task.try_result(), Some(Err(ForgeError::TaskCancelled))));
}

#[test]
fn thread_pool_task_can_be_awaited() {
    let runner = ThreadPoolTaskRunner::new(2).unwrap();
    assert_eq!(runner.thread_count(), 2);

    let tasks: Vec<_> = (0..8).map(|i| Task::run(&runner, move || i * i)).collect();
    let results: Vec<i32> = tasks
        .into_iter()
        .map(|task| pollster::block_on(task).unwrap())
        .collect();
    assert_eq!(results, vec![0, 1, 4, 9, 16, 25, 36, 49]);
}

#[test]
fn thread_pool_loads_resource() {
    let runner = ThreadPoolTaskRunner::new(1).unwrap();
    let ctx = ProcessContext::headless();
    let resource = Arc::new(Resource::from_loader(|| Ok(texture("pooled"))));

    resource.process(&runner, &ctx);
    while resource.state_kind() == ResourceStateKind::Loading {
        resource.process(&runner, &ctx);
        std::thread::yield_now();
    }
    assert_eq!(resource.state_kind(), ResourceStateKind::Loaded);
}

#[test]
fn tokio_runner_uses_blocking_pool() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let runner = TokioTaskRunner::new(runtime.handle().clone());

    let task = Task::run(&runner, || "from tokio".to_string());
    assert_eq!(runtime.block_on(task).unwrap(), "from tokio");
    assert!(TokioTaskRunner::from_current().is_none());
}
