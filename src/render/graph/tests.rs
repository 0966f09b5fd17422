use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{
    AssetTable, AssetTags, ObserverId, OutputTag, RenderGraph, RenderGraphError, Sharing, Task,
    TaskContext,
};
use crate::config::SceneConfig;
use crate::render::{
    Command, CommandList, DrawParams, Framebuffer, Scene, ScenePassTask, ShadowMap, StageId,
    UpdateSpeed,
};
use crate::test_util::{self, mock_layout, mock_pipeline, EventTracer, MockState};
use crate::tracer::{self, Tracer};
use crate::Entity;

const CAMERA: ObserverId = ObserverId(0);
const MIRROR: ObserverId = ObserverId(1);

#[derive(Default)]
struct Calls {
    created:  AtomicUsize,
    executed: Mutex<Vec<String>>,
}

struct TestTask {
    name:  &'static str,
    tags:  AssetTags,
    calls: Arc<Calls>,
}

impl TestTask {
    fn boxed(name: &'static str, tags: AssetTags, calls: &Arc<Calls>) -> Box<dyn Task> {
        Box::new(Self { name, tags, calls: Arc::clone(calls) })
    }
}

impl Task for TestTask {
    fn name(&self) -> &str { self.name }

    fn asset_tags(&self) -> AssetTags { self.tags.clone() }

    fn create_assets(
        &mut self,
        observer: ObserverId,
        assets: &mut AssetTable,
    ) -> Result<(), RenderGraphError> {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        for output in &self.tags.outputs {
            if output.creation == super::Creation::CreatedByTask {
                assets.insert(output.tag.clone(), observer.0);
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), RenderGraphError> {
        for tag in &self.tags.required {
            if ctx.assets.contains(tag.as_str()) {
                ctx.assets.get::<u32>(tag.as_str())?;
            }
        }
        self.calls.executed.lock().push(self.name.to_string());
        Ok(())
    }
}

/// A deferred renderer: shadow and gbuffer feed lighting, ui draws over the result.
///
/// Tasks are added out of dependency order.
fn deferred_graph(calls: &Arc<Calls>) -> RenderGraph {
    let mut graph = RenderGraph::new();
    graph.declare_external("swapchain");
    graph.add_task(TestTask::boxed(
        "lighting",
        AssetTags::new()
            .require("shadow_map")
            .require("gbuffer")
            .output(OutputTag::created("lit"))
            .output(OutputTag::external("swapchain")),
        calls,
    ));
    graph.add_task(TestTask::boxed(
        "shadow",
        AssetTags::new().output(OutputTag::created("shadow_map")),
        calls,
    ));
    graph.add_task(TestTask::boxed("gbuffer", AssetTags::new().output(OutputTag::created("gbuffer")), calls));
    graph.add_task(TestTask::boxed(
        "ui",
        AssetTags::new().require("lit").optional("debug_overlay").output(OutputTag::external("swapchain")),
        calls,
    ));
    graph
}

fn stage_names(graph: &RenderGraph) -> Vec<Vec<&str>> {
    graph
        .timeline()
        .iter()
        .map(|stage| {
            stage.tasks().iter().map(|&task| graph.task_name(task).expect("valid index")).collect()
        })
        .collect()
}

#[test]
fn test_build_layers_tasks() {
    test_util::init();

    let calls = Arc::new(Calls::default());
    let mut graph = deferred_graph(&calls);
    assert!(graph.needs_rebuild());
    graph.build().expect("graph is valid");
    assert!(!graph.needs_rebuild());

    assert_eq!(stage_names(&graph), vec![vec!["shadow", "gbuffer"], vec!["lighting"], vec!["ui"]]);

    // every dependency is in a strictly earlier stage
    let stage_of = |task: usize| {
        graph.timeline().iter().position(|stage| stage.tasks().contains(&task)).expect("scheduled")
    };
    for task in 0..graph.task_count() {
        for &dep in graph.dependencies_of(task) {
            assert!(stage_of(dep) < stage_of(task), "task {task} runs before its dependency {dep}");
        }
    }
}

#[test]
fn test_build_is_deterministic() {
    let calls = Arc::new(Calls::default());
    let mut first = deferred_graph(&calls);
    first.build().expect("graph is valid");

    for _ in 0..16 {
        let mut other = deferred_graph(&calls);
        other.build().expect("graph is valid");
        assert_eq!(other.timeline(), first.timeline());
    }

    let before = first.timeline().to_vec();
    first.build().expect("graph is valid");
    assert_eq!(first.timeline(), &before[..]);
}

#[test]
fn test_optional_input_follows_present_producer() {
    let calls = Arc::new(Calls::default());
    let mut graph = deferred_graph(&calls);
    graph.add_task(TestTask::boxed(
        "debug",
        AssetTags::new().require("gbuffer").output(OutputTag::created("debug_overlay")),
        &calls,
    ));
    graph.build().expect("graph is valid");

    assert_eq!(
        stage_names(&graph),
        vec![vec!["shadow", "gbuffer"], vec!["lighting", "debug"], vec!["ui"]]
    );
}

#[test]
fn test_build_errors() {
    let calls = Arc::new(Calls::default());

    let mut graph = RenderGraph::new();
    graph.add_task(TestTask::boxed("post", AssetTags::new().require("hdr"), &calls));
    assert_eq!(
        graph.build(),
        Err(RenderGraphError::UnresolvedInput { task: "post".into(), tag: "hdr".into() })
    );
    assert!(graph.needs_rebuild());
    graph.declare_external("hdr");
    graph.build().expect("hdr is external");

    let mut graph = RenderGraph::new();
    graph.add_task(TestTask::boxed("a", AssetTags::new().output(OutputTag::created("depth")), &calls));
    graph.add_task(TestTask::boxed(
        "b",
        AssetTags::new().output(OutputTag::created("depth").with_sharing(Sharing::Shared)),
        &calls,
    ));
    assert_eq!(
        graph.build(),
        Err(RenderGraphError::DuplicateExclusiveOutput {
            tag:    "depth".into(),
            first:  "a".into(),
            second: "b".into(),
        })
    );

    let mut graph = RenderGraph::new();
    graph.add_task(TestTask::boxed("present", AssetTags::new().output(OutputTag::external("swapchain")), &calls));
    assert_eq!(
        graph.build(),
        Err(RenderGraphError::MissingExternal { task: "present".into(), tag: "swapchain".into() })
    );

    let mut graph = RenderGraph::new();
    graph.add_task(TestTask::boxed(
        "ping",
        AssetTags::new().require("pong").output(OutputTag::created("ping")),
        &calls,
    ));
    graph.add_task(TestTask::boxed(
        "pong",
        AssetTags::new().require("ping").output(OutputTag::created("pong")),
        &calls,
    ));
    match graph.build() {
        Err(RenderGraphError::Cycle(path)) => {
            assert!(path.contains("ping") && path.contains("pong"), "unexpected cycle path {path}");
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

/// Records task starts into an [`EventTracer`].
struct TaskOrder(EventTracer<String>);

impl Tracer for TaskOrder {
    fn start_task(&self, _stage: usize, task: &str) { self.0.trace(task.to_string()); }
}

#[test]
fn test_execute_order() {
    test_util::init();

    let calls = Arc::new(Calls::default());
    let mut graph = deferred_graph(&calls);
    graph.set_external_asset(CAMERA, "swapchain", 0_u32);

    let order = TaskOrder(EventTracer::new(
        [("shadow", "lighting"), ("gbuffer", "lighting"), ("lighting", "ui")]
            .map(|(before, after)| (before.to_string(), after.to_string())),
    ));
    let aggregate = tracer::Aggregate((tracer::Log(log::Level::Trace), &order));

    let mut cmd = CommandList::new();
    graph.execute(&mut cmd, CAMERA, &aggregate).expect("graph is valid");

    assert_eq!(order.0.get_events(), vec!["shadow", "gbuffer", "lighting", "ui"]);
    assert_eq!(*calls.executed.lock(), vec!["shadow", "gbuffer", "lighting", "ui"]);
}

#[test]
fn test_assets_created_once_per_observer() {
    let calls = Arc::new(Calls::default());
    let mut graph = deferred_graph(&calls);
    graph.declare_external("swapchain");
    let mut cmd = CommandList::new();

    graph.execute(&mut cmd, CAMERA, &tracer::Noop).expect("graph is valid");
    graph.execute(&mut cmd, CAMERA, &tracer::Noop).expect("graph is valid");
    assert_eq!(calls.created.load(Ordering::SeqCst), 4);

    graph.execute(&mut cmd, MIRROR, &tracer::Noop).expect("graph is valid");
    assert_eq!(calls.created.load(Ordering::SeqCst), 8);
    let mirror = graph.assets(MIRROR).expect("created");
    assert_eq!(mirror.get::<u32>("lit"), Ok(&1));

    // a rebuild recreates assets lazily
    graph.add_task(TestTask::boxed("noop", AssetTags::new(), &calls));
    graph.execute(&mut cmd, CAMERA, &tracer::Noop).expect("graph is valid");
    assert_eq!(calls.created.load(Ordering::SeqCst), 13);
    assert_eq!(calls.executed.lock().len(), 3 * 4 + 5);
}

#[test]
fn test_asset_table_errors() {
    let mut table = AssetTable::default();
    table.insert("target", Framebuffer { id: 1, width: 2, height: 2 });

    assert_eq!(table.get::<Framebuffer>("target"), Ok(&Framebuffer { id: 1, width: 2, height: 2 }));
    assert!(matches!(
        table.get::<ShadowMap>("target"),
        Err(RenderGraphError::AssetTypeMismatch { .. })
    ));
    assert_eq!(table.get::<Framebuffer>("other"), Err(RenderGraphError::MissingAsset("other".into())));
}

#[test]
fn test_scene_pass() {
    test_util::init();

    const SHADOW: StageId = StageId(0);
    const OPAQUE: StageId = StageId(1);

    let state = Arc::new(Mutex::new(MockState::default()));
    let layout = mock_layout(0, 1, &state);
    let shadow_pipeline = mock_pipeline(0, &layout);
    let opaque_pipeline = mock_pipeline(1, &layout);

    let scene = Arc::new(RwLock::new(Scene::new(SceneConfig::default())));
    for index in 0..3 {
        scene
            .write()
            .create_and_add_object(
                Entity::from_index(index),
                DrawParams { vertex_count: 3, instance_count: 1, ..DrawParams::default() },
                UpdateSpeed::Static,
                &[(SHADOW, Arc::clone(&shadow_pipeline)), (OPAQUE, Arc::clone(&opaque_pipeline))],
            )
            .expect("allocation succeeds");
    }

    let shadow_map = ShadowMap { id: 7, resolution: 1024 };
    let swapchain = Framebuffer { id: 1, width: 640, height: 480 };

    let mut graph = RenderGraph::new();
    graph.add_task(Box::new(
        ScenePassTask::new("opaque", Arc::clone(&scene), OPAQUE, "swapchain")
            .read("shadow_map")
            .clear([0.0, 0.0, 0.0, 1.0]),
    ));
    graph.add_task(Box::new(
        ScenePassTask::new("shadow", Arc::clone(&scene), SHADOW, "shadow_map")
            .create_target(shadow_map.as_framebuffer()),
    ));
    graph.set_external_asset(CAMERA, "swapchain", swapchain);

    let mut cmd = CommandList::new();
    graph.execute(&mut cmd, CAMERA, &tracer::Noop).expect("graph is valid");

    let framebuffers: Vec<_> = cmd
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::BindFramebuffer(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(framebuffers, vec![7, 1]);
    assert_eq!(cmd.draw_count(), 6);
    assert!(cmd.commands().contains(&Command::Clear([0.0, 0.0, 0.0, 1.0])));

    // the target is checked on every frame
    graph.set_external_asset(MIRROR, "swapchain", shadow_map);
    assert!(matches!(
        graph.execute(&mut cmd, MIRROR, &tracer::Noop),
        Err(RenderGraphError::AssetTypeMismatch { .. })
    ));
}
