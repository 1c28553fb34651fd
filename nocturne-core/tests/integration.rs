//! Integration Tests for the Scene Graph
//!
//! These tests drive the graph and the scene through their public API and
//! check that edits, evaluation, persistence and property sheets work
//! together correctly.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use slotmap::SlotMap;

use nocturne_core::config::SceneConfig;
use nocturne_core::error::{GraphError, SceneError};
use nocturne_core::graph::{Graph, GraphDirection, NodeAccess, NodeId, SceneNode};
use nocturne_core::persist::SceneDocument;
use nocturne_core::properties::{PanelKind, PropertiesManager, PropertiesStyle};
use nocturne_core::scene::{Aabb, Influence, LocatorShape, Scene, SceneEvent};

/// Plain node storage for driving a [`Graph`] directly.
#[derive(Default)]
struct Nodes {
    nodes: SlotMap<NodeId, SceneNode>,
    evaluated: Vec<(NodeId, GraphDirection)>,
}

impl NodeAccess for Nodes {
    fn scene_node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    fn scene_node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    fn do_evaluate(&mut self, id: NodeId, direction: GraphDirection) {
        self.evaluated.push((id, direction));
    }
}

fn assert_close(actual: Vec3, expected: Vec3) {
    assert!(
        actual.abs_diff_eq(expected, 1e-5),
        "expected {expected}, got {actual}"
    );
}

fn assert_encloses(outer: Aabb, inner: Aabb) {
    let eps = Vec3::splat(1e-5);
    assert!(
        outer.min.cmple(inner.min + eps).all() && outer.max.cmpge(inner.max - eps).all(),
        "{outer:?} does not enclose {inner:?}"
    );
}

/// Test that a dirty chain is evaluated once per node, in order.
#[test]
fn chain_evaluates_every_node_once() {
    let mut graph = Graph::new();
    let mut nodes = Nodes::default();
    let a = nodes.nodes.insert(SceneNode::new("A"));
    let b = nodes.nodes.insert(SceneNode::new("B"));
    let c = nodes.nodes.insert(SceneNode::new("C"));
    for id in [a, b, c] {
        graph.add_node(&mut nodes, id);
    }
    graph.add_edge(&mut nodes, a, b);
    graph.add_edge(&mut nodes, b, c);

    let result = graph.evaluate_graph(&mut nodes, false).unwrap();

    assert_eq!(result.node_count, 3);
    let evaluated: Vec<NodeId> = graph.evaluated_nodes().iter().copied().collect();
    assert_eq!(evaluated, vec![a, b, c]);

    let downstream: Vec<NodeId> = nodes
        .evaluated
        .iter()
        .filter(|(_, d)| *d == GraphDirection::Downstream)
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(downstream, vec![a, b, c]);
}

/// Test that a cycle added behind the scene's back fails the sweep.
#[test]
fn cycle_fails_the_sweep() {
    let mut graph = Graph::new();
    let mut nodes = Nodes::default();
    let [a, b, c, d] = ["a", "b", "c", "d"].map(|name| nodes.nodes.insert(SceneNode::new(name)));
    for id in [a, b, c, d] {
        graph.add_node(&mut nodes, id);
    }
    graph.add_edge(&mut nodes, a, b);
    graph.add_edge(&mut nodes, b, c);
    graph.add_edge(&mut nodes, c, b);
    graph.add_edge(&mut nodes, c, d);

    let result = graph.evaluate_graph(&mut nodes, true);

    assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
}

/// Test that global transforms compose through three levels.
#[test]
fn transforms_compose_through_hierarchy() {
    let mut scene = Scene::default();
    let a = scene.create_transform("a");
    let b = scene.create_transform("b");
    let c = scene.create_transform("c");
    scene.set_parent(b, a).unwrap();
    scene.set_parent(c, b).unwrap();

    scene.set_translate(a, Vec3::X).unwrap();
    scene.set_rotate_degrees(b, Vec3::new(0.0, 0.0, 90.0)).unwrap();
    scene.set_translate(c, Vec3::X).unwrap();
    scene.evaluate().unwrap();

    let global = scene.global_transform(c).unwrap();
    assert_close(global.w_axis.truncate(), Vec3::new(1.0, 1.0, 0.0));
    assert_close(global.transform_vector3(Vec3::X), Vec3::Y);

    // Moving the top of the chain moves everything below it
    scene.set_translate(a, Vec3::new(5.0, 0.0, 0.0)).unwrap();
    scene.evaluate().unwrap();
    let global = scene.global_transform(c).unwrap();
    assert_close(global.w_axis.truncate(), Vec3::new(5.0, 1.0, 0.0));
}

/// Test that removing an only child leaves no dangling links.
#[test]
fn remove_only_child_clears_links() {
    let mut scene = Scene::default();
    let parent = scene.create_transform("parent");
    let child = scene.create_transform("child");
    scene.set_parent(child, parent).unwrap();

    scene.remove_child(parent, child).unwrap();

    assert!(scene.children(parent).is_empty());
    let entry = scene.node(child).unwrap();
    let hierarchy = entry.hierarchy().unwrap();
    assert_eq!(hierarchy.parent(), None);
    assert_eq!(hierarchy.previous(), None);
    assert_eq!(hierarchy.next(), None);
    assert!(!entry.scene_node().ancestors().contains(&parent));
    assert!(!scene
        .node(parent)
        .unwrap()
        .scene_node()
        .descendants()
        .contains(&child));

    assert!(matches!(
        scene.remove_child(parent, child),
        Err(SceneError::NotAChild { .. })
    ));
}

/// Test that dirtying an already dirty region marks nothing new.
#[test]
fn dirty_is_idempotent() {
    let mut scene = Scene::default();
    let a = scene.create_transform("a");
    let b = scene.create_transform("b");
    scene.set_parent(b, a).unwrap();
    scene.evaluate().unwrap();

    assert!(scene.dirty(a) > 0);
    assert_eq!(scene.dirty(a), 0);
}

/// Test that a sweep leaves every node clean and a second sweep does nothing.
#[test]
fn evaluation_reaches_fixpoint() {
    let mut scene = Scene::default();
    let group = scene.create_transform("group");
    let light = scene.create_light("light");
    let layer = scene.create_layer("layer");
    scene.set_parent(light, group).unwrap();
    scene.add_layer_member(layer, light).unwrap();

    let first = scene.evaluate().unwrap();
    assert!(first.node_count > 0);

    let ids: Vec<NodeId> = scene.node_ids().collect();
    for id in ids {
        for direction in GraphDirection::ALL {
            assert!(!scene.is_dirty(id, direction));
        }
    }
    assert_eq!(scene.evaluate().unwrap().node_count, 0);
}

/// Test that hiding a layer hides its members and their children.
#[test]
fn layer_visibility_hides_members() {
    let mut scene = Scene::default();
    let member = scene.create_transform("member");
    let child = scene.create_locator("child", LocatorShape::Cube);
    let other = scene.create_transform("other");
    let layer = scene.create_layer("layer");
    scene.set_parent(child, member).unwrap();
    scene.add_layer_member(layer, member).unwrap();
    scene.evaluate().unwrap();
    assert!(scene.is_visible(member));

    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    scene.subscribe(move |event| {
        if let SceneEvent::VisibilityChanged { node, visible } = event {
            sink.borrow_mut().push((*node, *visible));
        }
    });

    scene.set_layer_visible(layer, false).unwrap();
    scene.evaluate().unwrap();

    assert!(!scene.is_visible(member));
    assert!(!scene.is_visible(child));
    assert!(scene.is_visible(other));
    assert!(changes.borrow().contains(&(member, false)));
    assert!(!scene.is_visible(scene.root()));
}

/// Test that hierarchy bounds include children in the parent's space.
#[test]
fn hierarchy_bounds_accumulate_children() {
    let mut scene = Scene::default();
    let group = scene.create_transform("group");
    let offset = scene.create_transform("offset");
    let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
    scene.set_parent(offset, group).unwrap();
    scene.set_parent(mesh, offset).unwrap();
    scene.set_translate(group, Vec3::new(10.0, 0.0, 0.0)).unwrap();
    scene.set_translate(offset, Vec3::new(2.0, 0.0, 0.0)).unwrap();
    scene.evaluate().unwrap();

    let local = scene.hierarchy_bounds(group).unwrap();
    assert_close(local.min, Vec3::new(-0.1, -1.0, -1.0));
    assert_close(local.max, Vec3::new(3.0, 1.0, 1.0));

    let world = scene.global_hierarchy_bounds(group).unwrap();
    assert_close(world.max, Vec3::new(13.0, 1.0, 1.0));

    // Growing the mesh grows every ancestor
    scene.set_mesh_bounds(mesh, Aabb::cube(2.0)).unwrap();
    scene.evaluate().unwrap();
    assert_close(scene.hierarchy_bounds(group).unwrap().max, Vec3::new(4.0, 2.0, 2.0));
}

/// Test that new entity class bounds reach the hierarchy bounds of every
/// instance and its ancestors in the same sweep.
#[test]
fn entity_class_bounds_reach_hierarchy_bounds() {
    let mut scene = Scene::default();
    let group = scene.create_transform("group");
    let crates = scene.create_entity_set("props/crate.entity");
    let instance = scene.create_entity("crate01", crates).unwrap();
    scene.set_parent(instance, group).unwrap();
    scene.evaluate().unwrap();
    assert!(scene.object_bounds(instance).unwrap().is_empty());

    scene.set_entity_class_bounds(crates, Some(Aabb::cube(5.0))).unwrap();
    scene.evaluate().unwrap();

    let object = scene.object_bounds(instance).unwrap();
    assert_close(object.max, Vec3::splat(5.0));
    assert_encloses(scene.hierarchy_bounds(instance).unwrap(), object);
    assert_encloses(scene.hierarchy_bounds(group).unwrap(), object);
    assert_eq!(scene.evaluate().unwrap().node_count, 0);
}

/// Test that a light's pointer bounds follow its parent's scale all the way
/// into its hierarchy bounds.
#[test]
fn light_bounds_follow_parent_scale() {
    let mut scene = Scene::default();
    let parent = scene.create_transform("parent");
    let light = scene.create_light("light");
    scene.set_parent(light, parent).unwrap();
    scene.evaluate().unwrap();
    let before = scene.object_bounds(light).unwrap();

    scene.set_scale(parent, Vec3::splat(4.0)).unwrap();
    scene.evaluate().unwrap();

    let object = scene.object_bounds(light).unwrap();
    assert_close(object.max, before.max / 4.0);
    let hierarchy = scene.hierarchy_bounds(light).unwrap();
    assert_close(hierarchy.min, object.min);
    assert_close(hierarchy.max, object.max);
    assert_encloses(scene.hierarchy_bounds(parent).unwrap(), object);
}

/// Test that hierarchy bounds enclose object bounds after every kind of edit.
#[test]
fn hierarchy_bounds_enclose_object_bounds_after_every_edit() {
    let mut scene = Scene::default();
    let group = scene.create_transform("group");
    let light = scene.create_light("light");
    let locator = scene.create_locator("locator", LocatorShape::Cross);
    let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
    let crates = scene.create_entity_set("props/crate.entity");
    let instance = scene.create_entity("crate01", crates).unwrap();
    for node in [light, locator, instance] {
        scene.set_parent(node, group).unwrap();
    }
    scene.set_parent(mesh, locator).unwrap();
    scene.evaluate().unwrap();

    let edits: Vec<Box<dyn Fn(&mut Scene)>> = vec![
        Box::new(move |s| s.set_scale(group, Vec3::splat(4.0)).unwrap()),
        Box::new(move |s| s.set_locator_shape(locator, LocatorShape::Cube).unwrap()),
        Box::new(move |s| s.set_mesh_bounds(mesh, Aabb::cube(3.0)).unwrap()),
        Box::new(move |s| s.set_entity_class_bounds(crates, Some(Aabb::cube(2.0))).unwrap()),
        Box::new(move |s| s.set_parent(light, locator).unwrap()),
        Box::new(move |s| s.set_scale(locator, Vec3::splat(0.5)).unwrap()),
    ];

    for edit in edits {
        edit(&mut scene);
        scene.evaluate().unwrap();

        let ids: Vec<NodeId> = scene.node_ids().collect();
        for id in ids {
            let bounds = (scene.object_bounds(id), scene.hierarchy_bounds(id));
            let (Some(object), Some(hierarchy)) = bounds else {
                continue;
            };
            if !object.is_empty() {
                assert_encloses(hierarchy, object);
            }
        }
        assert_eq!(scene.evaluate().unwrap().node_count, 0);
    }
}

/// Test that skin matrices are conjugated into the mesh's space.
#[test]
fn skin_matrices_use_mesh_space() {
    let mut scene = Scene::default();
    let body = scene.create_transform("body");
    let joint = scene.create_transform("joint");
    let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
    scene.set_parent(mesh, body).unwrap();
    scene.set_translate(body, Vec3::new(0.0, 0.0, 3.0)).unwrap();
    scene.set_rotate_degrees(body, Vec3::new(0.0, 0.0, 90.0)).unwrap();
    let skin = scene.create_skin("skin", mesh, vec![joint]).unwrap();
    scene
        .set_skin_influences(
            skin,
            vec![Influence {
                objects: vec![0],
                weights: vec![1.0],
            }],
        )
        .unwrap();
    scene.evaluate().unwrap();

    scene.set_translate(joint, Vec3::Y).unwrap();
    scene.evaluate().unwrap();

    let mesh_global = scene.global_transform(mesh).unwrap();
    let joint_transform = scene.transform(joint).unwrap();
    let expected = mesh_global.inverse()
        * (joint_transform.global_transform() * joint_transform.inverse_bind_transform())
        * mesh_global;

    let data = scene.skin(skin).unwrap();
    assert!(data.deform_matrices()[0].abs_diff_eq(expected, 1e-5));
    assert!(data.skin_matrices()[0].abs_diff_eq(mesh_global.inverse() * expected, 1e-5));
}

/// Test that a skin follows its mesh to a new parent transform.
#[test]
fn skin_follows_reparented_mesh() {
    let mut scene = Scene::default();
    let first = scene.create_transform("first");
    let second = scene.create_transform("second");
    let joint = scene.create_transform("joint");
    let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
    scene.set_parent(mesh, first).unwrap();
    let skin = scene.create_skin("skin", mesh, vec![joint]).unwrap();
    scene.evaluate().unwrap();

    scene.set_parent(mesh, second).unwrap();
    // Edited in the same sweep, so the skin must wait for `second`
    scene.set_rotate_degrees(second, Vec3::new(0.0, 0.0, 90.0)).unwrap();
    scene.set_translate(joint, Vec3::Y).unwrap();
    scene.evaluate().unwrap();

    let ancestors = scene.node(skin).unwrap().scene_node().ancestors();
    assert!(ancestors.contains(&second));
    assert!(!ancestors.contains(&first));

    let mesh_global = scene.global_transform(second).unwrap();
    let joint_transform = scene.transform(joint).unwrap();
    let expected = mesh_global.inverse()
        * (joint_transform.global_transform() * joint_transform.inverse_bind_transform())
        * mesh_global;
    assert!(scene.skin(skin).unwrap().deform_matrices()[0].abs_diff_eq(expected, 1e-5));

    // Without a parent the mesh has no transform to read
    scene.remove_child(second, mesh).unwrap();
    assert!(!scene.node(skin).unwrap().scene_node().ancestors().contains(&second));
    scene.evaluate().unwrap();
}

/// Test that a skin which cannot be bound is not left in the scene.
#[test]
fn failed_skin_binding_leaves_no_node() {
    let mut scene = Scene::default();
    let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
    let joint = scene.create_transform("joint");
    scene.set_parent(joint, mesh).unwrap();
    let count = scene.node_count();

    assert!(matches!(
        scene.create_skin("skin", mesh, vec![joint]),
        Err(SceneError::DependencyCycle { .. })
    ));
    assert_eq!(scene.node_count(), count);
    assert!(scene.node(joint).unwrap().scene_node().descendants().is_empty());
    assert_eq!(scene.node(mesh).unwrap().scene_node().ancestors().len(), 1);
    assert!(scene.evaluate().is_ok());

    assert!(matches!(
        scene.create_skin("skin", mesh, vec![mesh]),
        Err(SceneError::WrongKind { .. })
    ));
}

/// Test that a parent-changing listener can veto a reparent.
#[test]
fn reparent_can_be_vetoed() {
    let mut scene = Scene::default();
    let locked = scene.create_transform("locked");
    let target = scene.create_transform("target");

    scene.on_parent_changing(move |args| args.node != locked);

    assert!(matches!(
        scene.set_parent(locked, target),
        Err(SceneError::ReparentVetoed(_))
    ));
    assert_eq!(scene.parent(locked), Some(scene.root()));
    assert!(scene.sibling_links_valid(scene.root()));
}

/// Test that edits which would close a cycle are refused.
#[test]
fn cyclic_edits_are_refused() {
    let mut scene = Scene::default();
    let a = scene.create_transform("a");
    let b = scene.create_transform("b");
    scene.set_parent(b, a).unwrap();

    assert!(matches!(
        scene.set_parent(a, b),
        Err(SceneError::ParentCycle { .. })
    ));
    assert!(matches!(
        scene.create_dependency(a, b),
        Err(SceneError::DependencyCycle { .. })
    ));
    assert!(scene.evaluate().is_ok());
}

/// Test that a scene survives a MessagePack round trip.
#[test]
fn document_round_trip_preserves_structure() {
    let mut scene = Scene::default();
    let rig = scene.create_transform("rig");
    let bone = scene.create_transform("bone");
    let body = scene.create_transform("body");
    let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
    let lamp = scene.create_light("lamp");
    let crates = scene.create_entity_set("props/crate.entity");
    let instance = scene.create_entity("crate01", crates).unwrap();
    let layer = scene.create_layer("props");
    scene.set_parent(bone, rig).unwrap();
    scene.set_parent(mesh, body).unwrap();
    scene.set_hidden(lamp, true).unwrap();
    scene.set_light_color(lamp, Vec3::new(1.0, 0.5, 0.25)).unwrap();
    scene.add_layer_member(layer, instance).unwrap();
    let skin = scene.create_skin("skin", mesh, vec![bone]).unwrap();
    scene
        .set_skin_influences(
            skin,
            vec![Influence {
                objects: vec![0],
                weights: vec![1.0],
            }],
        )
        .unwrap();
    scene.evaluate().unwrap();

    let document = scene.to_document();
    let bytes = document.to_msgpack().unwrap();
    let decoded = SceneDocument::from_msgpack(&bytes).unwrap();
    assert_eq!(decoded, document);

    let mut loaded = Scene::from_document(SceneConfig::default(), &decoded).unwrap();
    loaded.evaluate().unwrap();

    assert_eq!(loaded.node_count(), scene.node_count());
    assert_eq!(loaded.to_document(), document);

    let find = |id: NodeId| loaded.find_by_uid(scene.uid(id).unwrap()).unwrap();
    assert_eq!(loaded.path(find(bone)).unwrap(), "|rig|bone");
    assert!(!loaded.is_visible(find(lamp)));
    assert_eq!(loaded.entity_set(find(crates)).unwrap().instances(), &[find(instance)]);
    assert_eq!(loaded.layers_of(find(instance)), vec![find(layer)]);

    let loaded_skin = loaded.skin(find(skin)).unwrap();
    assert_eq!(loaded_skin.mesh(), Some(find(mesh)));
    assert_eq!(loaded_skin.skin_matrices().len(), 1);
}

/// Test that only the newest selection's sheet is ever presented.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_property_sheets_are_never_presented() {
    let mut scene = Scene::default();
    let lights: Vec<NodeId> = (0..50)
        .map(|i| scene.create_light(&format!("light{i}")))
        .collect();
    let layer = scene.create_layer("layer");
    scene.evaluate().unwrap();

    let mut manager = PropertiesManager::new(
        tokio::runtime::Handle::current(),
        &SceneConfig::default().properties,
    );
    assert_eq!(manager.style(), PropertiesStyle::Intersection);

    manager.set_selection(scene.snapshot(&lights));
    manager.set_selection(scene.snapshot(&[layer]));
    manager.sync().await;

    let first = manager.presented().unwrap();
    assert_eq!(first.selection_id, manager.selection_id());
    assert!(first.panel(PanelKind::Layer).is_some());
    assert!(first.panel(PanelKind::Light).is_none());
    assert!(!manager.is_active());

    manager.set_style(PropertiesStyle::Union);
    let mut mixed = lights.clone();
    mixed.push(layer);
    manager.set_selection(scene.snapshot(&mixed));
    manager.sync().await;

    let sheet = manager.presented().unwrap();
    assert_eq!(sheet.style, PropertiesStyle::Union);
    assert_eq!(sheet.panel(PanelKind::Light).unwrap().nodes.len(), 50);
    assert_eq!(sheet.panel(PanelKind::Layer).unwrap().nodes, vec![layer]);
    assert!(first.selection_id < sheet.selection_id);
}
