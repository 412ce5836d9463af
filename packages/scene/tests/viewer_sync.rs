use scenelink_scene::{Layer, LinkState, MemoryViewer, Scene, SceneError, Viewer};
use scenelink_state::SchemaError;
use scenelink_sync::SyncError;
use serde_json::json;
use std::rc::Rc;

fn linked_scene() -> (Scene, Rc<MemoryViewer>, Rc<dyn Viewer>) {
    let memory = Rc::new(MemoryViewer::new());
    let viewer: Rc<dyn Viewer> = memory.clone();

    let mut scene = Scene::new().unwrap();
    scene
        .add_layers([
            Layer::image("precomputed://gs://b/img").unwrap(),
            Layer::segmentation("precomputed://gs://b/seg").unwrap(),
        ])
        .unwrap();
    scene.link(&viewer).unwrap();

    (scene, memory, viewer)
}

#[test]
fn test_link_registers_every_layer() {
    let (scene, memory, _viewer) = linked_scene();

    assert_eq!(scene.link_state(), LinkState::Linked);
    assert_eq!(memory.record_names(), vec!["img", "segmentation"]);
    assert_eq!(
        memory.record("img").and_then(|record| record.get("source").cloned()),
        Some(json!("precomputed://gs://b/img"))
    );
}

#[test]
fn test_edits_push_immediately_when_linked() {
    let (mut scene, memory, _viewer) = linked_scene();

    scene.layer_mut("img").unwrap().set("opacity", 0.25).unwrap();
    assert_eq!(memory.record("img").unwrap()["opacity"], json!(0.25));

    scene.set("layout", "4panel").unwrap();
    assert_eq!(memory.document()["layout"], json!("4panel"));
}

#[test]
fn test_link_conflict_on_duplicate_remote_name() {
    let memory = Rc::new(MemoryViewer::with_document(json!({
        "layers": [{"name": "img", "type": "image", "source": "other"}]
    })));
    let viewer: Rc<dyn Viewer> = memory.clone();

    let mut layer = Layer::image("precomputed://gs://b/img").unwrap();
    let err = layer.link(&viewer).unwrap_err();
    assert!(matches!(
        err,
        SceneError::Sync(SyncError::Conflict { ref name, count: 1 }) if name == "img"
    ));
    assert_eq!(layer.link_state(), LinkState::Detached);
}

#[test]
fn test_bulk_update_pushes_once() {
    let (mut scene, memory, _viewer) = linked_scene();
    let commits = memory.commit_count();

    scene
        .bulk_update(|scene| {
            scene.set("layout", "xy")?;
            scene.layer_mut("img")?.set("opacity", 0.5)?;
            scene.layer_mut("segmentation")?.set("segments", json!([1, 2]))?;
            scene.layer_mut("img")?.set("visible", false)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(memory.commit_count(), commits + 1);
    assert_eq!(memory.document()["layout"], json!("xy"));
    assert_eq!(memory.record("img").unwrap()["opacity"], json!(0.5));
    assert_eq!(memory.record("img").unwrap()["visible"], json!(false));
    assert_eq!(memory.record("segmentation").unwrap()["segments"], json!(["1", "2"]));
    assert_eq!(scene.link_state(), LinkState::Linked);
}

#[test]
fn test_bulk_guard_flushes_on_drop() {
    let (mut scene, memory, _viewer) = linked_scene();
    let commits = memory.commit_count();

    {
        let mut bulk = scene.begin_bulk_update().unwrap();
        bulk.layer_mut("img").unwrap().set("opacity", 0.1).unwrap();
        bulk.layer_mut("img").unwrap().set("opacity", 0.2).unwrap();
        assert_eq!(bulk.link_state(), LinkState::Locked);
        assert_eq!(memory.commit_count(), commits);
    }

    assert_eq!(memory.commit_count(), commits + 1);
    assert_eq!(memory.record("img").unwrap()["opacity"], json!(0.2));
}

#[test]
fn test_nested_bulk_updates_push_at_outermost_exit() {
    let (mut scene, memory, _viewer) = linked_scene();
    let commits = memory.commit_count();

    scene
        .bulk_update(|scene| {
            scene.bulk_update(|inner| inner.set("layout", "3d").map(|_| ()))?;
            assert_eq!(scene.link_state(), LinkState::Locked);
            scene.layer_mut("img")?.set("opacity", 0.9)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(memory.commit_count(), commits + 1);
    assert_eq!(memory.document()["layout"], json!("3d"));
}

#[test]
fn test_bulk_update_body_error_still_unlocks_and_flushes() {
    let (mut scene, memory, _viewer) = linked_scene();
    let commits = memory.commit_count();

    let result: Result<(), SceneError> = scene.bulk_update(|scene| {
        scene.set("layout", "xz")?;
        Err(SceneError::Parse("edit aborted".to_string()))
    });

    assert!(matches!(result, Err(SceneError::Parse(_))));
    assert_eq!(scene.link_state(), LinkState::Linked);
    assert_eq!(memory.commit_count(), commits + 1);
    assert_eq!(memory.document()["layout"], json!("xz"));
}

#[test]
fn test_bulk_update_reports_flush_failure() {
    let (mut scene, memory, _viewer) = linked_scene();
    memory.reject_commits(true);

    let result = scene.bulk_update(|scene| scene.set("layout", "yz").map(|_| ()));
    assert!(matches!(result, Err(SceneError::Sync(SyncError::Transaction(_)))));
    assert_eq!(scene.link_state(), LinkState::Linked);

    // Local edits survive a failed push
    assert_eq!(scene.get("layout"), Some(json!("yz")));
    assert!(scene.state().has_unsynced_changes());
}

#[test]
fn test_bulk_update_body_error_wins_over_flush_error() {
    let (mut scene, memory, _viewer) = linked_scene();
    memory.reject_commits(true);

    let result: Result<(), SceneError> =
        scene.bulk_update(|_| Err(SceneError::Parse("edit aborted".to_string())));
    assert!(matches!(result, Err(SceneError::Parse(_))));
}

#[test]
fn test_drop_layer_retracts_remote_record() {
    let (mut scene, memory, _viewer) = linked_scene();

    let dropped = scene.drop_layer("img").unwrap();
    assert_eq!(dropped.link_state(), LinkState::Detached);
    assert_eq!(memory.record_names(), vec!["segmentation"]);
}

#[test]
fn test_refreshed_state_pulls_remote_edits() {
    let (mut scene, memory, _viewer) = linked_scene();

    let mut document = memory.document();
    document["layers"][0]["opacity"] = json!(0.75);
    document["layout"] = json!("xy-3d");
    memory.set_document(document);

    let layer = scene.layer_mut("img").unwrap();
    assert_eq!(layer.refreshed_state().unwrap().get_value("opacity"), Some(json!(0.75)));
    assert_eq!(
        scene.refreshed_state().unwrap().get_value("layout"),
        Some(json!("xy-3d"))
    );
}

#[test]
fn test_layers_added_while_linked_are_linked() {
    let (mut scene, memory, _viewer) = linked_scene();

    scene.add_layers([Layer::mesh("vtk://m").unwrap()]).unwrap();
    assert_eq!(scene.layer("meshes").unwrap().link_state(), LinkState::Linked);
    assert_eq!(memory.record_names(), vec!["img", "segmentation", "meshes"]);
}

#[test]
fn test_dropped_viewer_detaches_quietly() {
    let (mut scene, memory, viewer) = linked_scene();
    drop(viewer);
    drop(memory);

    assert!(matches!(
        scene.push(false),
        Err(SceneError::Sync(SyncError::ViewerDropped))
    ));
    let layer = scene.drop_layer("img").unwrap();
    assert_eq!(layer.link_state(), LinkState::Detached);
}

#[test]
fn test_unlink_leaves_remote_records() {
    let (mut scene, memory, _viewer) = linked_scene();
    scene.unlink();

    scene.layer_mut("img").unwrap().set("opacity", 0.4).unwrap();
    assert_eq!(scene.link_state(), LinkState::Detached);
    assert_eq!(memory.record_names(), vec!["img", "segmentation"]);
    assert!(memory.record("img").unwrap().get("opacity").is_none());
}

#[test]
fn test_pull_with_invalid_record_changes_nothing() {
    let (mut scene, memory, _viewer) = linked_scene();

    let mut document = memory.document();
    document["layout"] = json!("remote-layout");
    document["layers"][0]["opacity"] = json!(0.9);
    document["layers"][1].as_object_mut().unwrap().remove("source");
    memory.set_document(document);

    let err = scene.pull().unwrap_err();
    assert!(matches!(
        err,
        SceneError::Schema(SchemaError::MissingProperty { ref key, .. }) if key == "source"
    ));
    assert_eq!(scene.get("layout"), None);
    assert_eq!(scene.layer("img").unwrap().get("opacity"), None);
    assert_eq!(
        scene.layer("segmentation").unwrap().source(),
        Some(json!("precomputed://gs://b/seg"))
    );
}

#[test]
fn test_drop_layer_when_remote_record_already_removed() {
    let (mut scene, memory, _viewer) = linked_scene();

    let mut document = memory.document();
    document["layers"].as_array_mut().unwrap().remove(0);
    memory.set_document(document);

    let dropped = scene.drop_layer("img").unwrap();
    assert_eq!(dropped.link_state(), LinkState::Detached);
    assert_eq!(scene.len(), 1);
    assert_eq!(memory.record_names(), vec!["segmentation"]);
}

#[test]
fn test_scene_link_conflict_leaves_everything_detached() {
    let memory = Rc::new(MemoryViewer::with_document(json!({
        "layers": [{"name": "segmentation", "type": "segmentation", "source": "x"}]
    })));
    let viewer: Rc<dyn Viewer> = memory.clone();

    let mut scene = Scene::new().unwrap();
    scene
        .add_layers([
            Layer::image("precomputed://gs://b/img").unwrap(),
            Layer::segmentation("precomputed://gs://b/seg").unwrap(),
        ])
        .unwrap();

    let err = scene.link(&viewer).unwrap_err();
    assert!(matches!(
        err,
        SceneError::Sync(SyncError::Conflict { ref name, count: 1 }) if name == "segmentation"
    ));
    assert_eq!(scene.link_state(), LinkState::Detached);
    for layer in scene.layers().iter() {
        assert_eq!(layer.link_state(), LinkState::Detached);
    }
    assert_eq!(memory.record_names(), vec!["segmentation"]);

    // Once the clashing record is gone the same scene links cleanly
    memory.set_document(json!({"layers": []}));
    scene.link(&viewer).unwrap();
    assert_eq!(scene.link_state(), LinkState::Linked);
    assert_eq!(memory.record_names(), vec!["img", "segmentation"]);
}

#[test]
fn test_add_layers_conflict_keeps_scene_unchanged() {
    let (mut scene, memory, _viewer) = linked_scene();

    let mut document = memory.document();
    document["layers"]
        .as_array_mut()
        .unwrap()
        .push(json!({"name": "meshes", "type": "mesh", "source": "vtk://elsewhere"}));
    memory.set_document(document);

    let err = scene.add_layers([Layer::mesh("vtk://m").unwrap()]).unwrap_err();
    assert!(matches!(
        err,
        SceneError::Sync(SyncError::Conflict { ref name, .. }) if name == "meshes"
    ));
    assert_eq!(scene.len(), 2);
    assert!(scene.layer("meshes").is_err());
    assert_eq!(memory.record_names(), vec!["img", "segmentation", "meshes"]);
}

#[test]
fn test_layer_added_in_nested_bulk_waits_for_outermost_exit() {
    let (mut scene, memory, _viewer) = linked_scene();

    scene
        .bulk_update(|outer| {
            outer.bulk_update(|inner| inner.add_layers([Layer::mesh("vtk://m")?]).map(|_| ()))?;

            let commits = memory.commit_count();
            outer.layer_mut("meshes")?.set("visible", false)?;
            assert_eq!(memory.commit_count(), commits);
            assert_eq!(outer.layer("meshes")?.link_state(), LinkState::Locked);
            Ok(())
        })
        .unwrap();

    assert_eq!(scene.layer("meshes").unwrap().link_state(), LinkState::Linked);
    assert_eq!(memory.record("meshes").unwrap()["visible"], json!(false));
}
