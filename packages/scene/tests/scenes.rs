use scenelink_scene::{Layer, LayerKind, Scene, SceneContext, SceneError};
use scenelink_state::SchemaError;
use serde_json::{json, Map, Value};

const FAFB_SCENE: &str = include_str!("fixtures/fafb_scene.url");

fn every_kind() -> Scene {
    let mut scene = Scene::new().unwrap();
    scene.set("layout", "xy-3d").unwrap();
    scene
        .add_layers([
            Layer::image("precomputed://gs://neuroglancer-fafb-data/fafb_v14/fafb_v14_clahe").unwrap(),
            Layer::segmentation(json!({"url": "precomputed://gs://fafb-ffn1-20200412/segmentation"}))
                .unwrap()
                .with("segments", json!([710435991]))
                .unwrap(),
            Layer::annotation("precomputed://gs://neuroglancer-20191211_fafbv14_buhmann2019_li20190805")
                .unwrap(),
            Layer::mesh("vtk://https://storage.googleapis.com/neuroglancer-fafb-data/elmr-data/FAFB.surf.vtk.gz")
                .unwrap(),
            Layer::graphene("graphene://https://prod.flywire-daf.com/segmentation/table/fly_v31")
                .unwrap()
                .with("segments", json!(["720575940621039145"]))
                .unwrap(),
        ])
        .unwrap();
    scene
}

#[test]
fn test_empty_scene_url_starts_with_base() {
    let mut scene = Scene::new().unwrap();
    assert_eq!(scene.len(), 0);

    let base = scene.base_url().to_string();
    let url = scene.url().unwrap();
    assert!(url.starts_with(&base));
    assert!(url.contains("#!"));
}

#[test]
fn test_serialize_then_parse_preserves_every_kind() {
    let mut scene = every_kind();
    let url = scene.make_url().unwrap();

    let parsed = Scene::from_string(&url).unwrap();
    assert_eq!(parsed.as_dict(), scene.as_dict());
    assert_eq!(parsed, scene);
    assert_eq!(
        parsed.layers().iter().map(Layer::kind).collect::<Vec<_>>(),
        LayerKind::ALL.to_vec()
    );

    let from_json = Scene::from_string(&scene.to_json(true).unwrap()).unwrap();
    assert_eq!(from_json, scene);
}

#[test]
fn test_url_input_keeps_its_base() {
    let mut scene = Scene::with_context(SceneContext::new("https://example.org/ng/")).unwrap();
    let url = scene.make_url().unwrap();

    let parsed = Scene::from_string(&url).unwrap();
    assert_eq!(parsed.base_url(), "https://example.org/ng/");
}

#[test]
fn test_name_collisions_get_suffixes() {
    let mut scene = Scene::new().unwrap();
    let layer = || Layer::image("s").unwrap().with("name", "x").unwrap();

    scene.add_layers([layer()]).unwrap();
    scene.add_layers([layer()]).unwrap();
    let names = scene.add_layers([layer()]).unwrap();

    assert_eq!(names, vec!["x-3"]);
    assert_eq!(scene.layers().names(), vec!["x", "x-2", "x-3"]);
}

#[test]
fn test_layers_without_source_are_rejected() {
    let mut record = Map::new();
    record.insert("type".to_string(), json!("image"));
    record.insert("name".to_string(), json!("no-source"));

    assert!(matches!(
        Layer::from_record(record),
        Err(SceneError::Schema(SchemaError::MissingProperty { key, .. })) if key == "source"
    ));

    let mut layer = Layer::image("s").unwrap();
    assert!(layer.remove("source").is_err());
    assert_eq!(layer.source(), Some(json!("s")));
}

#[test]
fn test_numeric_segments_become_strings() {
    let layer = Layer::segmentation("s")
        .unwrap()
        .with("segments", json!([1, 2, 3]))
        .unwrap();
    assert_eq!(layer.get("segments"), Some(json!(["1", "2", "3"])));
}

#[test]
fn test_drop_layer_by_name() {
    let mut scene = Scene::new().unwrap();
    scene
        .add_layers([
            Layer::image("a").unwrap().with("name", "em").unwrap(),
            Layer::segmentation("b").unwrap(),
        ])
        .unwrap();

    let dropped = scene.drop_layer("em").unwrap();
    assert_eq!(dropped.kind(), LayerKind::Image);
    assert_eq!(scene.len(), 1);

    assert!(matches!(scene.drop_layer("em"), Err(SceneError::LayerNotFound(name)) if name == "em"));
    assert_eq!(scene.len(), 1);
}

#[test]
fn test_merge_combines_same_source_layers() {
    let mut left = Scene::new().unwrap();
    left.add_layers([
        Layer::image("img").unwrap(),
        Layer::segmentation("seg").unwrap().with("segments", json!([1, 2])).unwrap(),
    ])
    .unwrap();

    let mut right = Scene::new().unwrap();
    right
        .add_layers([
            Layer::image("img").unwrap().with("opacity", 0.5).unwrap(),
            Layer::segmentation("seg").unwrap().with("segments", json!([2, 3])).unwrap(),
            Layer::segmentation("other").unwrap().with("segments", json!([9])).unwrap(),
        ])
        .unwrap();

    let merged = &left | &right;
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.layer(0usize).unwrap().get("opacity"), Some(json!(0.5)));
    assert_eq!(merged.layer(1usize).unwrap().segments(), vec!["1", "2", "3"]);
    assert_eq!(merged.layer(2usize).unwrap().name(), "segmentation-2");

    // Inputs are untouched
    assert_eq!(left.len(), 2);
    assert_eq!(left.layer(0usize).unwrap().get("opacity"), None);
    assert_eq!(right.len(), 3);
}

#[test]
fn test_merge_never_duplicates_names() {
    let mut left = Scene::new().unwrap();
    left.add_layers([
        Layer::image("s").unwrap(),
        Layer::segmentation("t").unwrap().with("name", "em").unwrap(),
    ])
    .unwrap();

    let mut right = Scene::new().unwrap();
    right
        .add_layers([Layer::image("s").unwrap().with("name", "em").unwrap()])
        .unwrap();

    let merged = &left | &right;
    assert_eq!(merged.layers().names(), vec!["img", "em"]);
    assert_eq!(merged.layer("em").unwrap().kind(), LayerKind::Segmentation);
}

#[test]
fn test_concat_appends_copies() {
    let left = every_kind();
    let right = every_kind();

    let combined = &left + &right;
    assert_eq!(combined.len(), 10);
    assert_eq!(combined.layer(5usize).unwrap().name(), "img-2");
    assert_eq!(combined.get("layout"), Some(json!("xy-3d")));
}

#[test]
fn test_layer_merge_type_mismatch() {
    let image = Layer::image("s").unwrap();
    let mesh = Layer::mesh("s").unwrap();
    assert!(matches!(&image | &mesh, Err(SceneError::TypeMismatch { .. })));
}

#[test]
fn test_fixture_scene_parses() {
    let mut scene = Scene::from_string(FAFB_SCENE).unwrap();
    assert_eq!(scene.len(), 8);
    assert_eq!(scene.base_url(), "https://fafb-dot-neuroglancer-demo.appspot.com/");
    assert_eq!(scene.get("layout"), Some(json!("xy-3d")));

    let seg = scene.layer("fafb-ffn1-20200412").unwrap();
    assert_eq!(seg.kind(), LayerKind::Segmentation);
    assert_eq!(seg.segments(), vec!["710435991"]);

    let url = scene.make_url().unwrap();
    assert_eq!(Scene::from_string(&url).unwrap(), scene);
    assert_eq!(scene.clone(), scene);
    assert!(scene.to_string().starts_with("<Scene(3 image, 3 segmentation, 1 annotation, 1 mesh, 0 segmentation_with_graph)>"));
}

#[test]
fn test_fixture_concat_and_merge_lengths() {
    let scene = Scene::from_string(FAFB_SCENE).unwrap();
    let other = Scene::from_string(FAFB_SCENE).unwrap();

    assert_eq!((&scene + &other).len(), scene.len() + other.len());

    let unmergeable = other
        .layers()
        .iter()
        .filter(|layer| !matches!(layer.kind(), LayerKind::Image | LayerKind::Segmentation))
        .count();
    assert_eq!(unmergeable, 2);
    assert_eq!((&scene | &other).len(), scene.len() + unmergeable);
}

#[test]
fn test_scene_properties_round_trip_through_json() {
    let scene = Scene::from_string(FAFB_SCENE).unwrap();
    let value = scene.to_value();

    let Value::Object(dict) = &value else {
        panic!("Expected object");
    };
    assert_eq!(dict.get("layers").and_then(Value::as_array).map(Vec::len), Some(8));

    let again = Scene::from_value(value.clone(), SceneContext::default()).unwrap();
    assert_eq!(again.to_value(), value);
}

#[test]
fn test_malformed_layers_field() {
    assert!(matches!(
        Scene::from_string(r#"{"layers": {"name": "x"}}"#),
        Err(SceneError::Parse(_))
    ));
    assert!(matches!(Scene::from_string("[1, 2]"), Err(SceneError::Parse(_))));
}
