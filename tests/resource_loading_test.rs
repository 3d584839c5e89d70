use std::rc::Rc;

use vibe_ngin::{
    EngineError,
    data_structures::model::VertexLayout,
    resources::{MemorySource, ModelKey, ResourceManager},
};

use crate::common::test_utils::CountingSource;

mod common;

#[tokio::test]
async fn colored_load_uses_vt_as_vertex_color() {
    let manager = ResourceManager::new(CountingSource::triangle());
    let model = manager.load_model("models/triangle.obj").await.unwrap();

    assert_eq!(model.mesh.layout, VertexLayout::PositionColor);
    assert_eq!(model.mesh.vertex_count, 3);
    assert_eq!(
        model.mesh.vertices,
        vec![
            -0.5, -0.5, 0.0, 1.0, 0.0, 0.0, //
            0.5, -0.5, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.5, 0.0, 0.0, 0.0, 1.0,
        ]
    );
    assert_eq!(model.texture_path, None);
    // the colored path never looks at the material library
    assert_eq!(manager.source().fetches("models/mtl/triangle.mtl"), 0);
}

#[tokio::test]
async fn textured_load_resolves_parent_relative_diffuse_map() {
    let manager = ResourceManager::new(CountingSource::triangle());
    let model = manager
        .load_model_with_texture("models/triangle.obj")
        .await
        .unwrap();

    assert_eq!(model.mesh.layout, VertexLayout::PositionUv);
    assert_eq!(model.mesh.vertices.len(), 15);
    assert_eq!(model.texture_path.as_deref(), Some("models/paint.png"));
    assert_eq!(manager.source().fetches("models/mtl/triangle.mtl"), 1);
}

#[tokio::test]
async fn variants_of_one_url_are_cached_separately() {
    let manager = ResourceManager::new(CountingSource::triangle());
    let plain = manager.load_model("models/triangle.obj").await.unwrap();
    let textured = manager
        .load_model_with_texture("models/triangle.obj")
        .await
        .unwrap();

    assert!(!Rc::ptr_eq(&plain, &textured));
    assert_eq!(manager.source().fetches("models/triangle.obj"), 2);

    let key = ModelKey::Textured("models/triangle.obj".into());
    assert!(Rc::ptr_eq(&manager.cached_model(&key).unwrap(), &textured));
}

#[tokio::test]
async fn repeated_loads_share_one_asset() {
    let manager = ResourceManager::new(CountingSource::triangle());
    let first = manager.load_model("models/triangle.obj").await.unwrap();
    let second = manager.load_model("models/triangle.obj").await.unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(manager.source().fetches("models/triangle.obj"), 1);
}

#[tokio::test]
async fn concurrent_loads_share_one_fetch() {
    let manager = ResourceManager::new(CountingSource::triangle());
    let (a, b) = futures::join!(
        manager.load_model("models/triangle.obj"),
        manager.load_model("models/triangle.obj"),
    );

    assert!(Rc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(manager.source().fetches("models/triangle.obj"), 1);
}

#[tokio::test]
async fn missing_material_library_only_drops_the_texture() {
    let source = MemorySource::new().with(
        "models/lonely.obj",
        "mtllib gone.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n",
    );
    let manager = ResourceManager::new(source);
    let model = manager
        .load_model_with_texture("models/lonely.obj")
        .await
        .unwrap();

    assert_eq!(model.texture_path, None);
    assert_eq!(model.mesh.vertex_count, 3);
}

#[tokio::test]
async fn failed_loads_are_retried() {
    let manager = ResourceManager::new(CountingSource::triangle());
    for _ in 0..2 {
        let err = manager.load_model("models/missing.obj").await.unwrap_err();
        assert!(matches!(err, EngineError::AssetFetch { .. }));
    }
    assert_eq!(manager.source().fetches("models/missing.obj"), 2);
    assert!(manager
        .cached_model(&ModelKey::Plain("models/missing.obj".into()))
        .is_none());
}

#[tokio::test]
async fn textures_need_a_bound_device() {
    let manager = ResourceManager::new(CountingSource::triangle());
    assert!(!manager.has_device());

    let err = manager.load_texture("models/paint.png").await.unwrap_err();
    assert_eq!(err, EngineError::ResourceNotReady("texture loading"));
    // nothing was fetched for a load that could not complete
    assert_eq!(manager.source().fetches("models/paint.png"), 0);
}
