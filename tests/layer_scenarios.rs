use pathbatch::{
    math::{color::Color, geo::Position},
    rendering::backend::RecordingBackend,
    shapes::{AltitudeMode, Path, ShapeAttributes},
    BatchState, FrameParams, PathLayer, RenderConfig, RenderContext, ShapeId,
};

fn route(lat: f64, lon: f64) -> Path {
    Path::new(vec![
        Position::new(lat, lon, 10_000.0),
        Position::new(lat + 2.0, lon + 8.0, 10_000.0),
        Position::new(lat + 3.0, lon + 15.0, 10_000.0),
    ])
    .with_name(format!("{lat}/{lon}"))
}

fn draw_frame(rc: &mut RenderContext, layer: &mut PathLayer, backend: &mut RecordingBackend) {
    rc.begin_frame(FrameParams::default());
    layer.render(rc, backend);
    rc.end_frame();
}

fn pick_frame(rc: &mut RenderContext, layer: &mut PathLayer, backend: &mut RecordingBackend) {
    rc.begin_frame(FrameParams {
        pick_mode: true,
        ..FrameParams::default()
    });
    layer.render(rc, backend);
    rc.end_frame();
}

#[test]
fn routes_fill_batches_and_reuse_freed_slots() {
    let config = RenderConfig {
        batch_capacity: 4,
        ..RenderConfig::default()
    };
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    let ids: Vec<ShapeId> = (0..10)
        .map(|i| layer.add_shape(route(i as f64, 0.0)))
        .collect();
    draw_frame(&mut rc, &mut layer, &mut backend);

    let stats = layer.stats(&rc);
    assert_eq!(stats.batched, 10);
    assert_eq!(stats.groups, 1);
    assert_eq!(stats.batches, 3);
    assert_eq!(backend.draws().len(), 3);

    // A slot freed in the first batch is the first one filled again
    let first = layer.registry().location_of(ids[1]).unwrap();
    layer.remove_shape(ids[1], &mut rc).unwrap();
    let replacement = layer.add_shape(route(20.0, 0.0));
    draw_frame(&mut rc, &mut layer, &mut backend);

    assert_eq!(layer.registry().location_of(replacement), Some(first));
    assert_eq!(layer.stats(&rc).batches, 3);
}

#[test]
fn highlight_moves_a_route_between_groups_and_back() {
    let config = RenderConfig::default();
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    let plain = layer.add_shape(route(0.0, 0.0));
    let mut path = route(5.0, 0.0);
    path.set_highlight_attributes(Some(
        ShapeAttributes::default().with_color(Color::RED).with_width(4.0),
    ));
    let highlighted = layer.add_shape(path);
    draw_frame(&mut rc, &mut layer, &mut backend);
    assert_eq!(layer.stats(&rc).groups, 1);

    layer.path_mut(highlighted).unwrap().set_highlighted(true);
    draw_frame(&mut rc, &mut layer, &mut backend);

    let stats = layer.stats(&rc);
    assert_eq!(stats.groups, 2);
    assert_eq!(stats.batched, 2);
    assert_ne!(
        layer.registry().group_key_of(plain),
        layer.registry().group_key_of(highlighted)
    );

    layer.path_mut(highlighted).unwrap().set_highlighted(false);
    draw_frame(&mut rc, &mut layer, &mut backend);

    // The highlight group is emptied and dropped
    assert_eq!(layer.stats(&rc).groups, 1);
    assert_eq!(
        layer.registry().location_of(plain),
        layer.registry().location_of(highlighted)
    );
}

#[test]
fn surface_and_absolute_routes_never_share_a_batch() {
    let config = RenderConfig::default();
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    let air = layer.add_shape(route(0.0, 0.0));
    let mut track = route(0.0, 0.0);
    track.set_altitude_mode(AltitudeMode::ClampToGround);
    let ground = layer.add_shape(track);
    draw_frame(&mut rc, &mut layer, &mut backend);

    assert_ne!(
        layer.registry().location_of(air),
        layer.registry().location_of(ground)
    );
    assert_eq!(backend.draws().len(), 2);
}

#[test]
fn failed_draws_are_isolated_and_recovered() {
    let config = RenderConfig::default();
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    layer.add_shape(route(0.0, 0.0));
    let blue = ShapeAttributes::default().with_color(Color::BLUE);
    layer.add_shape(route(1.0, 0.0).with_attributes(blue));

    backend.set_fail_programs(true);
    draw_frame(&mut rc, &mut layer, &mut backend);

    let stats = layer.stats(&rc);
    assert_eq!(stats.batches_failed, 2);
    assert_eq!(stats.batches_drawn, 0);
    assert!(backend.draws().is_empty());
    assert_eq!(rc.draw_states().outstanding(), 0);

    backend.clear_failures();
    draw_frame(&mut rc, &mut layer, &mut backend);

    let stats = layer.stats(&rc);
    assert_eq!(stats.batches_failed, 0);
    assert_eq!(stats.batches_drawn, 2);
    assert_eq!(backend.draws().len(), 2);
}

#[test]
fn pick_frames_resolve_read_back_colours() {
    let config = RenderConfig::default();
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    let ids: Vec<ShapeId> = (0..3)
        .map(|i| layer.add_shape(route(i as f64 * 10.0, 0.0)))
        .collect();
    pick_frame(&mut rc, &mut layer, &mut backend);

    assert!(backend.draws().iter().all(|draw| draw.pick_mode));
    let mut resolved: Vec<ShapeId> = rc
        .picked_objects()
        .iter()
        .filter_map(|object| layer.resolve_pick(&rc, object.color))
        .collect();
    resolved.sort_by_key(|id| id.index());
    assert_eq!(resolved, ids);

    // Opacity is ignored while picking
    layer.set_opacity(0.25);
    backend.take_draws();
    pick_frame(&mut rc, &mut layer, &mut backend);
    assert!(backend
        .draws()
        .iter()
        .flat_map(|draw| draw.primitives.iter())
        .all(|primitive| primitive.opacity == 1.0));
}

#[test]
fn exhausted_pick_ids_are_handed_over_once_released() {
    let config = RenderConfig {
        pick_id_space: 2,
        ..RenderConfig::default()
    };
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    let a = layer.add_shape(route(0.0, 0.0));
    let b = layer.add_shape(route(10.0, 0.0));
    let c = layer.add_shape(route(20.0, 0.0));
    pick_frame(&mut rc, &mut layer, &mut backend);

    // Every ID is in use by a shape drawn this frame
    assert_eq!(rc.picked_objects().len(), 2);
    assert_eq!(layer.path(c).unwrap().pick_id(), None);
    assert_eq!(layer.stats(&rc).batched, 3);

    layer.remove_shape(a, &mut rc).unwrap();
    pick_frame(&mut rc, &mut layer, &mut backend);

    assert_eq!(rc.picked_objects().len(), 2);
    let picked_c = layer.path(c).unwrap().pick_id().unwrap();
    let color = pathbatch::picking::pick_color::encode(picked_c);
    assert_eq!(layer.resolve_pick(&rc, color), Some(c));
    assert!(layer.path(b).unwrap().pick_id().is_some());
}

#[test]
fn disabled_layer_draws_nothing() {
    let config = RenderConfig::default();
    let mut rc = RenderContext::new(config.clone());
    let mut backend = RecordingBackend::new();
    let mut layer = PathLayer::new("routes", &config);

    let id = layer.add_shape(route(0.0, 0.0));
    layer.set_enabled(false);
    draw_frame(&mut rc, &mut layer, &mut backend);

    assert!(backend.draws().is_empty());
    assert_eq!(layer.state_of(id), Some(BatchState::Unbatched));

    layer.set_enabled(true);
    draw_frame(&mut rc, &mut layer, &mut backend);
    assert_eq!(backend.draws().len(), 1);
}
