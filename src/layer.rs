//! A layer of path shapes and the per-frame batching decisions for them.
//!
//! Every frame each shape is asked whether it can be batched. Batchable shapes
//! are snapshotted into the layer's [`BatchRegistry`] and follow their
//! attribute group as it changes; the rest are drawn on their own. Individual
//! shapes are always drawn before any batch, in the order they were added.

use id_arena::{Arena, Id};

use crate::{
    picking::pick_color,
    rendering::{
        backend::GraphicsBackend,
        batching::{AttributeGroupKey, BatchRegistry, RenderSummary},
        config::RenderConfig,
        render_context::RenderContext,
    },
    shapes::{Path, Renderable},
};

pub type ShapeId = Id<LayerShape>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Drawn on its own, or not at all when disabled.
    Unbatched,
    /// Batchable under `key`, waiting to be placed or moved there.
    BatchPending { key: AttributeGroupKey },
    Batched { key: AttributeGroupKey },
}

pub struct LayerShape {
    // None once removed from the layer
    shape: Option<Box<dyn Renderable>>,
    state: BatchState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerStats {
    pub shapes: usize,
    pub unbatched: usize,
    pub pending: usize,
    pub batched: usize,
    pub groups: usize,
    pub batches: usize,
    pub empty_batches: usize,
    pub batched_rows: usize,
    pub live_pick_ids: usize,
    pub batches_drawn: usize,
    pub batches_failed: usize,
    pub shapes_failed: usize,
}

pub struct PathLayer {
    pub name: String,
    shapes: Arena<LayerShape>,
    order: Vec<ShapeId>,
    registry: BatchRegistry<ShapeId>,
    max_empty_batches_per_group: usize,
    enabled: bool,
    opacity: f32,
    last_summary: RenderSummary,
    shapes_failed: usize,
}

impl PathLayer {
    pub fn new(name: impl Into<String>, config: &RenderConfig) -> Self {
        Self {
            name: name.into(),
            shapes: Arena::new(),
            order: Vec::new(),
            registry: BatchRegistry::new(config.batch_capacity),
            max_empty_batches_per_group: config.max_empty_batches_per_group,
            enabled: true,
            opacity: 1.0,
            last_summary: RenderSummary::default(),
            shapes_failed: 0,
        }
    }

    pub fn add_shape<S: Renderable>(&mut self, shape: S) -> ShapeId {
        let id = self.shapes.alloc(LayerShape {
            shape: Some(Box::new(shape)),
            state: BatchState::Unbatched,
        });
        self.order.push(id);
        id
    }

    /// Takes the shape out of the layer, its batch and the pick-ID space.
    ///
    /// The arena slot stays behind empty and its ID is never handed out
    /// again, so a pick colour read back after removal cannot resolve to a
    /// later shape. Each removal leaves one `LayerShape` of a few bytes.
    pub fn remove_shape(
        &mut self,
        id: ShapeId,
        rc: &mut RenderContext,
    ) -> Option<Box<dyn Renderable>> {
        let slot = self.shapes.get_mut(id)?;
        let shape = slot.shape.take()?;
        slot.state = BatchState::Unbatched;

        self.registry.remove(id);
        rc.release_pick_id(id);
        self.order.retain(|other| *other != id);

        Some(shape)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&dyn Renderable> {
        self.shapes.get(id)?.shape.as_deref()
    }

    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut dyn Renderable> {
        match self.shapes.get_mut(id)?.shape.as_mut() {
            Some(shape) => Some(shape.as_mut()),
            None => None,
        }
    }

    pub fn path(&self, id: ShapeId) -> Option<&Path> {
        self.shape(id)?.as_any().downcast_ref::<Path>()
    }

    pub fn path_mut(&mut self, id: ShapeId) -> Option<&mut Path> {
        self.shape_mut(id)?.as_any_mut().downcast_mut::<Path>()
    }

    pub fn shape_ids(&self) -> &[ShapeId] {
        &self.order
    }

    pub fn state_of(&self, id: ShapeId) -> Option<BatchState> {
        let slot = self.shapes.get(id)?;
        slot.shape.as_ref().map(|_| slot.state)
    }

    pub fn registry(&self) -> &BatchRegistry<ShapeId> {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Drops every batch; shapes are placed again on the next frame.
    pub fn clear(&mut self) {
        self.registry.clear();
        for (_, slot) in self.shapes.iter_mut() {
            slot.state = BatchState::Unbatched;
        }
    }

    /// Maps a colour read back from a pick frame to the shape drawn with it.
    pub fn resolve_pick(&self, rc: &RenderContext, color: u32) -> Option<ShapeId> {
        let id = rc.resolve_pick(pick_color::decode(color)?)?;
        self.state_of(id).map(|_| id)
    }

    pub fn render(&mut self, rc: &mut RenderContext, backend: &mut dyn GraphicsBackend) {
        if !self.enabled {
            return;
        }

        rc.set_layer_opacity(self.opacity);
        self.update_states(rc);
        self.place_pending();

        self.shapes_failed = 0;
        for &id in &self.order {
            let Some(slot) = self.shapes.get_mut(id) else {
                continue;
            };
            if slot.state != BatchState::Unbatched {
                continue;
            }
            let Some(shape) = slot.shape.as_mut() else {
                continue;
            };
            if !shape.is_enabled() {
                continue;
            }

            if let Err(err) = shape.render(rc, backend) {
                self.shapes_failed += 1;
                log::error!(
                    "Failed to render shape '{}' in layer '{}': {}",
                    shape.display_name(),
                    self.name,
                    err
                );
            }
        }

        self.last_summary = self.registry.render_all(rc, backend);
        self.registry
            .prune_empty_batches(self.max_empty_batches_per_group);
    }

    fn update_states(&mut self, rc: &mut RenderContext) {
        let pick_mode = rc.pick_mode();

        for &id in &self.order {
            let Some(slot) = self.shapes.get_mut(id) else {
                continue;
            };
            let Some(shape) = slot.shape.as_mut() else {
                continue;
            };

            if !shape.is_enabled() {
                // Hidden shapes are not drawn, so they must not pin a pick ID
                if rc.release_pick_id(id).is_some() {
                    shape.set_pick_id(None);
                }
            } else if pick_mode {
                shape.set_pick_id(rc.acquire_pick_id(id));
            }

            shape.update_attributes(rc);
            let batchable = shape.is_enabled() && shape.can_be_batched(rc);

            slot.state = match (slot.state, batchable) {
                (BatchState::Unbatched, true) => BatchState::BatchPending {
                    key: shape.group_key(),
                },
                (BatchState::Batched { key }, true) | (BatchState::BatchPending { key }, true) => {
                    if let Some(entry) = self.registry.entry_mut(id) {
                        shape.sync_entry(entry);
                    }

                    let current = shape.group_key();
                    if current == key && self.registry.contains(id) {
                        BatchState::Batched { key }
                    } else {
                        BatchState::BatchPending { key: current }
                    }
                }
                (BatchState::Batched { .. }, false) | (BatchState::BatchPending { .. }, false) => {
                    log::debug!("'{}' can no longer be batched", shape.display_name());
                    self.registry.remove(id);
                    BatchState::Unbatched
                }
                (BatchState::Unbatched, false) => BatchState::Unbatched,
            };
        }
    }

    fn place_pending(&mut self) {
        for &id in &self.order {
            let Some(slot) = self.shapes.get_mut(id) else {
                continue;
            };
            let BatchState::BatchPending { key } = slot.state else {
                continue;
            };
            let Some(shape) = slot.shape.as_mut() else {
                continue;
            };

            let result = if self.registry.contains(id) {
                self.registry.regroup(id, key).map(|_| ())
            } else {
                self.registry.place(shape.snapshot_entry(id), key).map(|_| ())
            };

            match result {
                Ok(()) => slot.state = BatchState::Batched { key },
                Err(err) => {
                    log::error!("Failed to place '{}': {}", shape.display_name(), err);
                    self.registry.remove(id);
                    slot.state = BatchState::Unbatched;
                }
            }
        }
    }

    pub fn stats(&self, rc: &RenderContext) -> LayerStats {
        let mut stats = LayerStats {
            groups: self.registry.group_count(),
            batches: self.registry.batch_count(),
            empty_batches: self.registry.empty_batch_count(),
            batched_rows: self.registry.row_count(),
            live_pick_ids: rc.pick_ids().len(),
            batches_drawn: self.last_summary.drawn,
            batches_failed: self.last_summary.failed,
            shapes_failed: self.shapes_failed,
            ..LayerStats::default()
        };

        for &id in &self.order {
            let Some(state) = self.state_of(id) else {
                continue;
            };

            stats.shapes += 1;
            match state {
                BatchState::Unbatched => stats.unbatched += 1,
                BatchState::BatchPending { .. } => stats.pending += 1,
                BatchState::Batched { .. } => stats.batched += 1,
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::{
        error::{RenderError, RenderResult},
        math::{color::Color, geo::Position},
        picking::PickedObject,
        rendering::{
            backend::RecordingBackend,
            batching::PathEntry,
            render_context::FrameParams,
        },
        shapes::ShapeAttributes,
    };

    fn config(capacity: usize) -> RenderConfig {
        RenderConfig {
            batch_capacity: capacity,
            ..RenderConfig::default()
        }
    }

    fn route(lat: f64) -> Path {
        Path::new(vec![
            Position::new(lat, 0.0, 1000.0),
            Position::new(lat + 1.0, 5.0, 1000.0),
        ])
        .with_name(format!("route {lat}"))
    }

    fn frame(rc: &mut RenderContext, layer: &mut PathLayer, backend: &mut RecordingBackend) {
        rc.begin_frame(FrameParams::default());
        layer.render(rc, backend);
        rc.end_frame();
    }

    /// Draws nothing and fails every individual render.
    struct Broken;

    impl Renderable for Broken {
        fn display_name(&self) -> &str {
            "broken"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn can_be_batched(&self, _rc: &RenderContext) -> bool {
            false
        }

        fn update_attributes(&mut self, _rc: &RenderContext) {}

        fn group_key(&self) -> AttributeGroupKey {
            AttributeGroupKey::new(&ShapeAttributes::default(), false, false)
        }

        fn snapshot_entry(&mut self, key: ShapeId) -> PathEntry<ShapeId> {
            PathEntry::new(key, Vec::new(), Default::default(), 0, Color::WHITE, 1.0)
        }

        fn sync_entry(&mut self, _entry: &mut PathEntry<ShapeId>) {}

        fn set_pick_id(&mut self, _pick_id: Option<u32>) {}

        fn render(
            &mut self,
            _rc: &mut RenderContext,
            _backend: &mut dyn GraphicsBackend,
        ) -> RenderResult<()> {
            Err(RenderError::geometry("always broken"))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_equal_paths_share_one_draw() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let ids: Vec<ShapeId> = (0..5).map(|i| layer.add_shape(route(i as f64))).collect();
        frame(&mut rc, &mut layer, &mut backend);

        assert_eq!(backend.draws().len(), 1);
        assert_eq!(layer.registry().batch_count(), 1);
        for id in ids {
            assert!(matches!(layer.state_of(id), Some(BatchState::Batched { .. })));
        }
        assert_eq!(rc.draw_states().outstanding(), 0);
    }

    #[test]
    fn test_attribute_change_regroups() {
        let config = config(2);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let a = layer.add_shape(route(0.0));
        let b = layer.add_shape(route(10.0));
        frame(&mut rc, &mut layer, &mut backend);

        let original = layer.registry().location_of(a).unwrap();
        assert_eq!(layer.registry().location_of(b), Some(original));
        assert!(layer.registry().batch(original).unwrap().is_full());

        layer
            .path_mut(b)
            .unwrap()
            .set_attributes(ShapeAttributes::default().with_color(Color::RED));
        frame(&mut rc, &mut layer, &mut backend);

        assert_ne!(layer.registry().location_of(a), layer.registry().location_of(b));
        let batch_a = layer.registry().batch_of(a).unwrap();
        assert!(!batch_a.is_full());
        assert_eq!(layer.stats(&rc).groups, 2);
        assert_eq!(backend.draws().len(), 1 + 2);
    }

    #[test]
    fn test_unbatchable_shape_falls_back_and_draws_first() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        layer.add_shape(route(0.0));
        let solo = layer.add_shape(route(5.0));
        frame(&mut rc, &mut layer, &mut backend);
        assert_eq!(layer.registry().path_count(), 2);

        layer.path_mut(solo).unwrap().set_always_individual(true);
        backend.take_draws();
        frame(&mut rc, &mut layer, &mut backend);

        assert_eq!(layer.state_of(solo), Some(BatchState::Unbatched));
        assert_eq!(layer.registry().path_count(), 1);

        let draws = backend.draws();
        assert_eq!(draws.len(), 2);
        // The individual draw comes first
        let solo_origin = rc
            .globe()
            .geographic_to_cartesian(&Position::new(5.0, 0.0, 1000.0));
        assert_eq!(draws[0].local_origin, solo_origin);
        assert_eq!(draws[0].index_count(), draws[1].index_count());
    }

    #[test]
    fn test_disabled_shape_leaves_its_batch() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let id = layer.add_shape(route(0.0));
        frame(&mut rc, &mut layer, &mut backend);

        layer.path_mut(id).unwrap().set_enabled(false);
        backend.take_draws();
        frame(&mut rc, &mut layer, &mut backend);

        assert_eq!(layer.state_of(id), Some(BatchState::Unbatched));
        assert!(!layer.registry().contains(id));
        assert!(backend.draws().is_empty());
    }

    #[test]
    fn test_shape_failure_does_not_stop_the_frame() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        layer.add_shape(Broken);
        layer.add_shape(route(0.0));
        frame(&mut rc, &mut layer, &mut backend);

        let stats = layer.stats(&rc);
        assert_eq!(stats.shapes_failed, 1);
        assert_eq!(stats.batches_drawn, 1);
        assert_eq!(backend.draws().len(), 1);
    }

    #[test]
    fn test_pick_frame_resolves_shapes() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let a = layer.add_shape(route(0.0));
        let b = layer.add_shape(route(10.0));

        rc.begin_frame(FrameParams {
            pick_mode: true,
            ..FrameParams::default()
        });
        layer.render(&mut rc, &mut backend);
        rc.end_frame();

        assert_eq!(rc.picked_objects().len(), 2);
        for object in rc.picked_objects() {
            let id = layer.resolve_pick(&rc, object.color).unwrap();
            assert!(id == a || id == b);
        }
        assert_eq!(layer.resolve_pick(&rc, pick_color::NO_OBJECT), None);

        layer.remove_shape(a, &mut rc).unwrap();
        assert_eq!(rc.pick_ids().len(), 1);
        assert!(layer.state_of(a).is_none());
        assert!(!layer.registry().contains(a));
    }

    #[test]
    fn test_disabled_shape_frees_its_pick_id() {
        let config = RenderConfig {
            pick_id_space: 1,
            ..RenderConfig::default()
        };
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);
        let pick = FrameParams {
            pick_mode: true,
            ..FrameParams::default()
        };

        let first = layer.add_shape(route(0.0));
        rc.begin_frame(pick.clone());
        layer.render(&mut rc, &mut backend);
        rc.end_frame();
        assert_eq!(layer.path(first).unwrap().pick_id(), Some(0));

        let second = layer.add_shape(route(10.0));
        layer.path_mut(first).unwrap().set_enabled(false);
        for _ in 0..3 {
            rc.begin_frame(pick.clone());
            layer.render(&mut rc, &mut backend);
            rc.end_frame();
        }

        assert_eq!(layer.path(first).unwrap().pick_id(), None);
        assert_eq!(layer.path(second).unwrap().pick_id(), Some(0));
        assert_eq!(rc.picked_objects(), &[PickedObject::new(0)]);
        assert_eq!(layer.resolve_pick(&rc, pick_color::encode(0)), Some(second));
    }

    #[test]
    fn test_hidden_shape_never_takes_a_pick_id() {
        let config = RenderConfig {
            pick_id_space: 1,
            ..RenderConfig::default()
        };
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let mut hidden = route(0.0);
        hidden.set_enabled(false);
        let hidden = layer.add_shape(hidden);
        let visible = layer.add_shape(route(10.0));

        rc.begin_frame(FrameParams {
            pick_mode: true,
            ..FrameParams::default()
        });
        layer.render(&mut rc, &mut backend);
        rc.end_frame();

        assert_eq!(layer.path(hidden).unwrap().pick_id(), None);
        assert_eq!(layer.path(visible).unwrap().pick_id(), Some(0));
        assert_eq!(rc.picked_objects().len(), 1);
    }

    #[test]
    fn test_removed_id_is_never_reused() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let removed = layer.add_shape(route(0.0));
        rc.begin_frame(FrameParams {
            pick_mode: true,
            ..FrameParams::default()
        });
        layer.render(&mut rc, &mut backend);
        rc.end_frame();
        let stale_color = pick_color::encode(layer.path(removed).unwrap().pick_id().unwrap());

        assert!(layer.remove_shape(removed, &mut rc).is_some());
        assert!(layer.remove_shape(removed, &mut rc).is_none());

        let added = layer.add_shape(route(1.0));
        assert_ne!(added, removed);
        assert!(layer.state_of(removed).is_none());
        assert_eq!(layer.shape_ids(), &[added]);
        assert_eq!(layer.resolve_pick(&rc, stale_color), None);
    }

    #[test]
    fn test_empty_batches_are_pruned_after_removal() {
        let config = RenderConfig {
            batch_capacity: 1,
            max_empty_batches_per_group: 1,
            ..RenderConfig::default()
        };
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let ids: Vec<ShapeId> = (0..4).map(|i| layer.add_shape(route(i as f64))).collect();
        frame(&mut rc, &mut layer, &mut backend);
        assert_eq!(layer.registry().batch_count(), 4);

        for id in &ids[1..] {
            layer.remove_shape(*id, &mut rc);
        }
        frame(&mut rc, &mut layer, &mut backend);

        let stats = layer.stats(&rc);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.empty_batches, 1);
        assert_eq!(stats.batched, 1);
    }

    #[test]
    fn test_clear_rebatches_on_next_frame() {
        let config = config(16);
        let mut rc = RenderContext::new(config.clone());
        let mut backend = RecordingBackend::new();
        let mut layer = PathLayer::new("routes", &config);

        let id = layer.add_shape(route(0.0));
        frame(&mut rc, &mut layer, &mut backend);

        layer.clear();
        assert_eq!(layer.state_of(id), Some(BatchState::Unbatched));
        assert_eq!(layer.registry().batch_count(), 0);

        frame(&mut rc, &mut layer, &mut backend);
        assert!(matches!(layer.state_of(id), Some(BatchState::Batched { .. })));
    }
}
