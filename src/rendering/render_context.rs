use glam::DMat4;

use crate::{
    layer::ShapeId,
    math::{
        bounds::{Aabb, BatchBounds, Sector},
        frustum::Frustum,
        globe::{Globe, Wgs84Globe},
    },
    picking::{IdAllocator, PickedObject},
    rendering::{
        backend::{CacheKey, CacheKeyGenerator},
        config::RenderConfig,
        draw_state::{DrawState, DrawStatePool},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// Values that change every frame.
#[derive(Debug, Clone)]
pub struct FrameParams {
    pub view_projection: DMat4,
    pub viewport: Viewport,
    pub pick_mode: bool,
    /// Region of the globe currently in view; tested against surface shapes.
    pub visible_sector: Sector,
    pub frustum_culling: bool,
}

impl FrameParams {
    pub fn new(view_projection: DMat4, viewport: Viewport) -> Self {
        Self {
            view_projection,
            viewport,
            pick_mode: false,
            visible_sector: Sector::FULL_SPHERE,
            frustum_culling: true,
        }
    }
}

impl Default for FrameParams {
    /// Everything visible, no culling.
    fn default() -> Self {
        Self {
            view_projection: DMat4::IDENTITY,
            viewport: Viewport::new(1, 1),
            pick_mode: false,
            visible_sector: Sector::FULL_SPHERE,
            frustum_culling: false,
        }
    }
}

/// State shared by every layer drawn through one graphics backend.
///
/// Persistent parts (cache keys, draw-state pool, pick IDs) live for the
/// lifetime of the context; the [`FrameParams`] are replaced in
/// [`RenderContext::begin_frame`].
pub struct RenderContext {
    config: RenderConfig,
    globe: Box<dyn Globe>,
    cache_keys: CacheKeyGenerator,
    draw_states: DrawStatePool,
    pick_ids: IdAllocator<ShapeId>,
    picked_objects: Vec<PickedObject>,
    frame: FrameParams,
    frustum: Option<Frustum>,
    frame_index: u64,
    layer_opacity: f32,
}

impl RenderContext {
    pub fn new(config: RenderConfig) -> Self {
        Self::with_globe(config, Box::new(Wgs84Globe))
    }

    pub fn with_globe(config: RenderConfig, globe: Box<dyn Globe>) -> Self {
        let pick_ids = IdAllocator::new(config.pick_id_space);

        Self {
            config,
            globe,
            cache_keys: CacheKeyGenerator::new(),
            draw_states: DrawStatePool::new(),
            pick_ids,
            picked_objects: Vec::new(),
            frame: FrameParams::default(),
            frustum: None,
            frame_index: 0,
            layer_opacity: 1.0,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn globe(&self) -> &dyn Globe {
        self.globe.as_ref()
    }

    pub fn begin_frame(&mut self, frame: FrameParams) {
        self.frustum = frame
            .frustum_culling
            .then(|| Frustum::from_view_projection(frame.view_projection));
        self.frame = frame;
        self.frame_index += 1;
        self.picked_objects.clear();
        self.layer_opacity = 1.0;

        self.pick_ids.advance_age();
        if self.config.pick_id_reclaim_interval > 0
            && self.frame_index % self.config.pick_id_reclaim_interval == 0
        {
            let reclaimed = self.pick_ids.reclaim_older_than(self.config.pick_id_max_age);
            if !reclaimed.is_empty() {
                log::debug!("Reclaimed {} idle pick IDs", reclaimed.len());
            }
        }
    }

    pub fn end_frame(&mut self) {
        let outstanding = self.draw_states.outstanding();
        if outstanding > 0 {
            log::warn!(
                "{} draw states still acquired at end of frame {}",
                outstanding,
                self.frame_index
            );
        }
    }

    pub fn frame(&self) -> &FrameParams {
        &self.frame
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn pick_mode(&self) -> bool {
        self.frame.pick_mode
    }

    pub fn layer_opacity(&self) -> f32 {
        self.layer_opacity
    }

    pub fn set_layer_opacity(&mut self, opacity: f32) {
        self.layer_opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn next_cache_key(&mut self) -> CacheKey {
        self.cache_keys.next_key()
    }

    pub fn acquire_draw_state(&mut self) -> DrawState {
        self.draw_states.acquire()
    }

    pub fn release_draw_state(&mut self, state: DrawState) {
        self.draw_states.release(state);
    }

    pub fn draw_states(&self) -> &DrawStatePool {
        &self.draw_states
    }

    /// Returns the pick ID for `shape`, allocating one if needed.
    ///
    /// When the space is exhausted the least recently used ID that was not
    /// requested this frame is taken over. `None` means every ID is in use by
    /// shapes drawn this frame.
    pub fn acquire_pick_id(&mut self, shape: ShapeId) -> Option<u32> {
        if let Some(id) = self.pick_ids.allocate(&shape) {
            return Some(id);
        }

        if let Some((evicted, id)) = self.pick_ids.evict_oldest() {
            log::debug!("Pick ID {} taken from idle shape {:?}", id, evicted);
            return self.pick_ids.allocate(&shape);
        }

        log::warn!(
            "Pick ID space of {} exhausted; {:?} will not be pickable this frame",
            self.pick_ids.id_space(),
            shape
        );
        None
    }

    pub fn release_pick_id(&mut self, shape: ShapeId) -> Option<u32> {
        self.pick_ids.release(&shape)
    }

    pub fn resolve_pick(&self, pick_id: u32) -> Option<ShapeId> {
        self.pick_ids.resolve(pick_id).copied()
    }

    pub fn pick_ids(&self) -> &IdAllocator<ShapeId> {
        &self.pick_ids
    }

    pub fn offer_picked_object(&mut self, object: PickedObject) {
        self.picked_objects.push(object);
    }

    pub fn picked_objects(&self) -> &[PickedObject] {
        &self.picked_objects
    }

    pub fn intersects_frustum(&self, aabb: &Aabb) -> bool {
        match &self.frustum {
            Some(frustum) => aabb.intersects_frustum(frustum),
            None => true,
        }
    }

    pub fn intersects_sector(&self, sector: &Sector) -> bool {
        self.frame.visible_sector.intersects(sector)
    }

    pub fn is_visible(&self, bounds: &BatchBounds) -> bool {
        match bounds {
            BatchBounds::Empty => false,
            BatchBounds::Cartesian(aabb) => self.intersects_frustum(aabb),
            BatchBounds::Geographic(sector) => self.intersects_sector(sector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_culling_disabled_by_default() {
        let mut rc = RenderContext::new(RenderConfig::default());
        rc.begin_frame(FrameParams::default());

        let far = Aabb::new(DVec3::splat(1.0e7), DVec3::splat(1.0e7 + 1.0));
        assert!(rc.is_visible(&BatchBounds::Cartesian(far)));
        assert!(!rc.is_visible(&BatchBounds::Empty));
    }

    #[test]
    fn test_sector_visibility() {
        let mut rc = RenderContext::new(RenderConfig::default());
        let mut frame = FrameParams::default();
        frame.visible_sector = Sector::new(0.0, 10.0, 0.0, 10.0);
        rc.begin_frame(frame);

        let inside = Sector::new(2.0, 3.0, 2.0, 3.0);
        let outside = Sector::new(20.0, 30.0, 20.0, 30.0);
        assert!(rc.is_visible(&BatchBounds::Geographic(inside)));
        assert!(!rc.is_visible(&BatchBounds::Geographic(outside)));
    }

    #[test]
    fn test_cache_keys_are_per_context() {
        let mut a = RenderContext::new(RenderConfig::default());
        let mut b = RenderContext::new(RenderConfig::default());

        assert_eq!(a.next_cache_key(), b.next_cache_key());
        assert_ne!(a.next_cache_key(), a.next_cache_key());
    }
}
