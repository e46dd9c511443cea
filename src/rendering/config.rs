use crate::picking::PICK_ID_SPACE;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Maximum number of paths sharing one line batch.
    pub batch_capacity: usize,
    /// Size of the pick-ID space; IDs are drawn from `[0, pick_id_space)`.
    pub pick_id_space: u32,
    /// Angular separation (radians) below which a segment gets no intermediate points.
    pub near_zero_threshold: f64,
    /// Frames a pick ID may go unused before it is reclaimed.
    pub pick_id_max_age: u64,
    /// Frames between two reclamation passes.
    pub pick_id_reclaim_interval: u64,
    /// Empty batches kept per attribute group for reuse.
    pub max_empty_batches_per_group: usize,
    /// Frames an unused GPU buffer survives in the backend cache.
    pub buffer_eviction_age: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_capacity: 256,
            pick_id_space: PICK_ID_SPACE,
            near_zero_threshold: 1.0e-10,
            pick_id_max_age: 600,
            pick_id_reclaim_interval: 60,
            max_empty_batches_per_group: 1,
            buffer_eviction_age: 120,
        }
    }
}
