use std::{fmt::Debug, ops::Range};

use glam::DVec3;

use crate::{
    error::{RenderError, RenderResult},
    math::{
        bounds::{Aabb, BatchBounds, Sector},
        color::Color,
    },
    picking::{pick_color, PickedObject},
    rendering::{
        backend::{BufferUsage, CacheKey, GraphicsBackend, ProgramKind, TextureHandle},
        batching::{
            group_key::AttributeGroupKey,
            path_entry::{DirtyFlags, PathEntry},
            tessellate::tessellate,
        },
        draw_state::{DrawPrimitive, DrawState, VertexAttribute},
        render_context::RenderContext,
    },
};

/// Floats per assembled row: x, y, z relative to the local origin, and the side (+1 / -1).
pub const FLOATS_PER_ROW: usize = 4;
/// Every logical vertex is stored twice, once per side of the line.
pub const ROWS_PER_VERTEX: usize = 2;
pub const VERTEX_STRIDE: usize = FLOATS_PER_ROW * ROWS_PER_VERTEX;

const ROW_BYTES: u64 = (FLOATS_PER_ROW * std::mem::size_of::<f32>()) as u64;
const VERTEX_BYTES: u64 = ROW_BYTES * ROWS_PER_VERTEX as u64;
// Colour and width arrays hold one 4-byte value per row
const ATTRIBUTE_OFFSET: u64 = (ROWS_PER_VERTEX * std::mem::size_of::<u32>()) as u64;

#[derive(Debug, Clone, Copy, Default)]
struct ArrayTokens {
    vertices: Option<CacheKey>,
    indices: Option<CacheKey>,
    colors: Option<CacheKey>,
    pick_colors: Option<CacheKey>,
    widths: Option<CacheKey>,
}

/// Up to `capacity` paths with equal [`AttributeGroupKey`]s, drawn with one
/// draw call from shared arrays.
///
/// Any change to membership or to an entry's positions rebuilds every array.
/// Colour, width and pick-colour changes on an otherwise clean batch only
/// rewrite the rows of the entries that changed, and only those arrays get a
/// new cache key.
#[derive(Debug)]
pub struct LineBatch<K> {
    capacity: usize,
    group_key: AttributeGroupKey,
    entries: Vec<PathEntry<K>>,
    // Rows of each entry, parallel to `entries`
    row_ranges: Vec<Range<usize>>,
    layout_dirty: bool,
    vertices: Vec<f32>,
    colors: Vec<u32>,
    pick_colors: Vec<u32>,
    widths: Vec<f32>,
    indices: Vec<u32>,
    local_origin: DVec3,
    bounds: BatchBounds,
    tokens: ArrayTokens,
    texture: Option<TextureHandle>,
}

impl<K: Copy + Eq + Debug> LineBatch<K> {
    pub fn new(capacity: usize, group_key: AttributeGroupKey) -> Self {
        Self {
            capacity: capacity.max(1),
            group_key,
            entries: Vec::new(),
            row_ranges: Vec::new(),
            layout_dirty: true,
            vertices: Vec::new(),
            colors: Vec::new(),
            pick_colors: Vec::new(),
            widths: Vec::new(),
            indices: Vec::new(),
            local_origin: DVec3::ZERO,
            bounds: BatchBounds::Empty,
            tokens: ArrayTokens::default(),
            texture: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn group_key(&self) -> AttributeGroupKey {
        self.group_key
    }

    /// Used by single-path batches whose attributes change in place.
    pub fn set_group_key(&mut self, group_key: AttributeGroupKey) {
        if self.group_key.is_surface() != group_key.is_surface() {
            self.layout_dirty = true;
        }
        self.group_key = group_key;
    }

    /// Outline texture for single-path batches; shared batches never carry one.
    pub fn set_texture(&mut self, texture: Option<TextureHandle>) {
        self.texture = texture;
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.iter().any(|entry| entry.key() == key)
    }

    pub fn entries(&self) -> &[PathEntry<K>] {
        &self.entries
    }

    pub fn entry_mut(&mut self, key: K) -> Option<&mut PathEntry<K>> {
        self.entries.iter_mut().find(|entry| entry.key() == key)
    }

    pub fn add_path(&mut self, mut entry: PathEntry<K>) -> RenderResult<()> {
        if self.is_full() {
            return Err(RenderError::BatchFull {
                capacity: self.capacity,
            });
        }

        entry.mark_dirty(DirtyFlags::ALL);
        self.entries.push(entry);
        self.layout_dirty = true;
        Ok(())
    }

    pub fn remove_path(&mut self, key: K) -> Option<PathEntry<K>> {
        let index = self.entries.iter().position(|entry| entry.key() == key)?;
        let entry = self.entries.remove(index);
        self.layout_dirty = true;
        Some(entry)
    }

    pub fn mark_layout_dirty(&mut self) {
        self.layout_dirty = true;
    }

    pub fn needs_geometry_rebuild(&self) -> bool {
        self.layout_dirty || self.entries.iter().any(|entry| entry.dirty().positions)
    }

    pub fn needs_assembly(&self) -> bool {
        self.layout_dirty || self.entries.iter().any(|entry| entry.dirty().any())
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn pick_colors(&self) -> &[u32] {
        &self.pick_colors
    }

    pub fn widths(&self) -> &[f32] {
        &self.widths
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn row_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_ROW
    }

    /// Assembled rows belonging to `key`.
    pub fn row_range(&self, key: K) -> Option<Range<usize>> {
        let index = self.entries.iter().position(|entry| entry.key() == key)?;
        self.row_ranges.get(index).cloned()
    }

    pub fn local_origin(&self) -> DVec3 {
        self.local_origin
    }

    pub fn bounds(&self) -> &BatchBounds {
        &self.bounds
    }

    /// Brings every assembled array up to date with the entries.
    pub fn assemble(&mut self, rc: &mut RenderContext) {
        if self.needs_geometry_rebuild() {
            self.rebuild(rc);
        } else {
            self.refresh_attributes(rc);
        }

        for entry in &mut self.entries {
            entry.clear_dirty();
        }
        self.layout_dirty = false;
    }

    fn rebuild(&mut self, rc: &mut RenderContext) {
        let threshold = rc.config().near_zero_threshold;
        let surface = self.group_key.is_surface();

        self.vertices.clear();
        self.colors.clear();
        self.pick_colors.clear();
        self.widths.clear();
        self.indices.clear();
        self.row_ranges.clear();

        let mut origin: Option<DVec3> = None;
        let mut relative_points: Vec<DVec3> = Vec::new();
        let mut sector: Option<Sector> = None;

        for entry in &self.entries {
            let start = self.vertices.len() / FLOATS_PER_ROW;
            let points = tessellate(
                entry.positions(),
                entry.path_type(),
                entry.intermediate_points(),
                threshold,
            );

            let (Some(first), Some(last)) = (points.first(), points.last()) else {
                self.row_ranges.push(start..start);
                continue;
            };

            if surface {
                if let Some(entry_sector) = Sector::from_positions(points.iter()) {
                    sector = Some(match sector {
                        Some(sector) => sector.union(&entry_sector),
                        None => entry_sector,
                    });
                }
            }

            let globe = rc.globe();
            let cartesian: Vec<DVec3> = std::iter::once(first)
                .chain(points.iter())
                .chain(std::iter::once(last))
                .map(|position| globe.geographic_to_cartesian(position))
                .collect();
            let batch_origin = *origin.get_or_insert(cartesian[1]);

            for point in &cartesian {
                let relative = *point - batch_origin;
                relative_points.push(relative);

                let relative = relative.as_vec3();
                for side in [1.0f32, -1.0] {
                    self.vertices
                        .extend_from_slice(&[relative.x, relative.y, relative.z, side]);
                }
            }

            let rows = cartesian.len() * ROWS_PER_VERTEX;
            let color = entry.color().to_rgba8();
            let pick = pick_color::encode_optional(entry.pick_id());
            self.colors.extend(std::iter::repeat(color).take(rows));
            self.pick_colors.extend(std::iter::repeat(pick).take(rows));
            self.widths.extend(std::iter::repeat(entry.width()).take(rows));

            // Index i reads its current point from row i + 2, so real vertex c
            // of this entry is addressed as start + 2c.
            for c in 0..points.len() - 1 {
                let b = (start + ROWS_PER_VERTEX * c) as u32;
                self.indices
                    .extend_from_slice(&[b, b + 1, b + 2, b + 2, b + 1, b + 3]);
            }

            self.row_ranges.push(start..start + rows);
        }

        self.local_origin = origin.unwrap_or(DVec3::ZERO);
        self.bounds = if surface {
            sector.map_or(BatchBounds::Empty, BatchBounds::Geographic)
        } else {
            Aabb::from_points(relative_points)
                .map_or(BatchBounds::Empty, |aabb| {
                    BatchBounds::Cartesian(aabb.translate(self.local_origin))
                })
        };

        self.tokens = ArrayTokens {
            vertices: Some(rc.next_cache_key()),
            indices: Some(rc.next_cache_key()),
            colors: Some(rc.next_cache_key()),
            pick_colors: Some(rc.next_cache_key()),
            widths: Some(rc.next_cache_key()),
        };

        log::debug!(
            "Assembled batch of {} paths: {} rows, {} indices",
            self.entries.len(),
            self.row_count(),
            self.indices.len()
        );
    }

    fn refresh_attributes(&mut self, rc: &mut RenderContext) {
        let mut changed = DirtyFlags::NONE;

        for (entry, rows) in self.entries.iter().zip(&self.row_ranges) {
            let dirty = entry.dirty();

            if dirty.color {
                self.colors[rows.clone()].fill(entry.color().to_rgba8());
                changed.color = true;
            }
            if dirty.width {
                self.widths[rows.clone()].fill(entry.width());
                changed.width = true;
            }
            if dirty.pick_color {
                self.pick_colors[rows.clone()].fill(pick_color::encode_optional(entry.pick_id()));
                changed.pick_color = true;
            }
        }

        if changed.color {
            self.tokens.colors = Some(rc.next_cache_key());
        }
        if changed.width {
            self.tokens.widths = Some(rc.next_cache_key());
        }
        if changed.pick_color {
            self.tokens.pick_colors = Some(rc.next_cache_key());
        }
    }

    /// Assembles if needed and submits one draw call for the whole batch.
    ///
    /// Returns `Ok(false)` when nothing was drawn because the batch is empty
    /// or out of view. The draw state is always returned to the pool.
    pub fn render(
        &mut self,
        rc: &mut RenderContext,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderResult<bool> {
        if self.entries.is_empty() {
            return Ok(false);
        }

        // Stale bounds are only trusted while the geometry is unchanged
        if !self.needs_geometry_rebuild() && !rc.is_visible(&self.bounds) {
            return Ok(false);
        }

        self.assemble(rc);

        if self.indices.is_empty() || !rc.is_visible(&self.bounds) {
            return Ok(false);
        }

        let mut state = rc.acquire_draw_state();
        let result = self
            .populate(&mut state, rc, backend)
            .and_then(|()| backend.draw(&state));
        rc.release_draw_state(state);
        result?;

        // An abandoned draw leaves nothing to pick
        if rc.pick_mode() {
            for pick_id in self.entries.iter().filter_map(|entry| entry.pick_id()) {
                rc.offer_picked_object(PickedObject::new(pick_id));
            }
        }

        Ok(true)
    }

    fn populate(
        &self,
        state: &mut DrawState,
        rc: &RenderContext,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderResult<()> {
        let unassembled = || RenderError::binding("batch arrays", "batch has not been assembled");
        let pick_mode = rc.pick_mode();

        state.program = Some(backend.shader_program(ProgramKind::ScreenSpaceLine)?);

        let vertices = backend.get_buffer_object(
            self.tokens.vertices.ok_or_else(unassembled)?,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&self.vertices),
        )?;

        let colors = if pick_mode {
            backend.get_buffer_object(
                self.tokens.pick_colors.ok_or_else(unassembled)?,
                BufferUsage::Vertex,
                bytemuck::cast_slice(&self.pick_colors),
            )?
        } else {
            backend.get_buffer_object(
                self.tokens.colors.ok_or_else(unassembled)?,
                BufferUsage::Vertex,
                bytemuck::cast_slice(&self.colors),
            )?
        };

        let widths = backend.get_buffer_object(
            self.tokens.widths.ok_or_else(unassembled)?,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&self.widths),
        )?;

        let elements = backend.get_buffer_object(
            self.tokens.indices.ok_or_else(unassembled)?,
            BufferUsage::Index,
            bytemuck::cast_slice(&self.indices),
        )?;

        state.bind_vertex_buffer(VertexAttribute::PreviousPoint, vertices, 0);
        state.bind_vertex_buffer(VertexAttribute::Point, vertices, VERTEX_BYTES);
        state.bind_vertex_buffer(VertexAttribute::NextPoint, vertices, 2 * VERTEX_BYTES);
        state.bind_vertex_buffer(VertexAttribute::Color, colors, ATTRIBUTE_OFFSET);
        state.bind_vertex_buffer(VertexAttribute::Width, widths, ATTRIBUTE_OFFSET);
        state.element_buffer = Some(elements);

        state.local_origin = self.local_origin;
        state.depth_test = self.group_key.depth_test();
        state.depth_write = self.group_key.depth_write();
        state.pick_mode = pick_mode;

        state.draw_elements(DrawPrimitive {
            color: Color::WHITE,
            line_width: 0.0,
            opacity: if pick_mode { 1.0 } else { rc.layer_opacity() },
            texture: self.texture,
            index_range: 0..self.indices.len() as u32,
        });

        Ok(())
    }
}
