use std::any::Any;

use crate::{
    error::RenderResult,
    layer::ShapeId,
    math::geo::Position,
    rendering::{
        backend::GraphicsBackend,
        batching::{AttributeGroupKey, LineBatch, PathEntry, PathType},
        render_context::RenderContext,
    },
    shapes::{
        attributes::{AltitudeMode, ShapeAttributes},
        Renderable,
    },
};

pub const DEFAULT_MAX_INTERMEDIATE_POINTS: u32 = 10;

/// A polyline through geographic positions.
pub struct Path {
    pub name: String,
    positions: Vec<Position>,
    path_type: PathType,
    max_intermediate_points: u32,
    altitude_mode: AltitudeMode,
    attributes: ShapeAttributes,
    highlight_attributes: Option<ShapeAttributes>,
    highlighted: bool,
    enabled: bool,
    always_individual: bool,
    pick_id: Option<u32>,
    // Resolved by update_attributes
    active: ShapeAttributes,
    group_key: AttributeGroupKey,
    // Bumped on every change that affects tessellated geometry
    geometry_generation: u64,
    entry_generation: u64,
    solo: Option<LineBatch<()>>,
    solo_generation: u64,
}

impl Path {
    pub fn new(positions: Vec<Position>) -> Self {
        let attributes = ShapeAttributes::default();
        let group_key = AttributeGroupKey::new(&attributes, false, false);

        Self {
            name: String::new(),
            positions,
            path_type: PathType::default(),
            max_intermediate_points: DEFAULT_MAX_INTERMEDIATE_POINTS,
            altitude_mode: AltitudeMode::default(),
            active: attributes.clone(),
            attributes,
            highlight_attributes: None,
            highlighted: false,
            enabled: true,
            always_individual: false,
            pick_id: None,
            group_key,
            geometry_generation: 1,
            entry_generation: 0,
            solo: None,
            solo_generation: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_attributes(mut self, attributes: ShapeAttributes) -> Self {
        self.set_attributes(attributes);
        self
    }

    pub fn with_path_type(mut self, path_type: PathType) -> Self {
        self.set_path_type(path_type);
        self
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn set_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions;
        self.geometry_generation += 1;
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn set_path_type(&mut self, path_type: PathType) {
        if self.path_type != path_type {
            self.path_type = path_type;
            self.geometry_generation += 1;
        }
    }

    pub fn max_intermediate_points(&self) -> u32 {
        self.max_intermediate_points
    }

    pub fn set_max_intermediate_points(&mut self, count: u32) {
        if self.max_intermediate_points != count {
            self.max_intermediate_points = count;
            self.geometry_generation += 1;
        }
    }

    pub fn altitude_mode(&self) -> AltitudeMode {
        self.altitude_mode
    }

    pub fn set_altitude_mode(&mut self, altitude_mode: AltitudeMode) {
        if self.altitude_mode != altitude_mode {
            self.altitude_mode = altitude_mode;
            self.geometry_generation += 1;
        }
    }

    pub fn attributes(&self) -> &ShapeAttributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: ShapeAttributes) {
        self.attributes = attributes;
    }

    pub fn set_highlight_attributes(&mut self, attributes: Option<ShapeAttributes>) {
        self.highlight_attributes = attributes;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Opts the path out of batching altogether.
    pub fn set_always_individual(&mut self, always_individual: bool) {
        self.always_individual = always_individual;
    }

    pub fn pick_id(&self) -> Option<u32> {
        self.pick_id
    }

    /// The attributes this frame is drawn with.
    pub fn active_attributes(&self) -> &ShapeAttributes {
        &self.active
    }

    fn resolve_active(&self) -> ShapeAttributes {
        match (&self.highlight_attributes, self.highlighted) {
            (Some(highlight), true) => highlight.clone(),
            _ => self.attributes.clone(),
        }
    }

    fn draw_positions(&self) -> Vec<Position> {
        if self.altitude_mode.is_surface() {
            self.positions
                .iter()
                .map(|position| Position::new(position.latitude, position.longitude, 0.0))
                .collect()
        } else {
            self.positions.clone()
        }
    }

    fn intermediate_points(&self) -> u32 {
        if self.path_type.interpolates() {
            self.max_intermediate_points
        } else {
            0
        }
    }

    fn new_entry<K: Copy>(&self, key: K) -> PathEntry<K> {
        let mut entry = PathEntry::new(
            key,
            self.draw_positions(),
            self.path_type,
            self.intermediate_points(),
            self.active.outline_color,
            self.active.outline_width,
        );
        entry.set_pick_id(self.pick_id);
        entry
    }

    fn update_entry<K: Copy>(&self, entry: &mut PathEntry<K>, synced_generation: u64) {
        if synced_generation != self.geometry_generation {
            entry.set_positions(self.draw_positions());
            entry.set_tessellation(self.path_type, self.intermediate_points());
        }
        entry.set_color(self.active.outline_color);
        entry.set_width(self.active.outline_width);
        entry.set_pick_id(self.pick_id);
    }
}

impl Renderable for Path {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn can_be_batched(&self, _rc: &RenderContext) -> bool {
        !self.always_individual
            && self.active.outline_texture.is_none()
            && !self.active.extrude
            && self.positions.len() >= 2
    }

    fn update_attributes(&mut self, _rc: &RenderContext) {
        self.active = self.resolve_active();
        let highlighted = self.highlighted && self.highlight_attributes.is_some();
        self.group_key =
            AttributeGroupKey::new(&self.active, highlighted, self.altitude_mode.is_surface());
    }

    fn group_key(&self) -> AttributeGroupKey {
        self.group_key
    }

    fn snapshot_entry(&mut self, key: ShapeId) -> PathEntry<ShapeId> {
        self.entry_generation = self.geometry_generation;
        self.new_entry(key)
    }

    fn sync_entry(&mut self, entry: &mut PathEntry<ShapeId>) {
        self.update_entry(entry, self.entry_generation);
        self.entry_generation = self.geometry_generation;
    }

    fn set_pick_id(&mut self, pick_id: Option<u32>) {
        self.pick_id = pick_id;
    }

    fn render(
        &mut self,
        rc: &mut RenderContext,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderResult<()> {
        let mut batch = self
            .solo
            .take()
            .unwrap_or_else(|| LineBatch::new(1, self.group_key));

        batch.set_group_key(self.group_key);
        batch.set_texture(self.active.outline_texture);

        match batch.entry_mut(()) {
            Some(entry) => self.update_entry(entry, self.solo_generation),
            None => batch.add_path(self.new_entry(()))?,
        }
        self.solo_generation = self.geometry_generation;

        let result = batch.render(rc, backend);
        self.solo = Some(batch);
        result.map(|_| ())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
