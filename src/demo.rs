use glam::{DMat4, DVec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use pathbatch::{
    math::{color::Color, geo::Position, globe::Globe},
    rendering::batching::PathType,
    shapes::{AltitudeMode, Path, ShapeAttributes},
    PathLayer, RenderConfig, RenderContext, ShapeId, Viewport,
};

const AIRPORTS: [(&str, f64, f64); 12] = [
    ("HEL", 60.317, 24.963),
    ("ARN", 59.650, 17.918),
    ("LHR", 51.470, -0.454),
    ("JFK", 40.641, -73.778),
    ("NRT", 35.772, 140.393),
    ("SIN", 1.364, 103.991),
    ("SYD", -33.940, 151.175),
    ("GRU", -23.435, -46.473),
    ("JNB", -26.139, 28.246),
    ("DXB", 25.253, 55.364),
    ("LAX", 33.942, -118.408),
    ("KEF", 63.985, -22.605),
];

const PALETTE: [Color; 4] = [Color::WHITE, Color::GREEN, Color::BLUE, Color::YELLOW];

/// Looks at the globe from a fixed point in space.
pub struct Camera {
    pub eye: DVec3,
    pub target: DVec3,
    pub up: DVec3,
}

impl Camera {
    pub fn view_projection(&self, viewport: Viewport) -> DMat4 {
        let view = DMat4::look_at_rh(self.eye, self.target, self.up);
        let distance = self.eye.distance(self.target);
        let projection = DMat4::perspective_rh(
            45f64.to_radians(),
            viewport.aspect_ratio(),
            distance * 0.01,
            distance * 2.0,
        );
        projection * view
    }
}

pub struct DemoState {
    pub camera: Camera,
    pub layer: PathLayer,
    routes: Vec<ShapeId>,
    rng: StdRng,
}

impl DemoState {
    pub fn new(config: &RenderConfig, globe: &dyn Globe, route_count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layer = PathLayer::new("Flight routes", config);

        let routes = (0..route_count)
            .map(|i| {
                let from = AIRPORTS[rng.gen_range(0..AIRPORTS.len())];
                let mut to = AIRPORTS[rng.gen_range(0..AIRPORTS.len())];
                if to.0 == from.0 {
                    to = AIRPORTS[(i + 1) % AIRPORTS.len()];
                }

                let cruise = rng.gen_range(9_000.0..12_000.0);
                let color = PALETTE[rng.gen_range(0..PALETTE.len())];

                let mut path = Path::new(vec![
                    Position::new(from.1, from.2, 0.0),
                    Position::new(from.1, from.2, cruise),
                    Position::new(to.1, to.2, cruise),
                    Position::new(to.1, to.2, 0.0),
                ])
                .with_name(format!("{}-{} #{}", from.0, to.0, i))
                .with_attributes(ShapeAttributes::default().with_color(color).with_width(2.0));

                path.set_highlight_attributes(Some(
                    ShapeAttributes::default().with_color(Color::RED).with_width(4.0),
                ));

                // A few ground tracks to exercise surface batching
                if i % 10 == 0 {
                    path.set_altitude_mode(AltitudeMode::ClampToGround);
                    path.set_path_type(PathType::RhumbLine);
                }

                layer.add_shape(path)
            })
            .collect();

        let target = globe.geographic_to_cartesian(&Position::new(45.0, 10.0, 0.0));
        let camera = Camera {
            eye: target * 4.0,
            target: DVec3::ZERO,
            up: DVec3::Z,
        };

        Self {
            camera,
            layer,
            routes,
            rng,
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Highlights, recolours and removes a few routes to exercise regrouping.
    pub fn update(&mut self, frame: u64, rc: &mut RenderContext) {
        if self.routes.is_empty() || frame % 30 != 0 {
            return;
        }

        let index = self.rng.gen_range(0..self.routes.len());
        let id = self.routes[index];

        match (frame / 30) % 4 {
            0 => {
                if let Some(path) = self.layer.path_mut(id) {
                    let highlighted = path.is_highlighted();
                    path.set_highlighted(!highlighted);
                }
            }
            1 => {
                let color = PALETTE[self.rng.gen_range(0..PALETTE.len())];
                if let Some(path) = self.layer.path_mut(id) {
                    let attributes = path.attributes().clone().with_color(color);
                    path.set_attributes(attributes);
                }
            }
            2 => {
                if let Some(path) = self.layer.path_mut(id) {
                    let mut positions = path.positions().to_vec();
                    for position in positions.iter_mut().skip(1).take(2) {
                        position.altitude += 500.0;
                    }
                    path.set_positions(positions);
                }
            }
            _ => {
                if self.layer.remove_shape(id, rc).is_some() {
                    self.routes.swap_remove(index);
                }
            }
        }
    }
}
