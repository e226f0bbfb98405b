//! Visualization utilities for highway_planner
//!
//! Collects plot layers and renders them with gnuplot into one set of axes.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{Path2D, Point2D, RoadMap};
use crate::prediction::vehicle_tracker::SensorFusionReading;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const BLUE: &str = "#0000FF";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const EGO_PATH: &str = RED;
    pub const TRAFFIC: &str = BLUE;
    pub const ROAD_EDGE: &str = BLACK;
    pub const LANE_MARKING: &str = GRAY;
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::EGO_PATH, "Ego path")
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Lines { x: Vec<f64>, y: Vec<f64>, style: PathStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

/// Main visualizer struct
pub struct Visualizer {
    layers: Vec<Layer>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Number of layers plotted so far
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn plot_path(&mut self, path: &Path2D, style: &PathStyle) -> &mut Self {
        self.layers.push(Layer::Lines { x: path.x_coords(), y: path.y_coords(), style: style.clone() });
        self
    }

    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        let x = points.iter().map(|p| p.x).collect();
        let y = points.iter().map(|p| p.y).collect();
        self.layers.push(Layer::Points { x, y, style: style.clone() });
        self
    }

    /// Lane boundaries between `s_start` and `s_end`, edges solid and
    /// markings thin
    pub fn plot_lanes<R: RoadMap + ?Sized>(
        &mut self,
        road: &R,
        s_start: f64,
        s_end: f64,
        lane_width: f64,
        n_lanes: usize,
    ) -> &mut Self {
        let samples = ((s_end - s_start).abs() / 5.0).ceil().max(1.0) as usize;
        for boundary in 0..=n_lanes {
            let d = boundary as f64 * lane_width;
            let line: Vec<Point2D> = (0..=samples)
                .map(|i| road.to_cartesian(s_start + (s_end - s_start) * i as f64 / samples as f64, d))
                .collect();
            let edge = boundary == 0 || boundary == n_lanes;
            let style = if edge {
                PathStyle::new(colors::ROAD_EDGE, "").with_line_width(1.5)
            } else {
                PathStyle::new(colors::LANE_MARKING, "").with_line_width(0.5)
            };
            self.plot_path(&Path2D::from_points(line), &style);
        }
        self
    }

    /// Reported positions of the surrounding vehicles
    pub fn plot_vehicles(&mut self, vehicles: &[SensorFusionReading]) -> &mut Self {
        let points: Vec<Point2D> = vehicles.iter().map(|v| Point2D::new(v.x, v.y)).collect();
        self.plot_points(&points, &PointStyle::new(colors::TRAFFIC, "Traffic").with_symbol('S'))
    }

    /// Save plot to PNG file
    pub fn save_png(&self, path: &str, width: u32, height: u32) -> Result<(), String> {
        let mut figure = self.render();
        figure.save_to_png(path, width, height).map_err(|e| e.to_string())
    }

    pub fn save_svg(&self, path: &str) -> Result<(), String> {
        let mut figure = self.render();
        figure.save_to_svg(path, 800, 600).map_err(|e| e.to_string())
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        let axes = figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines { x, y, style } => {
                    axes.lines(x, y, &[Caption(&style.caption), Color(&style.color), LineWidth(style.line_width)]);
                }
                Layer::Points { x, y, style } => {
                    axes.points(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        PointSymbol(style.symbol),
                        PointSize(style.size),
                    ]);
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);
        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
        figure
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::waypoint_map::WaypointMap;

    #[test]
    fn test_path_style() {
        let style = PathStyle::new(colors::RED, "Test Path").with_line_width(3.0);
        assert_eq!(style.line_width, 3.0);
        assert_eq!(style.color, colors::RED);
    }

    #[test]
    fn test_lane_layers() {
        let road = WaypointMap::straight(200.0, 10.0).unwrap();
        let mut vis = Visualizer::new();
        vis.plot_lanes(&road, 0.0, 100.0, 4.0, 3);
        assert_eq!(vis.layer_count(), 4);

        match &vis.layers[3] {
            Layer::Lines { y, style, .. } => {
                assert_eq!(y.len(), 21);
                assert!((y[0] + 12.0).abs() < 1e-9);
                assert_eq!(style.color, colors::ROAD_EDGE);
            }
            Layer::Points { .. } => panic!("lane boundary drawn as points"),
        }
    }

    #[test]
    fn test_vehicle_layer() {
        let mut vis = Visualizer::new();
        let car = SensorFusionReading { id: 1, x: 3.0, y: 4.0, vx: 0.0, vy: 0.0, s: 0.0, d: 0.0 };
        vis.plot_vehicles(&[car, car]).plot_path(&Path2D::from_xy(&[0.0, 1.0], &[0.0, 0.0]), &PathStyle::default());
        assert_eq!(vis.layer_count(), 2);
    }
}
