//! Visualization utilities for multi_root_planner
//!
//! Plots are collected as layers and drawn into a single gnuplot axes when
//! the figure is shown or saved.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{NearestNeighborIndex, Path2D, PlanningError, PlanningResult, Point, Range};
use crate::path_planning::environment::ObstacleEnvironment;
use crate::path_planning::multi_root::output::roadmap_edges;
use crate::path_planning::multi_root::{Forest, PathMatrix};

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const ORANGE: &str = "#FFA500";
    pub const PURPLE: &str = "#800080";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const OBSTACLE: &str = BLACK;
    pub const ROOT: &str = GREEN;
    pub const PATH: &str = RED;
    pub const ROADMAP: &str = GRAY;

    /// Cycled through when every tree gets its own color
    pub const TREES: [&str; 6] = ["#1F77B4", "#FF7F0E", "#2CA02C", "#9467BD", "#8C564B", "#17BECF"];
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
        Self {
            color: colors::PATH.to_string(),
            line_width: 2.0,
            caption: "Path".to_string(),
        }
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
}

#[derive(Debug, Clone)]
enum Layer {
    Lines { x: Vec<f64>, y: Vec<f64>, style: PathStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

/// Flatten polylines into one coordinate pair of vectors, NaN separating the
/// polylines
pub fn polylines_to_xy(polylines: &[Vec<Point>]) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for line in polylines {
        x.extend(line.iter().map(|p| p.x));
        y.extend(line.iter().map(|p| p.y));
        x.push(f64::NAN);
        y.push(f64::NAN);
    }
    (x, y)
}

fn circle_polyline(center: Point, radius: f64) -> Vec<Point> {
    const SEGMENTS: usize = 36;
    (0..=SEGMENTS)
        .map(|i| {
            let a = 2.0 * std::f64::consts::PI * i as f64 / SEGMENTS as f64;
            Point::new(center.x + radius * a.cos(), center.y + radius * a.sin())
        })
        .collect()
}

fn range_polyline(range: &Range) -> Vec<Point> {
    vec![
        Point::new(range.min_x, range.min_y),
        Point::new(range.max_x, range.min_y),
        Point::new(range.max_x, range.max_y),
        Point::new(range.min_x, range.max_y),
        Point::new(range.min_x, range.min_y),
    ]
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    layers: Vec<Layer>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            layers: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
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

    /// Fix both axes to `range`
    pub fn set_range(&mut self, range: &Range) -> &mut Self {
        self.set_x_range(range.min_x, range.max_x)
            .set_y_range(range.min_y, range.max_y)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn plot_path(&mut self, path: &Path2D, style: &PathStyle) -> &mut Self {
        self.layers.push(Layer::Lines {
            x: path.x_coords(),
            y: path.y_coords(),
            style: style.clone(),
        });
        self
    }

    /// Several polylines drawn as one layer
    pub fn plot_polylines(&mut self, polylines: &[Vec<Point>], style: &PathStyle) -> &mut Self {
        if polylines.is_empty() {
            return self;
        }
        let (x, y) = polylines_to_xy(polylines);
        self.layers.push(Layer::Lines { x, y, style: style.clone() });
        self
    }

    pub fn plot_points(&mut self, points: &[Point], style: &PointStyle) -> &mut Self {
        self.layers.push(Layer::Points {
            x: points.iter().map(|p| p.x).collect(),
            y: points.iter().map(|p| p.y).collect(),
            style: style.clone(),
        });
        self
    }

    pub fn plot_roots(&mut self, roots: &[Point]) -> &mut Self {
        self.plot_points(roots, &PointStyle::new(colors::ROOT, "Roots").with_size(1.5))
    }

    /// Range border, circles and walls
    pub fn plot_environment(&mut self, env: &ObstacleEnvironment, range: &Range) -> &mut Self {
        let mut outlines = vec![range_polyline(range)];
        outlines.extend(
            env.circles()
                .iter()
                .map(|c| circle_polyline(Point::new(c.x, c.y), c.radius)),
        );
        outlines.extend(env.walls().iter().map(|w| vec![w.start, w.end]));
        self.plot_polylines(&outlines, &PathStyle::new(colors::OBSTACLE, "Obstacles").with_line_width(1.5))
    }

    /// Tree edges, one color per tree
    pub fn plot_forest<I: NearestNeighborIndex + Default>(&mut self, forest: &Forest<I>) -> &mut Self {
        for tree in forest.trees() {
            let own: Vec<Vec<Point>> = tree
                .nodes()
                .iter()
                .filter_map(|n| n.closest.map(|p| vec![tree.node(p).position, n.position]))
                .collect();
            let color = colors::TREES[tree.id() % colors::TREES.len()];
            let caption = format!("Tree {}", tree.id());
            self.plot_polylines(&own, &PathStyle::new(color, &caption).with_line_width(1.0));
        }
        self
    }

    pub fn plot_roadmap<I: NearestNeighborIndex + Default>(&mut self, forest: &Forest<I>) -> &mut Self {
        self.plot_polylines(
            &roadmap_edges(forest),
            &PathStyle::new(colors::ROADMAP, "Links").with_line_width(0.5),
        )
    }

    /// Recovered path between roots `i` and `j`
    pub fn plot_plan<I: NearestNeighborIndex + Default>(
        &mut self,
        forest: &Forest<I>,
        matrix: &PathMatrix,
        i: usize,
        j: usize,
    ) -> &mut Self {
        let path = matrix.geometry(forest, i, j);
        if path.is_empty() {
            return self;
        }
        let caption = format!("Plan {} - {}", i, j);
        self.plot_path(&path, &PathStyle::new(colors::PATH, &caption))
    }

    pub fn save_svg(&mut self, path: &str) -> PlanningResult<()> {
        self.render();
        self.figure
            .save_to_svg(path, 800, 600)
            .map_err(|e| PlanningError::Visualization(e.to_string()))
    }

    fn render(&mut self) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines { x, y, style } => {
                    axes.lines(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        LineWidth(style.line_width),
                    ]);
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
        // metric plots, one unit is the same length on both axes
        axes.set_aspect_ratio(AutoOption::Fix(1.0));
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}
