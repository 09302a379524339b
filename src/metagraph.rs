//! Snapshot of the component interaction graph.
//!
//! Every component is a node sized by its revenue; every ordered pair of
//! components (self-loops included) is an edge labelled with the source's
//! weight for the destination. Nodes sit on a circle and the picture is
//! rendered into an in-memory PNG that the caller hands to the logger.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::fs;
use std::path::PathBuf;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::logger::{LoggerError, PlotImage, SummarySink, TbLogger};
use crate::run::HParams;

#[derive(Error, Debug)]
pub enum MetagraphError {
    #[error("Component {0:?} appears more than once")]
    DuplicateComponent(String),
    #[error("Component {from:?} has no weight for {to:?}")]
    MissingWeight { from: String, to: String },
    #[error("Render error: {0}")]
    Render(String),
    #[error("PNG encoding error: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Logger(#[from] LoggerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetagraphError>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub revenue: f32,
    /// Weight this component assigns to each component, keyed by name.
    pub weights: HashMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub name: String,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ComponentGraph {
    /// Fully connected directed graph over `components`, self-loops included.
    pub fn from_components(components: &[Component]) -> Result<ComponentGraph> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(components.len());
        for c in components {
            if !seen.insert(c.name.as_str()) {
                return Err(MetagraphError::DuplicateComponent(c.name.clone()));
            }
            nodes.push(GraphNode {
                name: c.name.clone(),
                size: 0.1 + c.revenue,
            });
        }

        let mut edges = Vec::with_capacity(components.len() * components.len());
        for (i, parent) in components.iter().enumerate() {
            for (j, child) in components.iter().enumerate() {
                let weight = parent.weights.get(&child.name).ok_or_else(|| {
                    MetagraphError::MissingWeight {
                        from: parent.name.clone(),
                        to: child.name.clone(),
                    }
                })?;
                edges.push(GraphEdge {
                    from: i,
                    to: j,
                    label: format!("{weight:.3}"),
                });
            }
        }

        Ok(ComponentGraph { nodes, edges })
    }
}

/// Positions `n` nodes evenly on the unit circle, starting at angle 0.
/// A single node sits at the origin.
pub fn circular_layout(n: usize) -> Vec<(f64, f64)> {
    if n == 1 {
        return vec![(0.0, 0.0)];
    }
    (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n as f64;
            (theta.cos(), theta.sin())
        })
        .collect()
}

const LABEL_Y_OFFSET: f64 = 0.2;
/// Edge labels sit this fraction of the way from the destination to the source.
const EDGE_LABEL_POS: f64 = 0.3;
const NODE_RADIUS_SCALE: f64 = 20.0;
const ARROW_SIZE: f64 = 15.0;
/// Largest canvas `render` will allocate (8192 x 8192).
pub const MAX_CANVAS_PIXELS: usize = 8192 * 8192;

pub struct MetagraphRenderer {
    pub width: u32,
    pub height: u32,
    /// Draw node and edge labels. Text rendering needs a system font.
    pub with_labels: bool,
}

impl Default for MetagraphRenderer {
    fn default() -> Self {
        MetagraphRenderer {
            width: 1000,
            height: 1000,
            with_labels: true,
        }
    }
}

impl MetagraphRenderer {
    pub fn new(width: u32, height: u32) -> MetagraphRenderer {
        MetagraphRenderer {
            width,
            height,
            ..Default::default()
        }
    }

    /// Layout coordinates span [-1.5, 1.5] on both axes; y grows upwards.
    fn to_pixel(&self, (x, y): (f64, f64)) -> (i32, i32) {
        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;
        let px = half_w + x / 1.5 * half_w;
        let py = half_h - y / 1.5 * half_h;
        (px.round() as i32, py.round() as i32)
    }

    fn node_radius(size: f32) -> f64 {
        (size.max(0.0) as f64).sqrt() * NODE_RADIUS_SCALE
    }

    /// Size in bytes of the RGB canvas, rejecting empty or oversized ones.
    fn buffer_len(&self) -> Result<usize> {
        if self.width == 0 || self.height == 0 {
            return Err(MetagraphError::Render(format!(
                "canvas {}x{} is empty",
                self.width, self.height
            )));
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .filter(|&pixels| pixels <= MAX_CANVAS_PIXELS)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| {
                MetagraphError::Render(format!(
                    "canvas {}x{} exceeds {MAX_CANVAS_PIXELS} pixels",
                    self.width, self.height
                ))
            })
    }

    /// Renders the graph and returns it as a PNG.
    pub fn render(&self, graph: &ComponentGraph) -> Result<PlotImage> {
        let mut buffer = vec![0u8; self.buffer_len()?];
        {
            let root =
                BitMapBackend::with_buffer(&mut buffer, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| MetagraphError::Render(e.to_string()))?;
            self.draw(&root, graph)?;
            root.present()
                .map_err(|e| MetagraphError::Render(e.to_string()))?;
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(&buffer, self.width, self.height, ColorType::Rgb8)?;
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            bytes = png.len(),
            "rendered metagraph"
        );

        Ok(PlotImage {
            width: self.width,
            height: self.height,
            png,
        })
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, plotters::coord::Shift>,
        graph: &ComponentGraph,
    ) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let positions = circular_layout(graph.nodes.len());
        let pixels: Vec<(i32, i32)> = positions.iter().map(|&p| self.to_pixel(p)).collect();
        let edge_style = GREEN.mix(0.05);
        let render_err =
            |e: DrawingAreaErrorKind<DB::ErrorType>| MetagraphError::Render(format!("{e:?}"));

        for edge in &graph.edges {
            let (sx, sy) = pixels[edge.from];
            let (tx, ty) = pixels[edge.to];
            if edge.from == edge.to {
                let r = Self::node_radius(graph.nodes[edge.from].size).max(6.0) as i32;
                root.draw(&Circle::new((sx, sy - r), r, edge_style.stroke_width(1)))
                    .map_err(render_err)?;
                continue;
            }

            root.draw(&PathElement::new(
                vec![(sx, sy), (tx, ty)],
                edge_style.stroke_width(1),
            ))
            .map_err(render_err)?;

            // arrow head, pulled back to the rim of the target node
            let (dx, dy) = ((tx - sx) as f64, (ty - sy) as f64);
            let len = (dx * dx + dy * dy).sqrt().max(1.0);
            let (ux, uy) = (dx / len, dy / len);
            let back = Self::node_radius(graph.nodes[edge.to].size);
            let tip = (tx as f64 - ux * back, ty as f64 - uy * back);
            let base = (tip.0 - ux * ARROW_SIZE, tip.1 - uy * ARROW_SIZE);
            let half = ARROW_SIZE / 3.0;
            let head = vec![
                (tip.0 as i32, tip.1 as i32),
                ((base.0 - uy * half) as i32, (base.1 + ux * half) as i32),
                ((base.0 + uy * half) as i32, (base.1 - ux * half) as i32),
            ];
            root.draw(&Polygon::new(head, edge_style.filled()))
                .map_err(render_err)?;
        }

        for (node, &(x, y)) in graph.nodes.iter().zip(&pixels) {
            let r = Self::node_radius(node.size).round() as i32;
            root.draw(&Circle::new((x, y), r.max(1), BLUE.mix(0.4).filled()))
                .map_err(render_err)?;
        }

        if !self.with_labels {
            return Ok(());
        }

        let node_font = ("sans-serif", 16).into_font().color(&BLACK);
        let edge_font = ("sans-serif", 10).into_font().color(&BLACK);
        let raised: Vec<(f64, f64)> = positions
            .iter()
            .map(|&(x, y)| (x, y + LABEL_Y_OFFSET))
            .collect();

        for (node, &p) in graph.nodes.iter().zip(&raised) {
            root.draw(&Text::new(node.name.clone(), self.to_pixel(p), &node_font))
                .map_err(render_err)?;
        }
        for edge in &graph.edges {
            let (sx, sy) = raised[edge.from];
            let (tx, ty) = raised[edge.to];
            let at = (
                sx * EDGE_LABEL_POS + tx * (1.0 - EDGE_LABEL_POS),
                sy * EDGE_LABEL_POS + ty * (1.0 - EDGE_LABEL_POS),
            );
            root.draw(&Text::new(edge.label.clone(), self.to_pixel(at), &edge_font))
                .map_err(render_err)?;
        }

        Ok(())
    }
}

/// Renders the component graph, saves it as `<log_dir>/<run_prefix>/metagraph.png`
/// and logs it under the `metagraph` tag.
pub fn metagraph_summary<S: SummarySink>(
    components: &[Component],
    renderer: &MetagraphRenderer,
    tblogger: &mut TbLogger<S>,
    run_prefix: &str,
    step: i64,
    hparams: &HParams,
) -> Result<PathBuf> {
    let graph = ComponentGraph::from_components(components)?;
    let plot = renderer.render(&graph)?;

    let run_dir = hparams.log_dir.join(run_prefix);
    fs::create_dir_all(&run_dir)?;
    let path = run_dir.join("metagraph.png");
    fs::write(&path, &plot.png)?;

    tblogger.log_image("metagraph", &plot, step)?;
    Ok(path)
}
