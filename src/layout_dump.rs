use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::config::LayoutAlgorithm;
use crate::layout::{ColumnConnector, LayoutResult, RoutedDiagram};

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub algorithm: String,
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub aspect_ratio: f32,
    pub layers: Vec<Vec<String>>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub connector: Option<ConnectorDump>,
    pub arrows: Vec<ArrowDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub kind: Option<String>,
    pub shape: String,
    /// Center.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub from: String,
    pub to: String,
    pub gap_x: f32,
}

#[derive(Debug, Serialize)]
pub struct ArrowDump {
    pub id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub label: Option<String>,
    pub elbowed: bool,
    /// Absolute waypoints.
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_layout(
        algorithm: LayoutAlgorithm,
        layout: &LayoutResult,
        connector: Option<&ColumnConnector>,
        routed: Option<&RoutedDiagram>,
    ) -> Self {
        let nodes = layout
            .nodes
            .values()
            .map(|node| NodeDump {
                id: node.id.clone(),
                label: node.label.clone(),
                kind: node.kind.map(|kind| format!("{kind:?}").to_lowercase()),
                shape: node.shape().as_str().to_string(),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                from: edge.from.clone(),
                to: edge.to.clone(),
                label: edge.label.clone(),
            })
            .collect();

        let arrows = routed
            .map(|routed| {
                routed
                    .arrows
                    .iter()
                    .map(|arrow| ArrowDump {
                        id: arrow.id.clone(),
                        from: arrow.start_binding.clone(),
                        to: arrow.end_binding.clone(),
                        label: arrow.label.clone(),
                        elbowed: arrow.elbowed,
                        points: arrow
                            .absolute_points()
                            .into_iter()
                            .map(|(x, y)| [x, y])
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        LayoutDump {
            algorithm: algorithm.as_str().to_string(),
            direction: format!("{:?}", layout.direction),
            width: layout.width,
            height: layout.height,
            aspect_ratio: layout.aspect_ratio,
            layers: layout.layers.clone(),
            nodes,
            edges,
            connector: connector.map(|c| ConnectorDump {
                from: c.from.clone(),
                to: c.to.clone(),
                gap_x: c.gap_x,
            }),
            arrows,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout when `path` is
/// `None`.
pub fn write_layout_dump(path: Option<&Path>, dump: &LayoutDump) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, dump)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
