#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod geometry;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod scene;
pub mod validate;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutAlgorithm, LayoutConfig, load_config};
pub use geometry::{Arrow, Point, ShapeBox, Side};
pub use ir::{Direction, Edge, Graph, Node, NodeKind, ShapeKind};
pub use layout::{
    ColumnConnector, GridRouter, LayoutError, LayoutResult, RoutedDiagram, auto_layout,
    compute_layout, layout_graph, route_layout, simplify_path, split_columns,
};
pub use scene::{Scene, SceneError, load_scene, parse_scene};
pub use validate::{
    IssueType, RoutingValidator, Severity, ValidationIssue, ValidationReport, ValidationSummary,
};
