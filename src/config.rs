use crate::ir::Direction;
use crate::layout::LayoutError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutAlgorithm {
    #[default]
    Hierarchical,
    Force,
}

impl LayoutAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutAlgorithm::Hierarchical => "hierarchical",
            LayoutAlgorithm::Force => "force",
        }
    }
}

impl std::str::FromStr for LayoutAlgorithm {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "hierarchical" | "sugiyama" => Ok(Self::Hierarchical),
            "force" | "force-directed" => Ok(Self::Force),
            other => Err(LayoutError::UnknownAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceConfig {
    pub iterations: usize,
    pub repulsion: f32,
    pub attraction: f32,
    pub damping: f32,
    /// Side of the square the initial positions are drawn from.
    pub initial_spread: f32,
    /// Distance of the top-left-most center from the origin after layout.
    pub margin: f32,
    /// Seed for the initial placement; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            repulsion: 10_000.0,
            attraction: 0.1,
            damping: 0.9,
            initial_spread: 500.0,
            margin: 100.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub enabled: bool,
    pub target_aspect_ratio: f32,
    /// A layout is split when its aspect ratio is below target * tolerance.
    pub aspect_ratio_tolerance: f32,
    pub column_gap: f32,
    pub min_layers: usize,
    /// Vertical run-in above the target for the column connector.
    pub connector_clearance: f32,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_aspect_ratio: 1.0,
            aspect_ratio_tolerance: 0.7,
            column_gap: 150.0,
            min_layers: 4,
            connector_clearance: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub algorithm: LayoutAlgorithm,
    pub direction: Direction,
    pub horizontal_spacing: f32,
    pub vertical_spacing: f32,
    /// Upper bound on crossing-reduction sweeps (one sweep = down + up).
    pub crossing_passes: usize,
    pub force: ForceConfig,
    pub columns: ColumnConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            algorithm: LayoutAlgorithm::Hierarchical,
            direction: Direction::TopDown,
            horizontal_spacing: 80.0,
            vertical_spacing: 100.0,
            crossing_passes: 8,
            force: ForceConfig::default(),
            columns: ColumnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Clearance kept around every shape.
    pub margin: f32,
    /// Extra cost for every change of axis.
    pub bend_penalty: f32,
    /// A* gives up (and falls back to a straight line) after this many expansions.
    pub max_expansions: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            margin: 15.0,
            bend_penalty: 50.0,
            max_expansions: 200_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Degrees from perpendicular allowed for elbowed arrows.
    pub elbow_angle_tolerance: f32,
    /// Degrees from perpendicular allowed for straight arrows.
    pub straight_angle_tolerance: f32,
    /// Pixel offset under which a slanted line could be made straight.
    pub could_be_straight_threshold: f32,
    pub min_segment_length: f32,
    /// Endpoints this close to a box count as attached to it.
    pub binding_proximity: f32,
    /// Endpoints this close to a box are checked for entry angle.
    pub entry_proximity: f32,
    /// Inset applied to a box before sampling segment points against it.
    pub interior_margin: f32,
    pub min_interior_hits: usize,
    /// Parametric margin excluded at segment ends when intersecting.
    pub intersection_margin: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            elbow_angle_tolerance: 5.0,
            straight_angle_tolerance: 45.0,
            could_be_straight_threshold: 10.0,
            min_segment_length: 5.0,
            binding_proximity: 10.0,
            entry_proximity: 15.0,
            interior_margin: 2.0,
            min_interior_hits: 2,
            intersection_margin: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub routing: RoutingConfig,
    pub validator: ValidatorConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().parse::<f32>().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    algorithm: Option<String>,
    direction: Option<String>,
    horizontal_spacing: Option<NumberOrString>,
    vertical_spacing: Option<NumberOrString>,
    crossing_passes: Option<usize>,
    force: Option<ForceConfigFile>,
    two_column: Option<bool>,
    target_aspect_ratio: Option<NumberOrString>,
    aspect_ratio_tolerance: Option<NumberOrString>,
    column_gap: Option<NumberOrString>,
    min_layers_to_split: Option<usize>,
    routing: Option<RoutingConfigFile>,
    validator: Option<ValidatorConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForceConfigFile {
    iterations: Option<usize>,
    repulsion: Option<NumberOrString>,
    attraction: Option<NumberOrString>,
    damping: Option<NumberOrString>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    margin: Option<NumberOrString>,
    bend_penalty: Option<NumberOrString>,
    max_expansions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorConfigFile {
    elbow_angle_tolerance: Option<NumberOrString>,
    straight_angle_tolerance: Option<NumberOrString>,
    could_be_straight_threshold: Option<NumberOrString>,
    min_segment_length: Option<NumberOrString>,
}

fn set_f32(target: &mut f32, value: Option<&NumberOrString>) {
    if let Some(v) = value.and_then(NumberOrString::as_f32) {
        *target = v;
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("parsing config file {}", path.display()))
}

/// Parses a config document. Strict JSON first, JSON5 as the lenient fallback.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(json_err) => json5::from_str::<ConfigFile>(contents).map_err(|_| json_err)?,
    };
    let mut config = Config::default();

    if let Some(name) = parsed.algorithm.as_deref() {
        config.layout.algorithm = name.parse()?;
    }
    if let Some(token) = parsed.direction.as_deref() {
        config.layout.direction = token.parse()?;
    }
    set_f32(
        &mut config.layout.horizontal_spacing,
        parsed.horizontal_spacing.as_ref(),
    );
    set_f32(
        &mut config.layout.vertical_spacing,
        parsed.vertical_spacing.as_ref(),
    );
    if let Some(v) = parsed.crossing_passes {
        config.layout.crossing_passes = v;
    }

    if let Some(force) = parsed.force {
        if let Some(v) = force.iterations {
            config.layout.force.iterations = v;
        }
        set_f32(&mut config.layout.force.repulsion, force.repulsion.as_ref());
        set_f32(&mut config.layout.force.attraction, force.attraction.as_ref());
        set_f32(&mut config.layout.force.damping, force.damping.as_ref());
        if force.seed.is_some() {
            config.layout.force.seed = force.seed;
        }
    }

    let columns = &mut config.layout.columns;
    if let Some(v) = parsed.two_column {
        columns.enabled = v;
    }
    set_f32(
        &mut columns.target_aspect_ratio,
        parsed.target_aspect_ratio.as_ref(),
    );
    set_f32(
        &mut columns.aspect_ratio_tolerance,
        parsed.aspect_ratio_tolerance.as_ref(),
    );
    set_f32(&mut columns.column_gap, parsed.column_gap.as_ref());
    if let Some(v) = parsed.min_layers_to_split {
        columns.min_layers = v;
    }

    if let Some(routing) = parsed.routing {
        set_f32(&mut config.routing.margin, routing.margin.as_ref());
        set_f32(&mut config.routing.bend_penalty, routing.bend_penalty.as_ref());
        if let Some(v) = routing.max_expansions {
            config.routing.max_expansions = v;
        }
    }

    if let Some(validator) = parsed.validator {
        let target = &mut config.validator;
        set_f32(
            &mut target.elbow_angle_tolerance,
            validator.elbow_angle_tolerance.as_ref(),
        );
        set_f32(
            &mut target.straight_angle_tolerance,
            validator.straight_angle_tolerance.as_ref(),
        );
        set_f32(
            &mut target.could_be_straight_threshold,
            validator.could_be_straight_threshold.as_ref(),
        );
        set_f32(
            &mut target.min_segment_length,
            validator.min_segment_length.as_ref(),
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.layout.algorithm, LayoutAlgorithm::Hierarchical);
        assert_eq!(config.layout.horizontal_spacing, 80.0);
        assert_eq!(config.routing.margin, 15.0);
        assert_eq!(config.validator.elbow_angle_tolerance, 5.0);
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse_config(
            r#"{
                "algorithm": "force",
                "direction": "LR",
                "horizontalSpacing": "60",
                "twoColumn": true,
                "columnGap": 120,
                "force": {"seed": 7},
                "routing": {"margin": 20, "bendPenalty": 80}
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout.algorithm, LayoutAlgorithm::Force);
        assert_eq!(config.layout.direction, Direction::LeftRight);
        assert_eq!(config.layout.horizontal_spacing, 60.0);
        assert!(config.layout.columns.enabled);
        assert_eq!(config.layout.columns.column_gap, 120.0);
        assert_eq!(config.layout.force.seed, Some(7));
        assert_eq!(config.routing.bend_penalty, 80.0);
    }

    #[test]
    fn json5_fallback_accepts_comments() {
        let config = parse_config("{ // tighter layers\n verticalSpacing: 40, }").unwrap();
        assert_eq!(config.layout.vertical_spacing, 40.0);
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let err = parse_config(r#"{"algorithm": "radial"}"#).unwrap_err();
        assert!(err.to_string().contains("radial"));
    }
}
