use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::ValidatorConfig;
use crate::geometry::{Arrow, Point, ShapeBox, direction, distance, is_horizontal, is_vertical};

/// Angle within which a slanted single-segment line already counts as straight.
const AXIS_TOLERANCE_DEG: f32 = 5.0;
/// Segments shorter than this are never sampled against boxes.
const MIN_SAMPLED_LENGTH: f32 = 1.0;
/// Minimum samples taken along a segment, and pixels per extra sample.
const MIN_SAMPLES: usize = 10;
const PIXELS_PER_SAMPLE: f32 = 5.0;
/// Determinants below this treat two segments as parallel.
const PARALLEL_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Definitely wrong, such as a line through a box.
    Error,
    /// Likely wrong: bad entry angles, avoidable crossings.
    Warning,
    /// Could be improved.
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    LineCrossesBox,
    ElbowNotPerpendicular,
    BadEntryAngle,
    LineCrossing,
    CouldBeStraight,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::LineCrossesBox => "line_crosses_box",
            IssueType::ElbowNotPerpendicular => "elbow_not_perpendicular",
            IssueType::BadEntryAngle => "bad_entry_angle",
            IssueType::LineCrossing => "line_crossing",
            IssueType::CouldBeStraight => "could_be_straight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub issue_type: IssueType,
    pub message: String,
    pub arrow_id: String,
    pub location: Option<Point>,
    pub details: BTreeMap<String, Value>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity.as_str().to_uppercase(),
            self.issue_type.as_str(),
            self.message
        )?;
        if let Some((x, y)) = self.location {
            write!(f, " at ({x:.1}, {y:.1})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub by_type: BTreeMap<String, usize>,
    pub arrows_checked: usize,
    pub boxes_checked: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    fn new(issues: Vec<ValidationIssue>, boxes: usize, arrows: usize) -> Self {
        let mut summary = ValidationSummary {
            total_issues: issues.len(),
            arrows_checked: arrows,
            boxes_checked: boxes,
            ..ValidationSummary::default()
        };
        for issue in &issues {
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.info += 1,
            }
            *summary
                .by_type
                .entry(issue.issue_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Self { issues, summary }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues ordered by severity, then type. The sort is stable.
    pub fn sorted_issues(&self) -> Vec<&ValidationIssue> {
        let mut issues: Vec<&ValidationIssue> = self.issues.iter().collect();
        issues.sort_by_key(|issue| (issue.severity, issue.issue_type));
        issues
    }
}

/// Post-hoc geometry checks over a finished set of boxes and arrows.
///
/// The validator knows nothing about how arrows were routed. All checks run
/// and their findings accumulate in a fixed order: box crossings, entry
/// angles, arrow crossings, then straightening hints.
#[derive(Debug, Clone, Default)]
pub struct RoutingValidator {
    config: ValidatorConfig,
}

impl RoutingValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, boxes: &[ShapeBox], arrows: &[Arrow]) -> ValidationReport {
        let mut issues = Vec::new();
        self.check_lines_crossing_boxes(boxes, arrows, &mut issues);
        self.check_entry_angles(boxes, arrows, &mut issues);
        self.check_line_crossings(arrows, &mut issues);
        self.check_could_be_straight(arrows, &mut issues);
        ValidationReport::new(issues, boxes.len(), arrows.len())
    }

    /// Bound boxes plus any box an endpoint sits on or near.
    fn connected_boxes<'a>(&self, boxes: &'a [ShapeBox], arrow: &'a Arrow) -> HashSet<&'a str> {
        let mut connected: HashSet<&str> = HashSet::new();
        connected.extend(arrow.start_binding.as_deref());
        connected.extend(arrow.end_binding.as_deref());
        let start = arrow.start_point();
        let end = arrow.end_point();
        for shape in boxes {
            if shape.contains(start, self.config.binding_proximity)
                || shape.contains(end, self.config.binding_proximity)
            {
                connected.insert(shape.id.as_str());
            }
        }
        connected
    }

    fn check_lines_crossing_boxes(
        &self,
        boxes: &[ShapeBox],
        arrows: &[Arrow],
        issues: &mut Vec<ValidationIssue>,
    ) {
        for arrow in arrows {
            let connected = self.connected_boxes(boxes, arrow);
            for (a, b) in arrow.segments() {
                if distance(a, b) < self.config.min_segment_length {
                    continue;
                }
                for shape in boxes {
                    if connected.contains(shape.id.as_str()) || !self.passes_through(a, b, shape) {
                        continue;
                    }
                    issues.push(ValidationIssue {
                        severity: Severity::Error,
                        issue_type: IssueType::LineCrossesBox,
                        message: format!("Line segment crosses through box {}", shape.id),
                        arrow_id: arrow.id.clone(),
                        location: Some(shape.center()),
                        details: BTreeMap::from([("box_id".to_string(), json!(shape.id))]),
                    });
                }
            }
        }
    }

    /// Samples the open segment and counts points strictly inside the box
    /// shrunk by `interior_margin`.
    fn passes_through(&self, a: Point, b: Point, shape: &ShapeBox) -> bool {
        let length = distance(a, b);
        if length < MIN_SAMPLED_LENGTH {
            return false;
        }
        let samples = MIN_SAMPLES.max((length / PIXELS_PER_SAMPLE) as usize);
        let hits = (1..samples)
            .map(|i| {
                let t = i as f32 / samples as f32;
                (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1))
            })
            .filter(|p| shape.contains_strictly(*p, self.config.interior_margin))
            .count();
        hits >= self.config.min_interior_hits
    }

    fn check_entry_angles(
        &self,
        boxes: &[ShapeBox],
        arrows: &[Arrow],
        issues: &mut Vec<ValidationIssue>,
    ) {
        for arrow in arrows {
            let segments = arrow.segments();
            let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
                continue;
            };
            if distance(first.0, first.1) >= self.config.min_segment_length {
                self.check_entry_angle(boxes, arrow, *first, first.0, true, issues);
            }
            if distance(last.0, last.1) >= self.config.min_segment_length {
                self.check_entry_angle(boxes, arrow, *last, last.1, false, issues);
            }
        }
    }

    fn check_entry_angle(
        &self,
        boxes: &[ShapeBox],
        arrow: &Arrow,
        segment: (Point, Point),
        endpoint: Point,
        is_start: bool,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(shape) = boxes
            .iter()
            .find(|shape| shape.contains(endpoint, self.config.entry_proximity))
        else {
            return;
        };
        let side = shape.nearest_side(endpoint);
        let (nx, ny) = side.outward_normal();
        let (dx, dy) = direction(segment.0, segment.1);
        let dot = (dx * -nx + dy * -ny).abs().clamp(0.0, 1.0);
        let angle = dot.acos().to_degrees();

        let (issue_type, tolerance, prefix) = if arrow.elbowed {
            (
                IssueType::ElbowNotPerpendicular,
                self.config.elbow_angle_tolerance,
                "Elbowed line enters",
            )
        } else {
            (
                IssueType::BadEntryAngle,
                self.config.straight_angle_tolerance,
                "Line enters",
            )
        };
        if angle <= tolerance {
            return;
        }
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            issue_type,
            message: format!(
                "{prefix} box {} at {angle:.1}° from perpendicular (should be < {tolerance}°)",
                shape.id
            ),
            arrow_id: arrow.id.clone(),
            location: Some(endpoint),
            details: BTreeMap::from([
                ("angle".to_string(), json!(angle)),
                ("edge".to_string(), json!(side.as_str())),
                ("is_start".to_string(), json!(is_start)),
                ("box_id".to_string(), json!(shape.id)),
            ]),
        });
    }

    /// Every segment pair of every arrow pair is tested; a pair of arrows is
    /// reported at most once, at its first intersection.
    fn check_line_crossings(&self, arrows: &[Arrow], issues: &mut Vec<ValidationIssue>) {
        let segments: Vec<Vec<(Point, Point)>> = arrows
            .iter()
            .map(|arrow| {
                arrow
                    .segments()
                    .into_iter()
                    .filter(|(a, b)| distance(*a, *b) >= self.config.min_segment_length)
                    .collect()
            })
            .collect();

        for i in 0..arrows.len() {
            for j in (i + 1)..arrows.len() {
                if arrows[i].id == arrows[j].id {
                    continue;
                }
                let crossing = segments[i].iter().find_map(|first| {
                    segments[j]
                        .iter()
                        .find_map(|second| self.intersection(*first, *second))
                });
                let Some(point) = crossing else {
                    continue;
                };
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    issue_type: IssueType::LineCrossing,
                    message: format!(
                        "Lines cross each other (arrows {} and {})",
                        arrows[i].id, arrows[j].id
                    ),
                    arrow_id: arrows[i].id.clone(),
                    location: Some(point),
                    details: BTreeMap::from([(
                        "other_arrow_id".to_string(),
                        json!(arrows[j].id),
                    )]),
                });
            }
        }
    }

    /// Proper intersection of two segments, ignoring touches within
    /// `intersection_margin` (parametric) of either segment's ends.
    fn intersection(&self, s1: (Point, Point), s2: (Point, Point)) -> Option<Point> {
        let ((x1, y1), (x2, y2)) = s1;
        let ((x3, y3), (x4, y4)) = s2;
        let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
        let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / denom;
        let margin = self.config.intersection_margin;
        let inside = |v: f32| margin < v && v < 1.0 - margin;
        (inside(t) && inside(u)).then(|| (x1 + t * (x2 - x1), y1 + t * (y2 - y1)))
    }

    fn check_could_be_straight(&self, arrows: &[Arrow], issues: &mut Vec<ValidationIssue>) {
        let threshold = self.config.could_be_straight_threshold;
        for arrow in arrows {
            if arrow.elbowed || arrow.points.len() != 2 {
                continue;
            }
            let (start, end) = (arrow.start_point(), arrow.end_point());
            if distance(start, end) < self.config.min_segment_length {
                continue;
            }
            let dx = (end.0 - start.0).abs();
            let dy = (end.1 - start.1).abs();
            let suggestion = if dx < threshold && dy > dx * 3.0 {
                (!is_vertical(start, end, AXIS_TOLERANCE_DEG)).then_some(("vertical", "dx", dx))
            } else if dy < threshold && dx > dy * 3.0 {
                (!is_horizontal(start, end, AXIS_TOLERANCE_DEG)).then_some(("horizontal", "dy", dy))
            } else {
                None
            };
            let Some((axis, delta, offset)) = suggestion else {
                continue;
            };
            issues.push(ValidationIssue {
                severity: Severity::Info,
                issue_type: IssueType::CouldBeStraight,
                message: format!("Line could be {axis} ({delta}={offset:.1}px)"),
                arrow_id: arrow.id.clone(),
                location: Some(start),
                details: BTreeMap::from([
                    ("suggested".to_string(), json!(axis)),
                    ("offset".to_string(), json!(offset)),
                ]),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ShapeKind;

    fn rect(id: &str, x: f32, y: f32, w: f32, h: f32) -> ShapeBox {
        ShapeBox::new(id, x, y, w, h, ShapeKind::Rectangle)
    }

    fn straight(id: &str, points: &[Point]) -> Arrow {
        let mut arrow = Arrow::from_waypoints(id, points);
        arrow.elbowed = false;
        arrow
    }

    fn validate(boxes: &[ShapeBox], arrows: &[Arrow]) -> ValidationReport {
        RoutingValidator::default().validate(boxes, arrows)
    }

    fn of_type(report: &ValidationReport, issue_type: IssueType) -> Vec<&ValidationIssue> {
        report
            .issues
            .iter()
            .filter(|issue| issue.issue_type == issue_type)
            .collect()
    }

    #[test]
    fn line_through_unrelated_box_is_an_error() {
        let boxes = [rect("obstacle", 100.0, 100.0, 100.0, 100.0)];
        let arrows = [straight("a", &[(0.0, 150.0), (300.0, 150.0)])];
        let report = validate(&boxes, &arrows);
        let crossings = of_type(&report, IssueType::LineCrossesBox);
        assert!(!crossings.is_empty());
        assert_eq!(crossings[0].severity, Severity::Error);
        assert_eq!(crossings[0].details["box_id"], json!("obstacle"));
        assert_eq!(report.summary.errors, crossings.len());
    }

    #[test]
    fn bound_and_adjacent_boxes_are_not_crossings() {
        let boxes = [
            rect("src", 0.0, 0.0, 100.0, 100.0),
            rect("dst", 0.0, 300.0, 100.0, 100.0),
        ];
        // Starts inside its source, which is allowed once bound.
        let arrows =
            [Arrow::from_waypoints("a", &[(50.0, 50.0), (50.0, 300.0)]).bound("src", "dst")];
        let report = validate(&boxes, &arrows);
        assert!(of_type(&report, IssueType::LineCrossesBox).is_empty());
    }

    #[test]
    fn skimming_a_box_edge_is_not_a_crossing() {
        let boxes = [rect("b", 100.0, 100.0, 100.0, 100.0)];
        let arrows = [straight("edge", &[(0.0, 101.0), (300.0, 101.0)])];
        let report = validate(&boxes, &arrows);
        assert!(of_type(&report, IssueType::LineCrossesBox).is_empty());
    }

    #[test]
    fn crossing_arrows_reported_once_per_pair() {
        let arrows = [
            straight("h", &[(0.0, 50.0), (100.0, 50.0)]),
            // Two segments of the same arrow cross `h`.
            straight("v", &[(20.0, 0.0), (20.0, 100.0), (80.0, 100.0), (80.0, 0.0)]),
        ];
        let report = validate(&[], &arrows);
        let crossings = of_type(&report, IssueType::LineCrossing);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].arrow_id, "h");
        assert_eq!(crossings[0].details["other_arrow_id"], json!("v"));
        let (x, y) = crossings[0].location.unwrap();
        assert!((x - 20.0).abs() < 1e-3 && (y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn later_segment_crossings_are_found() {
        let arrows = [
            straight("a", &[(0.0, 0.0), (0.0, 10.0), (100.0, 10.0), (100.0, 200.0)]),
            straight("b", &[(50.0, 100.0), (150.0, 100.0)]),
        ];
        let report = validate(&[], &arrows);
        assert_eq!(of_type(&report, IssueType::LineCrossing).len(), 1);
    }

    #[test]
    fn shared_endpoints_do_not_cross() {
        let arrows = [
            straight("a", &[(0.0, 0.0), (100.0, 0.0)]),
            straight("b", &[(100.0, 0.0), (100.0, 100.0)]),
        ];
        let report = validate(&[], &arrows);
        assert!(of_type(&report, IssueType::LineCrossing).is_empty());
    }

    #[test]
    fn slanted_elbow_entry_is_flagged() {
        let boxes = [rect("t", 100.0, 100.0, 100.0, 100.0)];
        let arrows = [Arrow::from_waypoints("e", &[(150.0, 0.0), (120.0, 100.0)])];
        let report = validate(&boxes, &arrows);
        let angles = of_type(&report, IssueType::ElbowNotPerpendicular);
        assert_eq!(angles.len(), 1);
        assert_eq!(angles[0].details["edge"], json!("top"));
        assert_eq!(angles[0].details["is_start"], json!(false));
    }

    #[test]
    fn perpendicular_entry_is_clean() {
        let boxes = [rect("t", 100.0, 100.0, 100.0, 100.0)];
        let arrows = [Arrow::from_waypoints("e", &[(150.0, 0.0), (150.0, 100.0)])];
        let report = validate(&boxes, &arrows);
        assert!(report.is_clean(), "{:?}", report.issues);
    }

    #[test]
    fn straight_line_tolerates_moderate_angles() {
        let boxes = [rect("t", 100.0, 100.0, 100.0, 100.0)];
        let arrows = [straight("s", &[(130.0, 0.0), (150.0, 100.0)])];
        let report = validate(&boxes, &arrows);
        assert!(of_type(&report, IssueType::BadEntryAngle).is_empty());
    }

    #[test]
    fn nearly_vertical_line_could_be_straight() {
        let arrows = [straight("s", &[(0.0, 0.0), (9.5, 100.0)])];
        let report = validate(&[], &arrows);
        let hints = of_type(&report, IssueType::CouldBeStraight);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].severity, Severity::Info);
        assert_eq!(hints[0].details["suggested"], json!("vertical"));

        let exact = [straight("v", &[(0.0, 0.0), (0.0, 100.0)])];
        assert!(validate(&[], &exact).is_clean());
    }

    #[test]
    fn degenerate_geometry_does_not_panic() {
        let boxes = [rect("zero", 10.0, 10.0, 0.0, 0.0)];
        let arrows = [
            Arrow::from_waypoints("dot", &[(10.0, 10.0), (10.0, 10.0)]),
            Arrow::from_waypoints("empty", &[]),
        ];
        let report = validate(&boxes, &arrows);
        assert_eq!(report.summary.arrows_checked, 2);
        assert_eq!(report.summary.boxes_checked, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn summary_counts_by_severity_and_type() {
        let boxes = [rect("obstacle", 100.0, 100.0, 100.0, 100.0)];
        let arrows = [
            straight("through", &[(0.0, 150.0), (300.0, 150.0)]),
            straight("tilted", &[(400.0, 0.0), (409.5, 100.0)]),
        ];
        let report = validate(&boxes, &arrows);
        assert_eq!(report.summary.total_issues, report.issues.len());
        assert_eq!(
            report.summary.errors + report.summary.warnings + report.summary.info,
            report.issues.len()
        );
        assert_eq!(report.summary.by_type["could_be_straight"], 1);
        let sorted = report.sorted_issues();
        assert_eq!(sorted[0].severity, Severity::Error);
        assert_eq!(sorted.last().map(|i| i.severity), Some(Severity::Info));
    }

    #[test]
    fn issue_display_matches_report_format() {
        let issue = ValidationIssue {
            severity: Severity::Warning,
            issue_type: IssueType::LineCrossing,
            message: "Lines cross".to_string(),
            arrow_id: "a".to_string(),
            location: Some((1.26, 2.0)),
            details: BTreeMap::new(),
        };
        assert_eq!(issue.to_string(), "[WARNING] line_crossing: Lines cross at (1.3, 2.0)");
    }
}
