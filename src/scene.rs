use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::{Arrow, Point, ShapeBox};
use crate::ir::ShapeKind;

/// The input document itself is unusable. Kept apart from validation
/// findings, which describe a well-formed drawing.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scene: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Boxes and arrows read back from an Excalidraw-style drawing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub boxes: Vec<ShapeBox>,
    pub arrows: Vec<Arrow>,
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    #[serde(default)]
    elements: Vec<SceneElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneElement {
    #[serde(rename = "type")]
    element_type: String,
    #[serde(default = "unknown_id")]
    id: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    points: Option<Vec<Point>>,
    #[serde(default)]
    elbowed: bool,
    #[serde(default)]
    start_binding: Option<BindingRef>,
    #[serde(default)]
    end_binding: Option<BindingRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindingRef {
    #[serde(default)]
    element_id: Option<String>,
}

fn unknown_id() -> String {
    "unknown".to_string()
}

/// Parses a scene document. Shapes become boxes, `arrow` elements become
/// arrows and every other element type is skipped.
pub fn parse_scene(contents: &str) -> Result<Scene, SceneError> {
    let file: SceneFile = serde_json::from_str(contents)?;
    let mut scene = Scene::default();
    for element in file.elements {
        if let Some(shape) = ShapeKind::from_element_type(&element.element_type) {
            scene.boxes.push(ShapeBox::new(
                &element.id,
                element.x,
                element.y,
                element.width,
                element.height,
                shape,
            ));
        } else if element.element_type == "arrow" {
            scene.arrows.push(Arrow {
                id: element.id,
                x: element.x,
                y: element.y,
                points: element.points.unwrap_or_else(|| vec![(0.0, 0.0)]),
                elbowed: element.elbowed,
                start_binding: element.start_binding.and_then(|b| b.element_id),
                end_binding: element.end_binding.and_then(|b| b.element_id),
                label: None,
            });
        }
    }
    Ok(scene)
}

pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    let contents = fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scene(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_boxes_and_arrows() {
        let scene = parse_scene(
            r#"{
                "type": "excalidraw",
                "elements": [
                    {"type": "rectangle", "id": "r", "x": 10, "y": 20, "width": 100, "height": 50},
                    {"type": "diamond", "id": "d", "x": 0, "y": 200, "width": 80, "height": 80},
                    {"type": "text", "id": "t", "x": 0, "y": 0, "text": "hello"},
                    {
                        "type": "arrow", "id": "a", "x": 60, "y": 70,
                        "points": [[0, 0], [0, 130]],
                        "elbowed": true,
                        "startBinding": {"elementId": "r", "focus": 0, "gap": 1},
                        "endBinding": null
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(scene.boxes.len(), 2);
        assert_eq!(scene.boxes[1].shape, ShapeKind::Diamond);
        assert_eq!(scene.arrows.len(), 1);
        let arrow = &scene.arrows[0];
        assert_eq!(arrow.start_binding.as_deref(), Some("r"));
        assert_eq!(arrow.end_binding, None);
        assert_eq!(arrow.end_point(), (60.0, 200.0));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let scene = parse_scene(r#"{"elements": [{"type": "arrow"}]}"#).unwrap();
        assert_eq!(scene.arrows[0].id, "unknown");
        assert_eq!(scene.arrows[0].points, vec![(0.0, 0.0)]);
        assert!(!scene.arrows[0].elbowed);
        assert_eq!(parse_scene("{}").unwrap(), Scene::default());
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(matches!(parse_scene("not json"), Err(SceneError::Parse(_))));
        assert!(matches!(
            parse_scene(r#"{"elements": [{"id": "no-type"}]}"#),
            Err(SceneError::Parse(_))
        ));
        assert!(matches!(
            load_scene(Path::new("/definitely/not/here.excalidraw")),
            Err(SceneError::Io { .. })
        ));
    }
}
