use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("unknown layout algorithm `{0}` (expected `hierarchical` or `force`)")]
    UnknownAlgorithm(String),
    #[error("unknown layout direction `{0}` (expected `TB`, `TD` or `LR`)")]
    UnknownDirection(String),
    #[error("node `{id}` has invalid size {width}x{height}; both sides must be positive")]
    InvalidNodeSize { id: String, width: f32, height: f32 },
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
}
