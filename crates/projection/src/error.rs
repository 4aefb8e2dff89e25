use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("coordinate ({x}, {y}) is outside the domain of {crs}")]
    OutOfDomain { x: f64, y: f64, crs: String },

    #[error("bounding box cannot be transformed from {from} to {to}")]
    EmptyTransform { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
