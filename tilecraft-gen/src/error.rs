#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid spec: {0}")]
    SpecValidation(String),

    #[error("too many {what}: {count} (max {max})")]
    LimitExceeded { what: &'static str, count: usize, max: usize },

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("layer {layer}: unsupported layer type {kind:?}")]
    UnsupportedLayerType { layer: String, kind: String },

    #[error("layer {layer}: unsupported combine op {op:?}")]
    UnsupportedCombineOp { layer: String, op: String },

    #[error("layer cycle detected at {key}")]
    LayerCycle { key: String },

    #[error("op {index}: unsupported operation {kind:?}")]
    UnsupportedOp { index: usize, kind: String },

    #[error("op {index}: unknown {layer} tile {id:?}")]
    UnknownTile { index: usize, layer: &'static str, id: String },

    #[error("op {index}: invalid prefab: {reason}")]
    InvalidPrefab { index: usize, reason: String },

    #[error("op {index}: {reason}")]
    InvalidOp { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
