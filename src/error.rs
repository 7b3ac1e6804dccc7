#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("expected at least {expected} keypoints, got {got}")]
    InvalidFrame { expected: usize, got: usize },

    #[error("{name} threshold must be finite, got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("standing knee angle {standing} must not be below squatting knee angle {squatting}")]
    InvalidHysteresisBand { standing: f32, squatting: f32 },

    #[error("{name} range is empty: min {min} is greater than max {max}")]
    InvalidRange {
        name: &'static str,
        min: f32,
        max: f32,
    },

    #[error("failed to open input file: {1:?}")]
    OpenInput(#[source] std::io::Error, std::path::PathBuf),

    #[error("failed to read input line {1}")]
    ReadInput(#[source] std::io::Error, usize),

    #[error("failed to parse message on line {1}")]
    ParseMessage(#[source] serde_json::Error, usize),

    #[error("failed to serialize response")]
    SerializeResponse(#[source] serde_json::Error),

    #[error("failed to write response")]
    WriteResponse(#[source] std::io::Error),
}
