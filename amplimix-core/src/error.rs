use thiserror::Error;

/// Errors surfaced by the control-thread API. Never constructed on the mix
/// hot path — the mix loop degrades silently (see `spec.md` §4.8) and only
/// reports through `tracing`.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("layer handle {0:?} is stale or out of range")]
    InvalidLayerHandle(crate::layer::LayerHandle),

    #[error("filter handle {0:?} is stale or out of range")]
    InvalidFilterHandle(crate::pipeline::FilterHandle),

    #[error("no free mixer layer available (pool exhausted at {0} layers)")]
    LayerPoolExhausted(usize),

    #[error("command queue is full (capacity {0})")]
    CommandQueueFull(usize),

    #[error("fader kind {0:?} is not present in the fader registry")]
    UnknownFader(crate::fader::FaderKind),

    #[error("filter kind {0:?} is not present in the filter registry")]
    UnknownFilter(crate::filters::FilterKind),

    #[error("pipeline stage {0:?} could not be constructed: {1}")]
    PipelineConstruction(&'static str, String),

    #[error("decoder error: {0}")]
    Decoder(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

pub type MixerResult<T> = Result<T, MixerError>;
