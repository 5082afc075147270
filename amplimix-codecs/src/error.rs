use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unrecognized or corrupt container")]
    Unrecognized,
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),
    #[error("symphonia error: {0}")]
    Symphonia(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CodecError> for amplimix_core::decoder::DecoderError {
    fn from(e: CodecError) -> Self {
        amplimix_core::decoder::DecoderError::Other(e.to_string())
    }
}
