// renderer/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader '{0}' has no '#pragma type' directive")]
    MissingStage(String),
    #[error("shader '{shader}' declares unknown stage '{stage}'")]
    UnknownStage { shader: String, stage: String },
    #[error("shader '{shader}' has a malformed include: {line}")]
    MalformedInclude { shader: String, line: String },
    #[error("shader '{shader}' includes unknown source '{include}'")]
    UnresolvedInclude { shader: String, include: String },
    #[error("include cycle through '{0}'")]
    IncludeCycle(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramebufferError {
    #[error("{requested} color attachments requested, device supports {max}")]
    TooManyAttachments { requested: usize, max: usize },
    #[error("framebuffer has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },
    #[error("framebuffer incomplete: {0}")]
    Incomplete(String),
}
