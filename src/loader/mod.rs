//! Module for loading eBPF programs into the kernel

pub mod elf_parser;
pub mod program;

pub use program::{LoadOptions, Program, ProgramLoadRequest, ProgramLoader, DEFAULT_LOG_SIZE};

use crate::abi::NameError;
use crate::error::{errno_text, ErrorKind};

/// Common error type for loader operations
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("instruction blob is empty")]
    EmptyProgram,

    #[error("instruction blob is {len} bytes, not a multiple of the 8-byte instruction size")]
    MisalignedProgram { len: usize },

    #[error("program has {count} instructions, more than the kernel can address")]
    ProgramTooLarge { count: usize },

    #[error("unknown program type {0:?}")]
    UnknownProgramType(String),

    #[error("invalid license string: {0}")]
    InvalidLicense(&'static str),

    #[error("invalid program name: {0}")]
    InvalidName(#[from] NameError),

    #[error("verifier log size {0} is outside 128..=1073741823 bytes")]
    InvalidLogSize(usize),

    #[error("verifier log level {0:#x} must be nonzero and within 0x7 when a log is requested")]
    InvalidLogLevel(u32),

    #[error("program load rejected: {}", errno_text(.code))]
    VerifierRejected { code: i32, log: String },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::VerifierRejected { .. } => ErrorKind::VerifierRejected,
            _ => ErrorKind::Validation,
        }
    }

    /// Raw verifier output, if the kernel produced any
    pub fn verifier_log(&self) -> Option<&str> {
        match self {
            LoadError::VerifierRejected { log, .. } if !log.is_empty() => Some(log),
            _ => None,
        }
    }
}

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoadError>;
