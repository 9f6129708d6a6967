use serde::Serialize;
use std::fmt;

/// Coarse classification shared by every error this crate returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller supplied data broke a precondition; no syscall was made
    Validation,
    /// bpf(2) returned an error; the errno is carried verbatim
    KernelRejected,
    /// Pin target already exists or its directories could not be prepared
    FilesystemConflict,
    /// Program load failed; the verifier log is attached
    VerifierRejected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation error",
            ErrorKind::KernelRejected => "kernel rejected",
            ErrorKind::FilesystemConflict => "filesystem conflict",
            ErrorKind::VerifierRejected => "verifier rejected",
        };
        f.write_str(s)
    }
}

/// Renders a raw errno for error messages
pub(crate) fn errno_text(code: &i32) -> std::io::Error {
    std::io::Error::from_raw_os_error(*code)
}
