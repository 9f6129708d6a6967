//! Pinning kernel objects into bpffs.
//!
//! A pin moves through `Unpinned -> Pinning -> Pinned | PinFailed`. Mode
//! `none` never leaves `Unpinned`. The existence check before the bind is
//! best effort: another process may create the same path between the check
//! and the kernel call, and nothing here serializes access to the mount.

use crate::abi::{ObjName, ObjPinAttr, PinningMode, BPF_DIR_GLOBALS, BPF_DIR_MNT};
use crate::error::{errno_text, ErrorKind};
use crate::syscall::{self, Gateway, LinuxGateway};
use log::{debug, info, warn};
use serde::Serialize;
use std::ffi::CString;
use std::fmt;
use std::fs::{self, DirBuilder};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Component, Path, PathBuf};

/// Error type for pin operations
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("invalid pin path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("object namespace pinning needs an object name")]
    MissingObjectNamespace,

    #[error("custom namespace pinning needs an explicit pin path")]
    CustomPathRequired,

    #[error("error creating directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("aborting, found file at {path:?}")]
    PathExists { path: PathBuf },

    #[error("failed to stat {path:?}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("unable to pin at {path:?}: {}", errno_text(.code))]
    KernelRejected { path: PathBuf, code: i32 },

    #[error("unable to open pinned object {path:?}: {}", errno_text(.code))]
    OpenRejected { path: PathBuf, code: i32 },
}

impl PinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PinError::InvalidPath { .. }
            | PinError::MissingObjectNamespace
            | PinError::CustomPathRequired => ErrorKind::Validation,
            PinError::CreateDir { .. } | PinError::PathExists { .. } | PinError::Stat { .. } => {
                ErrorKind::FilesystemConflict
            }
            PinError::KernelRejected { .. } | PinError::OpenRejected { .. } => {
                ErrorKind::KernelRejected
            }
        }
    }
}

/// Result type for pin operations
pub type Result<T> = std::result::Result<T, PinError>;

/// Where a pin attempt stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinState {
    Unpinned,
    Pinning,
    Pinned,
    PinFailed,
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PinState::Unpinned => "unpinned",
            PinState::Pinning => "pinning",
            PinState::Pinned => "pinned",
            PinState::PinFailed => "pin_failed",
        };
        f.write_str(s)
    }
}

/// Directory layout under the bpffs mount.
///
/// Global pins live in `<root>/<category>/globals/<name>`, object pins in
/// `<root>/<category>/<object>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinLayout {
    root: PathBuf,
    category: String,
}

impl Default for PinLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from(BPF_DIR_MNT),
            category: "tc".to_string(),
        }
    }
}

impl PinLayout {
    pub fn new(root: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            category: category.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self) -> PathBuf {
        self.root.join(&self.category)
    }

    pub fn globals_dir(&self) -> PathBuf {
        self.category_dir().join(BPF_DIR_GLOBALS)
    }

    /// Derives the pin path for `name` under `mode`.
    ///
    /// `Ok(None)` means the mode does not pin at all.
    pub fn path_for(
        &self,
        mode: PinningMode,
        object: Option<&str>,
        name: &ObjName,
    ) -> Result<Option<PathBuf>> {
        if name.is_empty() && mode != PinningMode::None {
            return Err(PinError::InvalidPath {
                path: self.category_dir(),
                reason: "pinned objects need a name",
            });
        }
        match mode {
            PinningMode::None => Ok(None),
            PinningMode::GlobalNamespace => Ok(Some(self.globals_dir().join(name.as_str()))),
            PinningMode::ObjectNamespace => {
                let object = object
                    .filter(|o| is_single_component(o))
                    .ok_or(PinError::MissingObjectNamespace)?;
                Ok(Some(self.category_dir().join(object).join(name.as_str())))
            }
            PinningMode::CustomNamespace => Err(PinError::CustomPathRequired),
        }
    }
}

fn is_single_component(s: &str) -> bool {
    let mut components = Path::new(s).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Binds kernel handles to bpffs paths through a [`Gateway`]
#[derive(Debug, Default)]
pub struct Pinner<G = LinuxGateway> {
    gateway: G,
}

impl<G: Gateway> Pinner<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Pins `fd` at `path` according to `mode`.
    ///
    /// Missing parent directories are created with mode 0755 and left in
    /// place if a later step fails. An existing entry at `path` is never
    /// replaced.
    pub fn pin(&self, fd: BorrowedFd<'_>, mode: PinningMode, path: &Path) -> Result<PinState> {
        if mode == PinningMode::None {
            debug!(
                "pinning disabled for fd {}, staying {:?}",
                fd.as_raw_fd(),
                PinState::Unpinned
            );
            return Ok(PinState::Unpinned);
        }

        debug!(
            "fd {} -> {:?} at {:?}",
            fd.as_raw_fd(),
            PinState::Pinning,
            path
        );
        match self.bind(fd, path) {
            Ok(()) => {
                info!("Pin done with fd {} at {:?}", fd.as_raw_fd(), path);
                Ok(PinState::Pinned)
            }
            Err(e) => {
                warn!("fd {} -> {:?}: {}", fd.as_raw_fd(), PinState::PinFailed, e);
                Err(e)
            }
        }
    }

    fn bind(&self, fd: BorrowedFd<'_>, path: &Path) -> Result<()> {
        let c_path = pin_path_cstring(path)?;

        if let Some(parent) = path.parent() {
            DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(parent)
                .map_err(|source| PinError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        match fs::symlink_metadata(path) {
            Ok(_) => {
                return Err(PinError::PathExists {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(PinError::Stat {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        debug!(
            "Calling BPF_OBJ_PIN for fd {} and path {:?}",
            fd.as_raw_fd(),
            path
        );
        let mut attr = ObjPinAttr::pin(fd, &c_path);
        syscall::obj_pin(&self.gateway, &mut attr).map_err(|e| PinError::KernelRejected {
            path: path.to_path_buf(),
            code: e.code,
        })
    }

    /// Opens the object pinned at `path`, returning a new owned handle
    pub fn open_pinned(&self, path: &Path) -> Result<OwnedFd> {
        let c_path = pin_path_cstring(path)?;
        let mut attr = ObjPinAttr::get(&c_path);
        let fd = syscall::obj_get(&self.gateway, &mut attr).map_err(|e| {
            warn!("Unable to open pinned object at {:?}: {}", path, e);
            PinError::OpenRejected {
                path: path.to_path_buf(),
                code: e.code,
            }
        })?;
        info!("Opened pinned object {:?} as fd {}", path, fd.as_raw_fd());
        Ok(fd)
    }
}

fn pin_path_cstring(path: &Path) -> Result<CString> {
    let invalid = |reason| PinError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };
    if !path.is_absolute() {
        return Err(invalid("must be absolute"));
    }
    if path.file_name().is_none() {
        return Err(invalid("must name a file"));
    }
    CString::new(path.as_os_str().as_bytes()).map_err(|_| invalid("contains a NUL byte"))
}
