//! Recording stand-in for the kernel used by unit tests.

use super::{Gateway, Result, SyscallError};
use crate::abi::Command;
use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::fd::{IntoRawFd, RawFd};
use std::path::PathBuf;

type Responder = Box<dyn Fn(Command, &mut [u8]) -> std::result::Result<RawFd, i32>>;

/// One observed bpf(2) call
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub command: Command,
    pub attr: Vec<u8>,
}

impl Call {
    pub fn u32_at(&self, offset: usize) -> u32 {
        u32::from_ne_bytes(self.attr[offset..offset + 4].try_into().unwrap())
    }

    pub fn u64_at(&self, offset: usize) -> u64 {
        u64::from_ne_bytes(self.attr[offset..offset + 8].try_into().unwrap())
    }
}

pub(crate) struct FakeGateway {
    calls: RefCell<Vec<Call>>,
    responder: Responder,
}

/// A real descriptor the caller may close
pub(crate) fn null_fd() -> RawFd {
    File::open("/dev/null").unwrap().into_raw_fd()
}

/// Reads the NUL terminated path referenced by an `ObjPinAttr`
pub(crate) fn pin_path(attr: &[u8]) -> PathBuf {
    let ptr = u64::from_ne_bytes(attr[0..8].try_into().unwrap()) as *const c_char;
    // SAFETY: the pinning engine keeps the path alive for the whole call.
    let path = unsafe { CStr::from_ptr(ptr) };
    PathBuf::from(path.to_str().unwrap())
}

impl fmt::Debug for FakeGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeGateway")
            .field("calls", &self.calls.borrow().len())
            .finish()
    }
}

impl FakeGateway {
    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(Command, &mut [u8]) -> std::result::Result<RawFd, i32> + 'static,
    {
        Self {
            calls: RefCell::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Behaves like a kernel that accepts everything. `BPF_OBJ_PIN` leaves
    /// a file at the requested path, standing in for the bpffs entry.
    pub fn succeeding() -> Self {
        Self::with(|command, attr| match command {
            Command::ObjPin => {
                let path = pin_path(attr);
                OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(|_| libc::EEXIST)?;
                Ok(0)
            }
            _ => Ok(null_fd()),
        })
    }

    pub fn failing(code: i32) -> Self {
        Self::with(move |_, _| Err(code))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

unsafe impl Gateway for FakeGateway {
    fn invoke(&self, command: Command, attr: &mut [u8]) -> Result<RawFd> {
        self.calls.borrow_mut().push(Call {
            command,
            attr: attr.to_vec(),
        });
        (self.responder)(command, attr).map_err(|code| SyscallError::new(command, code))
    }
}
