//! The single path into the bpf(2) syscall.
//!
//! [`Gateway::invoke`] forwards a command code and an attribute buffer and
//! turns the raw return into a `Result`. It never retries. The typed
//! wrappers below each serialize one record, issue one call and interpret
//! the result for their command; raw addresses never leave this module and
//! [`crate::abi::attr`].

use crate::abi::{AttrRecord, Command, MapCreateAttr, ObjPinAttr, ProgLoadAttr};
use crate::error::errno_text;
use log::trace;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

#[cfg(test)]
pub(crate) mod testing;

/// A failed bpf(2) call, errno kept verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{command} failed: {}", errno_text(.code))]
pub struct SyscallError {
    pub command: Command,
    pub code: i32,
}

impl SyscallError {
    pub fn new(command: Command, code: i32) -> Self {
        Self { command, code }
    }

    pub fn as_io_error(&self) -> io::Error {
        io::Error::from_raw_os_error(self.code)
    }
}

/// Result type for gateway calls
pub type Result<T> = std::result::Result<T, SyscallError>;

/// Issues bpf(2) commands.
///
/// # Safety
///
/// For commands that produce a handle (`BPF_MAP_CREATE`, `BPF_PROG_LOAD`,
/// `BPF_OBJ_GET`, ...) a successful `invoke` must return a newly opened
/// descriptor that nobody else owns; the wrappers below take ownership of
/// it and close it on drop.
pub unsafe trait Gateway {
    /// One kernel transition. Returns the non-negative result on success.
    fn invoke(&self, command: Command, attr: &mut [u8]) -> Result<RawFd>;
}

unsafe impl<G: Gateway + ?Sized> Gateway for &G {
    fn invoke(&self, command: Command, attr: &mut [u8]) -> Result<RawFd> {
        (**self).invoke(command, attr)
    }
}

/// The running kernel, reached through `syscall(SYS_bpf, ...)`
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxGateway;

unsafe impl Gateway for LinuxGateway {
    fn invoke(&self, command: Command, attr: &mut [u8]) -> Result<RawFd> {
        let size = libc::c_uint::try_from(attr.len())
            .map_err(|_| SyscallError::new(command, libc::E2BIG))?;
        // SAFETY: `attr` is a live, exclusively borrowed buffer of `size`
        // bytes for the duration of the call.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_bpf,
                command.as_raw() as libc::c_int,
                attr.as_mut_ptr(),
                size,
            )
        };
        if ret < 0 {
            let code = io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(libc::EINVAL);
            return Err(SyscallError::new(command, code));
        }
        RawFd::try_from(ret).map_err(|_| SyscallError::new(command, libc::EOVERFLOW))
    }
}

fn call<G, A>(gateway: &G, command: Command, attr: &mut A) -> Result<RawFd>
where
    G: Gateway + ?Sized,
    A: AttrRecord,
{
    let bytes = attr.as_bytes_mut();
    trace!("bpf({command}, {} bytes)", bytes.len());
    let ret = gateway.invoke(command, bytes)?;
    if ret < 0 {
        return Err(SyscallError::new(command, libc::EBADF));
    }
    Ok(ret)
}

fn owned(fd: RawFd) -> OwnedFd {
    // SAFETY: the `Gateway` contract hands us sole ownership of `fd`.
    unsafe { OwnedFd::from_raw_fd(fd) }
}

/// `BPF_MAP_CREATE`
pub fn map_create<G: Gateway + ?Sized>(
    gateway: &G,
    attr: &mut MapCreateAttr,
) -> Result<OwnedFd> {
    call(gateway, Command::MapCreate, attr).map(owned)
}

/// `BPF_OBJ_PIN`
pub fn obj_pin<G: Gateway + ?Sized>(gateway: &G, attr: &mut ObjPinAttr<'_>) -> Result<()> {
    call(gateway, Command::ObjPin, attr).map(|_| ())
}

/// `BPF_OBJ_GET`
pub fn obj_get<G: Gateway + ?Sized>(
    gateway: &G,
    attr: &mut ObjPinAttr<'_>,
) -> Result<OwnedFd> {
    call(gateway, Command::ObjGet, attr).map(owned)
}

/// `BPF_PROG_LOAD`
pub fn prog_load<G: Gateway + ?Sized>(
    gateway: &G,
    attr: &mut ProgLoadAttr<'_>,
) -> Result<OwnedFd> {
    call(gateway, Command::ProgLoad, attr).map(owned)
}
