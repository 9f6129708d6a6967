//! Fixed-layout attribute records passed to bpf(2).
//!
//! Each record is a prefix of `union bpf_attr` for one command. The kernel
//! zero-extends a short attribute, so only the fields this crate fills are
//! declared. Pointer fields are stored as `u64` the way the kernel expects;
//! the `'a` lifetime keeps the pointed-to buffers borrowed for as long as
//! the record exists, which covers the whole blocking call.

use super::{ObjName, BPF_OBJ_NAME_LEN};
use std::ffi::CStr;
use std::marker::PhantomData;
use std::mem::size_of;
use std::os::fd::{AsRawFd, BorrowedFd};

/// A record that can be handed to the gateway as raw bytes.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain no padding bytes and consist
/// only of integer fields (plus zero-sized markers), so that every byte of
/// the value is initialised.
pub unsafe trait AttrRecord: Sized {
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: guaranteed padding-free plain data by the trait contract.
        unsafe { std::slice::from_raw_parts_mut(self as *mut Self as *mut u8, size_of::<Self>()) }
    }
}

/// `BPF_MAP_CREATE` attributes.
///
/// | offset | field          |
/// |--------|----------------|
/// | 0      | `map_type`     |
/// | 4      | `key_size`     |
/// | 8      | `value_size`   |
/// | 12     | `max_entries`  |
/// | 16     | `map_flags`    |
/// | 20     | `inner_map_fd` |
/// | 24     | `numa_node`    |
/// | 28     | `map_name[16]` |
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapCreateAttr {
    pub map_type: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub map_flags: u32,
    pub inner_map_fd: u32,
    pub numa_node: u32,
    pub map_name: [u8; BPF_OBJ_NAME_LEN],
}

unsafe impl AttrRecord for MapCreateAttr {}

/// `BPF_OBJ_PIN` / `BPF_OBJ_GET` attributes.
///
/// | offset | field        |
/// |--------|--------------|
/// | 0      | `pathname`   |
/// | 8      | `bpf_fd`     |
/// | 12     | `file_flags` |
#[repr(C)]
#[derive(Debug)]
pub struct ObjPinAttr<'a> {
    pub pathname: u64,
    pub bpf_fd: u32,
    pub file_flags: u32,
    _borrow: PhantomData<&'a CStr>,
}

impl<'a> ObjPinAttr<'a> {
    /// Request binding `fd` to `path`
    pub fn pin(fd: BorrowedFd<'a>, path: &'a CStr) -> Self {
        Self {
            pathname: path.as_ptr() as u64,
            bpf_fd: fd.as_raw_fd() as u32,
            file_flags: 0,
            _borrow: PhantomData,
        }
    }

    /// Request a new descriptor for the object pinned at `path`
    pub fn get(path: &'a CStr) -> Self {
        Self {
            pathname: path.as_ptr() as u64,
            bpf_fd: 0,
            file_flags: 0,
            _borrow: PhantomData,
        }
    }
}

unsafe impl AttrRecord for ObjPinAttr<'_> {}

/// `BPF_PROG_LOAD` attributes.
///
/// | offset | field                  |
/// |--------|------------------------|
/// | 0      | `prog_type`            |
/// | 4      | `insn_cnt`             |
/// | 8      | `insns`                |
/// | 16     | `license`              |
/// | 24     | `log_level`            |
/// | 28     | `log_size`             |
/// | 32     | `log_buf`              |
/// | 40     | `kern_version`         |
/// | 44     | `prog_flags`           |
/// | 48     | `prog_name[16]`        |
/// | 64     | `prog_ifindex`         |
/// | 68     | `expected_attach_type` |
#[repr(C)]
#[derive(Debug)]
pub struct ProgLoadAttr<'a> {
    pub prog_type: u32,
    pub insn_cnt: u32,
    pub insns: u64,
    pub license: u64,
    pub log_level: u32,
    pub log_size: u32,
    pub log_buf: u64,
    pub kern_version: u32,
    pub prog_flags: u32,
    pub prog_name: [u8; BPF_OBJ_NAME_LEN],
    pub prog_ifindex: u32,
    pub expected_attach_type: u32,
    _borrow: PhantomData<(&'a [u8], &'a CStr, &'a mut [u8])>,
}

impl<'a> ProgLoadAttr<'a> {
    /// `insns` must already be a whole number of instructions and `log`
    /// at most `u32::MAX` bytes; the loader checks both.
    pub fn new(
        prog_type: u32,
        insns: &'a [u8],
        license: &'a CStr,
        log: Option<(&'a mut [u8], u32)>,
        name: Option<&ObjName>,
    ) -> Self {
        let (log_buf, log_size, log_level) = match log {
            Some((buf, level)) if !buf.is_empty() => {
                (buf.as_mut_ptr() as u64, buf.len() as u32, level)
            }
            _ => (0, 0, 0),
        };
        Self {
            prog_type,
            insn_cnt: (insns.len() / super::BPF_INSN_SIZE) as u32,
            insns: insns.as_ptr() as u64,
            license: license.as_ptr() as u64,
            log_level,
            log_size,
            log_buf,
            kern_version: 0,
            prog_flags: 0,
            prog_name: name.map(ObjName::to_bytes).unwrap_or_default(),
            prog_ifindex: 0,
            expected_attach_type: 0,
            _borrow: PhantomData,
        }
    }
}

unsafe impl AttrRecord for ProgLoadAttr<'_> {}
