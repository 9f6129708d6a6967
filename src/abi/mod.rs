//! Kernel ABI constants for the bpf(2) syscall.
//!
//! Every numeric value here mirrors `include/uapi/linux/bpf.h`. Other modules
//! import these instead of redefining them.

use bitflags::bitflags;
use std::fmt;

pub mod attr;
pub mod name;

pub use attr::{AttrRecord, MapCreateAttr, ObjPinAttr, ProgLoadAttr};
pub use name::{NameError, ObjName};

/// Size of the kernel's object name field, terminator included
pub const BPF_OBJ_NAME_LEN: usize = 16;

/// Size of one `struct bpf_insn` record
pub const BPF_INSN_SIZE: usize = 8;

/// Canonical bpffs mount point
pub const BPF_DIR_MNT: &str = "/sys/fs/bpf";

/// Subdirectory holding globally shared pins
pub const BPF_DIR_GLOBALS: &str = "globals";

/// `statfs` magic of a bpffs mount
pub const BPF_FS_MAGIC: i64 = 0xcafe_4a11;

// Flags for BPF_MAP_UPDATE_ELEM
pub const BPF_ANY: u64 = 0;
pub const BPF_NOEXIST: u64 = 1;
pub const BPF_EXIST: u64 = 2;

/// bpf(2) command codes (`enum bpf_cmd`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    MapCreate = 0,
    MapLookupElem = 1,
    MapUpdateElem = 2,
    MapDeleteElem = 3,
    MapGetNextKey = 4,
    ProgLoad = 5,
    ObjPin = 6,
    ObjGet = 7,
    ProgAttach = 8,
    ProgDetach = 9,
    ProgTestRun = 10,
    ProgGetNextId = 11,
    MapGetNextId = 12,
    ProgGetFdById = 13,
    MapGetFdById = 14,
    ObjGetInfoByFd = 15,
}

impl Command {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Kernel spelling, e.g. `BPF_MAP_CREATE`
    pub fn name(self) -> &'static str {
        match self {
            Command::MapCreate => "BPF_MAP_CREATE",
            Command::MapLookupElem => "BPF_MAP_LOOKUP_ELEM",
            Command::MapUpdateElem => "BPF_MAP_UPDATE_ELEM",
            Command::MapDeleteElem => "BPF_MAP_DELETE_ELEM",
            Command::MapGetNextKey => "BPF_MAP_GET_NEXT_KEY",
            Command::ProgLoad => "BPF_PROG_LOAD",
            Command::ObjPin => "BPF_OBJ_PIN",
            Command::ObjGet => "BPF_OBJ_GET",
            Command::ProgAttach => "BPF_PROG_ATTACH",
            Command::ProgDetach => "BPF_PROG_DETACH",
            Command::ProgTestRun => "BPF_PROG_TEST_RUN",
            Command::ProgGetNextId => "BPF_PROG_GET_NEXT_ID",
            Command::MapGetNextId => "BPF_MAP_GET_NEXT_ID",
            Command::ProgGetFdById => "BPF_PROG_GET_FD_BY_ID",
            Command::MapGetFdById => "BPF_MAP_GET_FD_BY_ID",
            Command::ObjGetInfoByFd => "BPF_OBJ_GET_INFO_BY_FD",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map types as defined in linux/bpf.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MapType {
    Unspec = 0,
    Hash = 1,
    Array = 2,
    ProgArray = 3,
    PerfEventArray = 4,
    PerCpuHash = 5,
    PerCpuArray = 6,
    StackTrace = 7,
    CgroupArray = 8,
    LruHash = 9,
    LruPerCpuHash = 10,
    LpmTrie = 11,
    ArrayOfMaps = 12,
    HashOfMaps = 13,
    DevMap = 14,
}

const MAP_TYPE_NAMES: &[(MapType, &str)] = &[
    (MapType::Unspec, "unspec"),
    (MapType::Hash, "hash"),
    (MapType::Array, "array"),
    (MapType::ProgArray, "prog_array"),
    (MapType::PerfEventArray, "perf_event_array"),
    (MapType::PerCpuHash, "percpu_hash"),
    (MapType::PerCpuArray, "percpu_array"),
    (MapType::StackTrace, "stack_trace"),
    (MapType::CgroupArray, "cgroup_array"),
    (MapType::LruHash, "lru_hash"),
    (MapType::LruPerCpuHash, "lru_percpu_hash"),
    (MapType::LpmTrie, "lpm_trie"),
    (MapType::ArrayOfMaps, "array_of_maps"),
    (MapType::HashOfMaps, "hash_of_maps"),
    (MapType::DevMap, "devmap"),
];

impl MapType {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        MAP_TYPE_NAMES
            .iter()
            .find(|(t, _)| t.as_raw() == value)
            .map(|(t, _)| *t)
    }

    /// Looks up a map type by its lowercase name (`hash`, `lru_hash`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        MAP_TYPE_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(t, _)| *t)
    }

    pub fn name(self) -> &'static str {
        MAP_TYPE_NAMES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, n)| *n)
            .unwrap_or("unspec")
    }

    /// Map-of-maps kinds take an inner map descriptor at creation time
    pub fn is_map_of_maps(self) -> bool {
        matches!(self, MapType::ArrayOfMaps | MapType::HashOfMaps)
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}

/// Program types as defined in linux/bpf.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProgramType {
    Unspec = 0,
    SocketFilter = 1,
    Kprobe = 2,
    SchedCls = 3,
    SchedAct = 4,
    Tracepoint = 5,
    Xdp = 6,
    PerfEvent = 7,
}

impl ProgramType {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Maps a program-type tag onto its kernel code.
    ///
    /// Returns `None` for tags that are not in the table; callers decide
    /// whether that is an error.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "xdp" => Some(ProgramType::Xdp),
            "socket" | "socket_filter" => Some(ProgramType::SocketFilter),
            "kprobe" => Some(ProgramType::Kprobe),
            "classifier" | "tc" | "sched_cls" => Some(ProgramType::SchedCls),
            "action" | "sched_act" => Some(ProgramType::SchedAct),
            "tracepoint" => Some(ProgramType::Tracepoint),
            "perf_event" => Some(ProgramType::PerfEvent),
            "unspec" => Some(ProgramType::Unspec),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgramType::Unspec => "UNSPEC",
            ProgramType::SocketFilter => "SOCKET_FILTER",
            ProgramType::Kprobe => "KPROBE",
            ProgramType::SchedCls => "SCHED_CLS",
            ProgramType::SchedAct => "SCHED_ACT",
            ProgramType::Tracepoint => "TRACEPOINT",
            ProgramType::Xdp => "XDP",
            ProgramType::PerfEvent => "PERF_EVENT",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// `map_flags` accepted at map creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        const NO_PREALLOC = 1 << 0;
        const NO_COMMON_LRU = 1 << 1;
        const NUMA_NODE = 1 << 2;
    }
}

impl MapFlags {
    /// Parses a comma separated list such as `no-prealloc,no-common-lru`
    pub fn from_names(list: &str) -> Option<Self> {
        let mut flags = MapFlags::empty();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            flags |= match part.to_ascii_lowercase().replace('-', "_").as_str() {
                "no_prealloc" => MapFlags::NO_PREALLOC,
                "no_common_lru" => MapFlags::NO_COMMON_LRU,
                "numa_node" => MapFlags::NUMA_NODE,
                _ => return None,
            };
        }
        Some(flags)
    }
}

/// Pinning policy carried in a map definition (iproute2 `PIN_*` values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PinningMode {
    #[default]
    None = 0,
    ObjectNamespace = 1,
    GlobalNamespace = 2,
    CustomNamespace = 3,
}

impl PinningMode {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(PinningMode::None),
            1 => Some(PinningMode::ObjectNamespace),
            2 => Some(PinningMode::GlobalNamespace),
            3 => Some(PinningMode::CustomNamespace),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(PinningMode::None),
            "object" | "object_ns" => Some(PinningMode::ObjectNamespace),
            "global" | "global_ns" => Some(PinningMode::GlobalNamespace),
            "custom" | "custom_ns" => Some(PinningMode::CustomNamespace),
            _ => None,
        }
    }
}

impl fmt::Display for PinningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PinningMode::None => "none",
            PinningMode::ObjectNamespace => "object",
            PinningMode::GlobalNamespace => "global",
            PinningMode::CustomNamespace => "custom",
        };
        f.write_str(s)
    }
}
