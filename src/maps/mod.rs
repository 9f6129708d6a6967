//! Map definitions and map creation.

use crate::abi::{MapCreateAttr, MapFlags, MapType, NameError, ObjName, PinningMode};
use crate::error::{errno_text, ErrorKind};
use crate::syscall::{self, Gateway, LinuxGateway};
use log::{debug, info, warn};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

/// Common error type for map operations
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid map name: {0}")]
    InvalidName(#[from] NameError),

    #[error("invalid map definition: {0} must be greater than zero")]
    ZeroSize(&'static str),

    #[error("map creation rejected by kernel: {}", errno_text(.code))]
    KernelRejected { code: i32 },
}

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::InvalidName(_) | MapError::ZeroSize(_) => ErrorKind::Validation,
            MapError::KernelRejected { .. } => ErrorKind::KernelRejected,
        }
    }
}

/// Result type for map operations
pub type Result<T> = std::result::Result<T, MapError>;

/// Shape of a map as the kernel sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapDefinition {
    pub map_type: MapType,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: MapFlags,
    /// Inner map descriptor for map-of-maps kinds, zero otherwise
    pub inner_map_fd: u32,
    pub pinning: PinningMode,
}

impl MapDefinition {
    pub fn new(map_type: MapType, key_size: u32, value_size: u32, max_entries: u32) -> Self {
        Self {
            map_type,
            key_size,
            value_size,
            max_entries,
            flags: MapFlags::empty(),
            inner_map_fd: 0,
            pinning: PinningMode::None,
        }
    }

    pub fn with_flags(mut self, flags: MapFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_pinning(mut self, pinning: PinningMode) -> Self {
        self.pinning = pinning;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_size == 0 {
            return Err(MapError::ZeroSize("key_size"));
        }
        if self.value_size == 0 {
            return Err(MapError::ZeroSize("value_size"));
        }
        if self.max_entries == 0 {
            return Err(MapError::ZeroSize("max_entries"));
        }
        Ok(())
    }
}

/// A map to be created: definition, name and NUMA placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapObject {
    pub def: MapDefinition,
    pub name: ObjName,
    pub numa_node: Option<u32>,
}

impl MapObject {
    pub fn new(def: MapDefinition, name: ObjName) -> Self {
        Self {
            def,
            name,
            numa_node: None,
        }
    }

    pub fn with_numa_node(mut self, node: u32) -> Self {
        self.numa_node = Some(node);
        self
    }

    fn to_attr(&self) -> MapCreateAttr {
        let mut flags = self.def.flags;
        flags.set(MapFlags::NUMA_NODE, self.numa_node.is_some());
        let inner_map_fd = if self.def.map_type.is_map_of_maps() {
            self.def.inner_map_fd
        } else {
            0
        };
        MapCreateAttr {
            map_type: self.def.map_type.as_raw(),
            key_size: self.def.key_size,
            value_size: self.def.value_size,
            max_entries: self.def.max_entries,
            map_flags: flags.bits(),
            inner_map_fd,
            numa_node: self.numa_node.unwrap_or(0),
            map_name: self.name.to_bytes(),
        }
    }
}

/// A created map; the descriptor is closed on drop
#[derive(Debug)]
pub struct Map {
    fd: OwnedFd,
    name: ObjName,
    def: MapDefinition,
}

impl Map {
    pub fn name(&self) -> &ObjName {
        &self.name
    }

    pub fn definition(&self) -> &MapDefinition {
        &self.def
    }

    pub fn pinning(&self) -> PinningMode {
        self.def.pinning
    }

    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }
}

impl AsFd for Map {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Map {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Creates maps through a [`Gateway`]
#[derive(Debug, Default)]
pub struct MapManager<G = LinuxGateway> {
    gateway: G,
}

impl<G: Gateway> MapManager<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Creates a map from a definition and a caller supplied name
    pub fn create(&self, def: MapDefinition, name: &str) -> Result<Map> {
        let obj = MapObject::new(def, ObjName::new(name)?);
        self.create_map(&obj)
    }

    /// Creates the map described by `obj`.
    ///
    /// Every call creates a distinct kernel object; nothing is retried.
    pub fn create_map(&self, obj: &MapObject) -> Result<Map> {
        obj.def.validate()?;

        let mut attr = obj.to_attr();
        info!(
            "Creating map {:?} type {} key_size {} value_size {} max_entries {} flags {:#x}",
            obj.name.as_str(),
            obj.def.map_type,
            attr.key_size,
            attr.value_size,
            attr.max_entries,
            attr.map_flags
        );
        debug!("map create attr: {:?}", attr);

        let fd = syscall::map_create(&self.gateway, &mut attr)
            .map_err(|e| {
                warn!("Unable to create map {:?}: {}", obj.name.as_str(), e);
                MapError::KernelRejected { code: e.code }
            })?;

        info!(
            "Created map {:?} with fd {}",
            obj.name.as_str(),
            fd.as_raw_fd()
        );
        Ok(Map {
            fd,
            name: obj.name.clone(),
            def: obj.def,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Command;
    use crate::syscall::testing::FakeGateway;

    fn test_map() -> MapObject {
        let def = MapDefinition::new(MapType::Hash, 4, 8, 1024);
        MapObject::new(def, ObjName::new("test_map").unwrap())
    }

    #[test]
    fn test_create_map_returns_handle() {
        let manager = MapManager::new(FakeGateway::succeeding());
        let map = manager.create_map(&test_map()).unwrap();
        assert!(map.as_raw_fd() >= 0);
        assert_eq!(map.name().as_str(), "test_map");
        assert_eq!(map.definition().max_entries, 1024);
    }

    #[test]
    fn test_create_map_marshals_definition() {
        let gateway = FakeGateway::succeeding();
        let manager = MapManager::new(&gateway);
        let obj = MapObject {
            def: MapDefinition::new(MapType::LruHash, 16, 32, 64)
                .with_flags(MapFlags::NO_COMMON_LRU),
            ..test_map()
        };
        manager.create_map(&obj).unwrap();

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.command, Command::MapCreate);
        assert_eq!(call.u32_at(0), MapType::LruHash.as_raw());
        assert_eq!(call.u32_at(4), 16);
        assert_eq!(call.u32_at(8), 32);
        assert_eq!(call.u32_at(12), 64);
        assert_eq!(call.u32_at(16), MapFlags::NO_COMMON_LRU.bits());
        assert_eq!(call.u32_at(20), 0);
        assert_eq!(&call.attr[28..36], b"test_map");
        assert!(call.attr[36..44].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_inner_map_fd_only_for_map_of_maps() {
        let gateway = FakeGateway::succeeding();
        let manager = MapManager::new(&gateway);

        let mut plain = test_map();
        plain.def.inner_map_fd = 7;
        manager.create_map(&plain).unwrap();

        let mut outer = test_map();
        outer.def.map_type = MapType::HashOfMaps;
        outer.def.inner_map_fd = 7;
        manager.create_map(&outer).unwrap();

        let calls = gateway.calls();
        assert_eq!(calls[0].u32_at(20), 0);
        assert_eq!(calls[1].u32_at(20), 7);
    }

    #[test]
    fn test_numa_node_sets_flag() {
        let gateway = FakeGateway::succeeding();
        let manager = MapManager::new(&gateway);
        manager.create_map(&test_map().with_numa_node(1)).unwrap();

        let calls = gateway.calls();
        let call = &calls[0];
        assert_eq!(call.u32_at(16), MapFlags::NUMA_NODE.bits());
        assert_eq!(call.u32_at(24), 1);
    }

    #[test]
    fn test_zero_sizes_rejected_before_syscall() {
        let gateway = FakeGateway::succeeding();
        let manager = MapManager::new(&gateway);
        for (field, def) in [
            ("key_size", MapDefinition::new(MapType::Hash, 0, 8, 1)),
            ("value_size", MapDefinition::new(MapType::Hash, 4, 0, 1)),
            ("max_entries", MapDefinition::new(MapType::Hash, 4, 8, 0)),
        ] {
            let obj = MapObject::new(def, ObjName::default());
            let err = manager.create_map(&obj).unwrap_err();
            assert!(matches!(err, MapError::ZeroSize(f) if f == field));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(gateway.call_count(), 0);
    }

    #[test]
    fn test_name_length_boundary() {
        let gateway = FakeGateway::succeeding();
        let manager = MapManager::new(&gateway);
        let def = MapDefinition::new(MapType::Array, 4, 4, 1);

        assert!(manager.create(def, "fifteen_chars_x").is_ok());
        assert_eq!(gateway.call_count(), 1);

        let err = manager.create(def, "sixteen_chars_xx").unwrap_err();
        assert!(matches!(
            err,
            MapError::InvalidName(NameError::TooLong { len: 16, .. })
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(gateway.call_count(), 1);
    }

    #[test]
    fn test_kernel_rejection_keeps_errno() {
        let gateway = FakeGateway::failing(libc::E2BIG);
        let manager = MapManager::new(&gateway);
        let err = manager.create_map(&test_map()).unwrap_err();
        assert!(matches!(
            err,
            MapError::KernelRejected { code } if code == libc::E2BIG
        ));
        assert_eq!(err.kind(), ErrorKind::KernelRejected);
        assert_eq!(gateway.call_count(), 1);
    }
}
