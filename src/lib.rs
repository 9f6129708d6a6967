//! Minimal BPF loader: create maps, load programs and pin them to bpffs
//! through the raw bpf(2) syscall.

pub mod abi;
pub mod cli;
pub mod error;
pub mod loader;
pub mod maps;
pub mod output;
pub mod pin;
pub mod syscall;
pub mod utils;

pub use error::ErrorKind;
pub use loader::{LoadError, LoadOptions, Program, ProgramLoader};
pub use maps::{Map, MapDefinition, MapError, MapManager, MapObject};
pub use pin::{PinError, PinLayout, PinState, Pinner};
pub use syscall::{Gateway, LinuxGateway, SyscallError};
