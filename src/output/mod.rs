pub mod formatter;

use crate::pin::PinState;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of a pin request as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct PinReport {
    pub mode: String,
    pub state: PinState,
    pub path: Option<PathBuf>,
}

/// A created map
#[derive(Debug, Clone, Serialize)]
pub struct MapReport {
    pub name: String,
    pub map_type: String,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: Vec<String>,
    pub numa_node: Option<u32>,
    pub fd: i32,
    pub pin: PinReport,
}

/// A loaded program
#[derive(Debug, Clone, Serialize)]
pub struct ProgramReport {
    pub object: PathBuf,
    pub section: String,
    pub name: Option<String>,
    pub program_type: String,
    pub instructions: usize,
    pub license: String,
    pub fd: i32,
    pub pin: PinReport,
}

/// A derived pin path
#[derive(Debug, Clone, Serialize)]
pub struct PinPathReport {
    pub name: String,
    pub mode: String,
    pub path: Option<PathBuf>,
}

/// Anything the binary prints
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    Map(MapReport),
    Program(ProgramReport),
    PinPath(PinPathReport),
}
