use super::{LoadError, Result};
use crate::abi::{ObjName, ProgLoadAttr, ProgramType, BPF_INSN_SIZE};
use crate::syscall::{self, Gateway, LinuxGateway};
use log::{debug, info, warn};
use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

/// Verifier log capacity used unless configured otherwise
pub const DEFAULT_LOG_SIZE: usize = 65535;

/// Kernel bounds on `log_size` when a log is requested
const MIN_LOG_SIZE: usize = 128;
const MAX_LOG_SIZE: usize = (u32::MAX >> 2) as usize;

/// `BPF_LOG_LEVEL1 | BPF_LOG_LEVEL2 | BPF_LOG_STATS`
const LOG_LEVEL_MASK: u32 = 1 | 2 | 4;

/// Knobs that apply to every load made by a [`ProgramLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Verifier log capacity in bytes; zero disables the log
    pub log_size: usize,
    pub log_level: u32,
    /// Load unknown program-type tags as `UNSPEC` instead of failing
    pub allow_unspecified_fallback: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            log_size: DEFAULT_LOG_SIZE,
            log_level: 1,
            allow_unspecified_fallback: false,
        }
    }
}

impl LoadOptions {
    pub fn validate(&self) -> Result<()> {
        if self.log_size != 0 && !(MIN_LOG_SIZE..=MAX_LOG_SIZE).contains(&self.log_size) {
            return Err(LoadError::InvalidLogSize(self.log_size));
        }
        let level_ok = self.log_level != 0 && self.log_level & !LOG_LEVEL_MASK == 0;
        if self.log_size != 0 && !level_ok {
            return Err(LoadError::InvalidLogLevel(self.log_level));
        }
        Ok(())
    }
}

/// One program to load: type tag, raw instructions, license and name
#[derive(Debug, Clone)]
pub struct ProgramLoadRequest<'a> {
    pub kind: &'a str,
    pub insns: &'a [u8],
    pub license: &'a str,
    pub name: Option<ObjName>,
}

impl<'a> ProgramLoadRequest<'a> {
    pub fn new(kind: &'a str, insns: &'a [u8], license: &'a str) -> Self {
        Self {
            kind,
            insns,
            license,
            name: None,
        }
    }

    pub fn with_name(mut self, name: ObjName) -> Self {
        self.name = Some(name);
        self
    }
}

/// A loaded program; the descriptor is closed on drop
#[derive(Debug)]
pub struct Program {
    fd: OwnedFd,
    program_type: ProgramType,
    insn_count: usize,
}

impl Program {
    pub fn program_type(&self) -> ProgramType {
        self.program_type
    }

    pub fn insn_count(&self) -> usize {
        self.insn_count
    }

    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }
}

impl AsFd for Program {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Program {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Loads raw instruction blobs through a [`Gateway`]
#[derive(Debug, Default)]
pub struct ProgramLoader<G = LinuxGateway> {
    gateway: G,
    options: LoadOptions,
}

impl<G: Gateway> ProgramLoader<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(gateway: G, options: LoadOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { gateway, options })
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn load_program(&self, kind: &str, insns: &[u8], license: &str) -> Result<Program> {
        self.load(&ProgramLoadRequest::new(kind, insns, license))
    }

    /// Loads `req`. On failure the verifier log is returned in the error.
    pub fn load(&self, req: &ProgramLoadRequest<'_>) -> Result<Program> {
        let program_type = self.resolve_type(req.kind)?;

        if req.insns.is_empty() {
            return Err(LoadError::EmptyProgram);
        }
        if req.insns.len() % BPF_INSN_SIZE != 0 {
            return Err(LoadError::MisalignedProgram {
                len: req.insns.len(),
            });
        }
        let insn_count = req.insns.len() / BPF_INSN_SIZE;
        if u32::try_from(insn_count).is_err() {
            return Err(LoadError::ProgramTooLarge { count: insn_count });
        }

        if req.license.is_empty() {
            return Err(LoadError::InvalidLicense("empty"));
        }
        let license = CString::new(req.license)
            .map_err(|_| LoadError::InvalidLicense("contains a NUL byte"))?;

        let mut log_buf = vec![0u8; self.options.log_size];
        let result = {
            let log = Some((log_buf.as_mut_slice(), self.options.log_level));
            let mut attr = ProgLoadAttr::new(
                program_type.as_raw(),
                req.insns,
                &license,
                log,
                req.name.as_ref(),
            );
            debug!(
                "prog load attr: type {} insn_cnt {} log_size {} log_level {}",
                attr.prog_type, attr.insn_cnt, attr.log_size, attr.log_level
            );
            syscall::prog_load(&self.gateway, &mut attr)
        };

        match result {
            Ok(fd) => {
                info!(
                    "Load prog done with fd {} ({} program, {} instructions)",
                    fd.as_raw_fd(),
                    program_type,
                    insn_count
                );
                Ok(Program {
                    fd,
                    program_type,
                    insn_count,
                })
            }
            Err(e) => {
                let log = verifier_text(&log_buf);
                warn!("Unable to load {} program: {}", program_type, e);
                if !log.is_empty() {
                    debug!("verifier log:\n{}", log);
                }
                Err(LoadError::VerifierRejected { code: e.code, log })
            }
        }
    }

    fn resolve_type(&self, kind: &str) -> Result<ProgramType> {
        match ProgramType::from_tag(kind) {
            Some(t) => Ok(t),
            None if self.options.allow_unspecified_fallback => {
                warn!(
                    "Unknown program type {:?}, loading as {}",
                    kind,
                    ProgramType::Unspec
                );
                Ok(ProgramType::Unspec)
            }
            None => Err(LoadError::UnknownProgramType(kind.to_string())),
        }
    }
}

fn verifier_text(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
