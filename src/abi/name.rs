use super::BPF_OBJ_NAME_LEN;
use std::fmt;

/// Longest name the kernel stores, leaving room for the terminator
pub const MAX_NAME_LEN: usize = BPF_OBJ_NAME_LEN - 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name {name:?} is {len} bytes, at most {MAX_NAME_LEN} allowed")]
    TooLong { name: String, len: usize },

    #[error("name {name:?} contains {ch:?}; only ASCII alphanumerics, '_' and '.' are allowed")]
    InvalidChar { name: String, ch: char },
}

/// Kernel object name for maps and programs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ObjName(String);

impl ObjName {
    pub fn new(name: &str) -> Result<Self, NameError> {
        if name.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong {
                name: name.to_string(),
                len: name.len(),
            });
        }
        if let Some(ch) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
        {
            return Err(NameError::InvalidChar {
                name: name.to_string(),
                ch,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// NUL padded encoding for `map_name` / `prog_name`
    pub fn to_bytes(&self) -> [u8; BPF_OBJ_NAME_LEN] {
        let mut out = [0u8; BPF_OBJ_NAME_LEN];
        out[..self.0.len()].copy_from_slice(self.0.as_bytes());
        out
    }
}

impl fmt::Display for ObjName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ObjName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ObjName::new(value)
    }
}
