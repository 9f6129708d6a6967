use anyhow::{Context, Result};
use goblin::elf::section_header::SHT_NOBITS;
use goblin::elf::Elf;
use std::fs;
use std::path::Path;

/// Raw pieces of a compiled object needed to load one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSection {
    /// Section the instructions came from
    pub section: String,
    /// Instruction bytes, copied verbatim
    pub insns: Vec<u8>,
    /// Contents of the `license` section, if present
    pub license: Option<String>,
}

/// Reads one instruction section (and the license) from an object file
pub fn read_program_section(path: &Path, section: &str) -> Result<ProgramSection> {
    let buffer =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_program_section(&buffer, section)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Extracts `section` from an in-memory ELF object. No relocation is applied.
pub fn parse_program_section(buffer: &[u8], section: &str) -> Result<ProgramSection> {
    let elf = Elf::parse(buffer).with_context(|| "Failed to parse ELF file")?;

    let insns = section_bytes(&elf, buffer, section)?.ok_or_else(|| {
        anyhow::anyhow!(
            "Section {:?} not found (available: {})",
            section,
            section_names(&elf).join(", ")
        )
    })?;

    let license = section_bytes(&elf, buffer, "license")?.map(|data| {
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        String::from_utf8_lossy(&data[..end]).into_owned()
    });

    Ok(ProgramSection {
        section: section.to_string(),
        insns: insns.to_vec(),
        license,
    })
}

fn section_bytes<'a>(elf: &Elf<'_>, buffer: &'a [u8], wanted: &str) -> Result<Option<&'a [u8]>> {
    for sh in elf.section_headers.iter() {
        if elf.shdr_strtab.get_at(sh.sh_name) != Some(wanted) {
            continue;
        }
        if sh.sh_type == SHT_NOBITS {
            return Ok(Some(&[][..]));
        }
        let start = sh.sh_offset as usize;
        let end = start
            .checked_add(sh.sh_size as usize)
            .filter(|end| *end <= buffer.len())
            .with_context(|| format!("Section {wanted:?} extends past end of file"))?;
        return Ok(Some(&buffer[start..end]));
    }
    Ok(None)
}

fn section_names(elf: &Elf<'_>) -> Vec<String> {
    elf.section_headers
        .iter()
        .filter_map(|sh| elf.shdr_strtab.get_at(sh.sh_name))
        .filter(|name| !name.is_empty() && !name.starts_with(".rel") && *name != ".strtab")
        .map(str::to_string)
        .collect()
}
