use crate::error::AnalyzeError;
use crate::model::SectionInfo;
use crate::process::{run_tool_expect_success, TOOL_TIMEOUT};

/// Dump the ELF section table with `objdump -h`.
pub fn extract_sections(objdump_path: &str, elf_path: &str) -> Result<Vec<SectionInfo>, AnalyzeError> {
    let out = run_tool_expect_success("objdump", objdump_path, &["-h", elf_path], TOOL_TIMEOUT)?;
    Ok(parse_objdump_sections(&out))
}

/// Parse `objdump -h` rows. Data rows start with the section index; the
/// flag continuation lines (`CONTENTS, ALLOC, ...`) do not and are skipped.
pub fn parse_objdump_sections(output: &str) -> Vec<SectionInfo> {
    output
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let starts_with_index = trimmed
                .chars()
                .next()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);
            if !starts_with_index {
                return None;
            }
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            let name = parts.get(1)?.to_string();
            let size = u64::from_str_radix(parts.get(2)?, 16).ok()?;
            let vma = parts.get(3).map(|v| v.to_string());
            let lma = parts.get(4).map(|v| v.to_string());
            Some(SectionInfo {
                name,
                size,
                vma,
                lma,
            })
        })
        .collect()
}
