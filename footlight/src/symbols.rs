use crate::error::AnalyzeError;
use crate::model::{SizeNote, SymbolInfo};
use crate::process::{run_tool_expect_success, TOOL_TIMEOUT};

/// Extract the full symbol table with `nm -S`. A failed invocation aborts
/// the pipeline run; no partial symbol list is returned.
pub fn extract_symbols(nm_path: &str, elf_path: &str) -> Result<Vec<SymbolInfo>, AnalyzeError> {
    let out = run_tool_expect_success("nm", nm_path, &["-S", elf_path], TOOL_TIMEOUT)?;
    Ok(parse_nm_symbols(&out))
}

/// Parse `nm -S` rows. Sized symbols print four columns
/// (`addr size kind name`), unsized ones three (`addr kind name`), and
/// undefined references two (`kind name`). Zero-size entries are kept and
/// tagged: absolute kinds legitimately carry no size.
pub fn parse_nm_symbols(output: &str) -> Vec<SymbolInfo> {
    let mut symbols = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(parsed) = parse_nm_row(&parts) else {
            continue;
        };
        symbols.push(parsed);
    }
    symbols
}

struct NmRow<'a> {
    addr: Option<&'a str>,
    size: u64,
    kind: &'a str,
    name_parts: &'a [&'a str],
}

fn parse_nm_row(parts: &[&str]) -> Option<SymbolInfo> {
    let row = split_nm_row(parts)?;
    let kind = row.kind.to_string();
    let name = row.name_parts.join(" ");
    if name.is_empty() {
        return None;
    }
    let size_note = size_note_for(&kind, row.size);
    Some(SymbolInfo {
        section_guess: guess_section(&kind),
        name,
        size: row.size,
        addr: row.addr.map(|v| v.to_string()),
        kind,
        size_note,
    })
}

fn split_nm_row<'a>(parts: &'a [&'a str]) -> Option<NmRow<'a>> {
    match parts {
        [kind, name_parts @ ..] if is_kind_token(kind) => Some(NmRow {
            addr: None,
            size: 0,
            kind,
            name_parts,
        }),
        [addr, kind, name_parts @ ..] if is_hex_token(addr) && is_kind_token(kind) => Some(NmRow {
            addr: Some(addr),
            size: 0,
            kind,
            name_parts,
        }),
        [addr, size, kind, name_parts @ ..]
            if is_hex_token(addr) && is_hex_token(size) && is_kind_token(kind) =>
        {
            Some(NmRow {
                addr: Some(addr),
                size: u64::from_str_radix(size, 16).unwrap_or(0),
                kind,
                name_parts,
            })
        }
        _ => None,
    }
}

fn is_hex_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_kind_token(token: &str) -> bool {
    token.len() == 1
        && token
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '?')
            .unwrap_or(false)
}

/// Absolute symbols never carry a size; anything else at zero is a tool
/// limitation, and the two must stay distinguishable downstream.
fn size_note_for(kind: &str, size: u64) -> Option<SizeNote> {
    if size != 0 {
        return None;
    }
    if kind.eq_ignore_ascii_case("a") {
        Some(SizeNote::NoSizeByDesign)
    } else {
        Some(SizeNote::SizeUnknown)
    }
}

/// Best-effort section name from the nm kind letter, for when explicit
/// section info is unavailable.
pub fn guess_section(kind: &str) -> String {
    match kind {
        "T" | "t" => "text",
        "R" | "r" | "n" => "rodata",
        "D" | "d" | "G" | "g" | "S" | "s" => "data",
        "B" | "b" | "C" => "bss",
        "A" | "a" => "absolute",
        _ => "other",
    }
    .to_string()
}

/// Kinds whose address ranges participate in PC lookup: code plus weak
/// code, and absolute entries (exact-match only).
pub fn is_pc_indexable_kind(kind: &str) -> bool {
    matches!(kind, "T" | "t" | "W" | "w" | "A" | "a")
}
