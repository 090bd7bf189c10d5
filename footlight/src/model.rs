use serde::{Deserialize, Serialize};

use crate::toolchain::{ToolchainConfig, ToolchainPaths};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeParams {
    pub elf_path: String,
    pub map_path: Option<String>,
    pub toolchain: Option<ToolchainConfig>,
}

/// Immutable snapshot of one pipeline run. Never mutated after assembly;
/// superseded (not updated) by the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub meta: AnalysisMeta,
    pub summary: AnalysisSummary,
    pub sections: Vec<SectionInfo>,
    /// Full extracted symbol table, address order as reported by the tool.
    /// `summary.top_symbols` is the display subset; queries are served from
    /// this list.
    pub symbols: Vec<SymbolInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub elf_path: String,
    pub map_path: Option<String>,
    pub toolchain: ToolchainPaths,
    pub cache: CacheMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub hit: bool,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub sections_totals: SectionTotals,
    pub top_symbols: Vec<SymbolInfo>,
    pub top_objects: Vec<ObjectContribution>,
    pub top_libraries: Vec<ObjectContribution>,
    pub top_sections: Vec<ObjectContribution>,
    pub map_tree: Vec<TreeNode>,
    pub memory_regions: Vec<MemoryRegion>,
    pub findings: Vec<Finding>,
}

/// Byte totals under both accounting bases. The VMA and LD figures are
/// independent projections over the same section list; the UI toggles
/// between them without re-analysis, so both are always populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionTotals {
    pub text_bytes: u64,
    pub rodata_bytes: u64,
    pub data_bytes: u64,
    pub bss_bytes: u64,
    /// VMA basis: section sizes summed by the region their VMA lands in.
    /// Excludes alignment gaps and the `.data` load image in flash.
    pub flash_bytes: u64,
    pub ram_bytes: u64,
    /// LD basis: VMA sums plus LMA images stored in the region plus
    /// inter-image alignment padding. Never smaller than the VMA figure.
    pub ld_flash_bytes: u64,
    pub ld_ram_bytes: u64,
    /// Declared capacities of flash-/ram-classified regions, when a MAP
    /// provided a memory configuration.
    pub flash_region_bytes: Option<u64>,
    pub ram_region_bytes: Option<u64>,
}

/// One row of the ELF section table: sizes in bytes, addresses as the tool
/// printed them (hex, no `0x` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub size: u64,
    pub vma: Option<String>,
    pub lma: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub size: u64,
    pub addr: Option<String>,
    /// One-letter classification as reported by the symbol-dump tool.
    pub kind: String,
    pub section_guess: String,
    /// Present only for zero-size symbols, distinguishing "this kind never
    /// carries a size" from "the tool did not report one".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_note: Option<SizeNote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeNote {
    NoSizeByDesign,
    SizeUnknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectContribution {
    pub name: String,
    pub size: u64,
}

/// Drill-down node (library -> object). Rebuilt fully on each analysis; a
/// parent's size is its own direct total, not a rollup contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub size: u64,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub name: String,
    pub origin: String,
    pub length: u64,
    pub used: Option<u64>,
    #[serde(default)]
    pub used_is_estimate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_bytes: Option<u64>,
    /// Which sections fell into this region. Populated for the synthetic
    /// `default` region so the bucket is explainable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RegionSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSource {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub severity: Severity,
    pub value: u64,
    /// Full contributing-item list; display layers truncate, the payload
    /// does not.
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingId {
    #[serde(rename = "SIZE")]
    Size,
    #[serde(rename = "RAM_PRESSURE")]
    RamPressure,
    #[serde(rename = "FLOAT_BLOAT")]
    FloatBloat,
    #[serde(rename = "EXIDX")]
    Exidx,
    #[serde(rename = "STRING_COUNT")]
    StringCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcLookupResult {
    pub address: String,
    pub symbol: Option<PcLookupSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcLookupSymbol {
    pub name: String,
    pub addr: String,
    pub size: u64,
    pub kind: String,
    pub section_guess: String,
    pub offset: u64,
}

pub fn parse_hex_str(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
