use serde::{Deserialize, Serialize};

use crate::model::{Finding, FindingId, SectionInfo, SectionTotals, Severity, SymbolInfo};

/// Rule thresholds. Every limit is a tunable; the defaults below are the
/// documented baseline for a small Cortex-M class target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsConfig {
    /// SIZE warns when text+rodata+data exceeds this. Default 256 KiB.
    pub size_warn_bytes: u64,
    /// RAM_PRESSURE warns when data+bss exceeds this. Default 48 KiB.
    pub ram_warn_bytes: u64,
    /// FLOAT_BLOAT warns when soft-float helper bytes exceed this.
    /// Default 2 KiB.
    pub float_warn_bytes: u64,
    /// STRING_COUNT reports when the recovered string count exceeds this.
    /// Default 400.
    pub string_info_count: u64,
}

impl Default for FindingsConfig {
    fn default() -> Self {
        FindingsConfig {
            size_warn_bytes: 256 * 1024,
            ram_warn_bytes: 48 * 1024,
            float_warn_bytes: 2 * 1024,
            string_info_count: 400,
        }
    }
}

impl FindingsConfig {
    /// Stable signature folded into the cache key: different thresholds
    /// legitimately yield different findings.
    pub fn cache_signature(&self) -> String {
        format!(
            "size:{}|ram:{}|float:{}|strings:{}",
            self.size_warn_bytes, self.ram_warn_bytes, self.float_warn_bytes, self.string_info_count
        )
    }
}

const FLOAT_NAME_PATTERNS: [&str; 4] = ["float", "dtoa", "aeabi_f", "aeabi_d"];
const EXIDX_SECTION_MARKERS: [&str; 2] = [".ARM.exidx", ".ARM.extab"];

/// Evaluate the fixed, ordered rule set. Rules are independent; a rule
/// below its trigger emits nothing (absence = clear, never a zero entry).
pub fn compute_findings(
    config: &FindingsConfig,
    totals: &SectionTotals,
    symbols: &[SymbolInfo],
    sections: &[SectionInfo],
    strings_count: Option<u64>,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    let image_bytes = totals.text_bytes + totals.rodata_bytes + totals.data_bytes;
    if image_bytes > config.size_warn_bytes {
        findings.push(Finding {
            id: FindingId::Size,
            severity: Severity::Warn,
            value: image_bytes,
            items: vec![],
        });
    }

    let ram_bytes = totals.data_bytes + totals.bss_bytes;
    if ram_bytes > config.ram_warn_bytes {
        findings.push(Finding {
            id: FindingId::RamPressure,
            severity: Severity::Warn,
            value: ram_bytes,
            items: symbol_names_by_size(symbols, |s| {
                matches!(s.kind.as_str(), "B" | "b" | "D" | "d")
            }),
        });
    }

    let float_symbols: Vec<&SymbolInfo> = symbols
        .iter()
        .filter(|s| {
            let name = s.name.to_ascii_lowercase();
            FLOAT_NAME_PATTERNS
                .iter()
                .any(|pattern| name.contains(pattern))
        })
        .collect();
    let float_bytes: u64 = float_symbols.iter().map(|s| s.size).sum();
    if float_bytes > config.float_warn_bytes {
        let mut names: Vec<&SymbolInfo> = float_symbols;
        names.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
        findings.push(Finding {
            id: FindingId::FloatBloat,
            severity: Severity::Warn,
            value: float_bytes,
            items: names.iter().map(|s| s.name.clone()).collect(),
        });
    }

    let exidx_sections: Vec<&SectionInfo> = sections
        .iter()
        .filter(|s| {
            EXIDX_SECTION_MARKERS
                .iter()
                .any(|marker| s.name.contains(marker))
        })
        .collect();
    let exidx_bytes: u64 = exidx_sections.iter().map(|s| s.size).sum();
    if exidx_bytes > 0 {
        findings.push(Finding {
            id: FindingId::Exidx,
            severity: Severity::Info,
            value: exidx_bytes,
            items: exidx_sections.iter().map(|s| s.name.clone()).collect(),
        });
    }

    if let Some(count) = strings_count {
        if count > config.string_info_count {
            findings.push(Finding {
                id: FindingId::StringCount,
                severity: Severity::Info,
                value: count,
                items: vec![],
            });
        }
    }

    findings
}

fn symbol_names_by_size(symbols: &[SymbolInfo], keep: impl Fn(&SymbolInfo) -> bool) -> Vec<String> {
    let mut matched: Vec<&SymbolInfo> = symbols.iter().filter(|s| keep(s)).collect();
    matched.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
    matched.iter().map(|s| s.name.clone()).collect()
}
