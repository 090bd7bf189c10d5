use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::model::AnalysisResult;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisTrace {
    pub schema_version: u32,
    pub elf_path: String,
    pub map_path: Option<String>,
    pub cache_hit: bool,
    pub elapsed_ms: u128,
    pub symbol_count: usize,
    pub section_count: usize,
    pub region_count: usize,
    pub finding_count: usize,
    pub warning_count: usize,
}

fn diagnostics_dir() -> Option<PathBuf> {
    std::env::var("FOOTLIGHT_DIAGNOSTICS_DIR")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Opt-in run trace for debugging in the field: when
/// `FOOTLIGHT_DIAGNOSTICS_DIR` is set, drop a JSON summary of the run
/// there. Failures to write are ignored; diagnostics never break analysis.
pub fn maybe_write_analysis_trace(result: &AnalysisResult, elapsed: Duration) {
    let Some(dir) = diagnostics_dir() else {
        return;
    };
    let _ = std::fs::create_dir_all(&dir);
    let trace = AnalysisTrace {
        schema_version: 1,
        elf_path: result.meta.elf_path.clone(),
        map_path: result.meta.map_path.clone(),
        cache_hit: result.meta.cache.hit,
        elapsed_ms: elapsed.as_millis(),
        symbol_count: result.symbols.len(),
        section_count: result.sections.len(),
        region_count: result.summary.memory_regions.len(),
        finding_count: result.summary.findings.len(),
        warning_count: result.warnings.len(),
    };
    let Ok(text) = serde_json::to_string_pretty(&trace) else {
        return;
    };
    let _ = std::fs::write(dir.join("analysis_trace.json"), text);
}
