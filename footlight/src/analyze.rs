use crate::aggregate::{aggregate, Aggregation};
use crate::cache::{build_cache_key, AnalysisCache};
use crate::error::AnalyzeError;
use crate::findings::{compute_findings, FindingsConfig};
use crate::mapfile::{parse_map_str, MapData};
use crate::model::{
    AnalysisMeta, AnalysisResult, AnalysisSummary, AnalyzeParams, CacheMeta, ObjectContribution,
    SectionInfo, SymbolInfo,
};
use crate::process::{run_tool_expect_success, TOOL_TIMEOUT};
use crate::sections::extract_sections;
use crate::symbols::extract_symbols;
use crate::toolchain::{resolve_toolchain, ToolchainPaths};

pub const TOP_SYMBOL_LIMIT: usize = 50;
pub const TOP_OBJECT_LIMIT: usize = 20;
pub const TOP_LIBRARY_LIMIT: usize = 12;
pub const TOP_SECTION_LIMIT: usize = 8;

/// Capability seam over the external binutils suite, so the pipeline core
/// runs against an in-memory fake in tests. `dump_sections` and
/// `count_strings` return `None` when their tool is unavailable; symbol
/// extraction is the minimum feature set and must succeed.
pub trait Inspector: Sync {
    fn dump_sections(&self, elf_path: &str) -> Result<Option<Vec<SectionInfo>>, AnalyzeError>;
    fn dump_symbols(&self, elf_path: &str) -> Result<Vec<SymbolInfo>, AnalyzeError>;
    fn count_strings(&self, elf_path: &str) -> Result<Option<u64>, AnalyzeError>;
}

/// The real thing: drives the resolved tool paths through the
/// timeout-bounded capture helper.
pub struct ExternalTools {
    paths: ToolchainPaths,
}

impl ExternalTools {
    pub fn new(paths: ToolchainPaths) -> Self {
        ExternalTools { paths }
    }
}

impl Inspector for ExternalTools {
    fn dump_sections(&self, elf_path: &str) -> Result<Option<Vec<SectionInfo>>, AnalyzeError> {
        let Some(objdump_path) = self.paths.objdump_path.as_deref() else {
            return Ok(None);
        };
        extract_sections(objdump_path, elf_path).map(Some)
    }

    fn dump_symbols(&self, elf_path: &str) -> Result<Vec<SymbolInfo>, AnalyzeError> {
        extract_symbols(&self.paths.nm_path, elf_path)
    }

    fn count_strings(&self, elf_path: &str) -> Result<Option<u64>, AnalyzeError> {
        let Some(strings_path) = self.paths.strings_path.as_deref() else {
            return Ok(None);
        };
        let out = run_tool_expect_success("strings", strings_path, &[elf_path], TOOL_TIMEOUT)?;
        Ok(Some(out.lines().count() as u64))
    }
}

/// Full pipeline run, cache-aware. A hit returns the prior result with only
/// the cache meta flipped; content is otherwise indistinguishable from a
/// fresh computation.
pub fn analyze_firmware(
    params: &AnalyzeParams,
    config: &FindingsConfig,
    cache: &AnalysisCache,
) -> Result<AnalysisResult, AnalyzeError> {
    validate_inputs(params)?;
    let toolchain = resolve_toolchain(params.toolchain.as_ref())?;
    let inspector = ExternalTools::new(toolchain.clone());
    analyze_with_inspector(params, config, cache, &toolchain, &inspector)
}

/// Same pipeline with the tool seam injected.
pub fn analyze_with_inspector(
    params: &AnalyzeParams,
    config: &FindingsConfig,
    cache: &AnalysisCache,
    toolchain: &ToolchainPaths,
    inspector: &dyn Inspector,
) -> Result<AnalysisResult, AnalyzeError> {
    let key = build_cache_key(
        &params.elf_path,
        params.map_path.as_deref(),
        toolchain,
        &config.cache_signature(),
    )?;
    let (resolved, hit) = cache.get_or_compute(&key, || {
        run_pipeline(params, config, toolchain, inspector, &key)
    })?;
    let mut result = (*resolved).clone();
    result.meta.cache = CacheMeta {
        hit,
        key: key.clone(),
    };
    Ok(result)
}

fn run_pipeline(
    params: &AnalyzeParams,
    config: &FindingsConfig,
    toolchain: &ToolchainPaths,
    inspector: &dyn Inspector,
    cache_key: &str,
) -> Result<AnalysisResult, AnalyzeError> {
    // The MAP parse and the ELF extraction have no data dependency; run
    // them on separate legs and join at the aggregator.
    let (map_data, elf_leg) = std::thread::scope(|scope| {
        let map_handle = scope.spawn(|| read_map_leg(params.map_path.as_deref()));
        let elf_handle = scope.spawn(|| read_elf_leg(inspector, &params.elf_path));
        (
            map_handle.join().unwrap_or_default(),
            elf_handle.join().unwrap_or_else(|_| {
                Err(AnalyzeError::toolchain("symbol extraction panicked"))
            }),
        )
    });
    let elf_data = elf_leg?;
    let mut warnings = map_data.warnings.clone();
    warnings.extend(elf_data.warnings);

    let sections = elf_data.sections.unwrap_or_default();
    let symbols = elf_data.symbols;

    let Aggregation { totals, regions } = aggregate(&sections, &map_data.regions);
    let findings = compute_findings(config, &totals, &symbols, &sections, elf_data.strings_count);

    let mut top_symbols = symbols.clone();
    top_symbols.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
    top_symbols.truncate(TOP_SYMBOL_LIMIT);

    Ok(AnalysisResult {
        meta: AnalysisMeta {
            elf_path: params.elf_path.clone(),
            map_path: params.map_path.clone(),
            toolchain: toolchain.clone(),
            cache: CacheMeta {
                hit: false,
                key: cache_key.to_string(),
            },
        },
        summary: AnalysisSummary {
            sections_totals: totals,
            top_symbols,
            top_objects: truncated(map_data.objects, TOP_OBJECT_LIMIT),
            top_libraries: truncated(map_data.libraries, TOP_LIBRARY_LIMIT),
            top_sections: truncated(map_data.sections, TOP_SECTION_LIMIT),
            map_tree: map_data.tree,
            memory_regions: regions,
            findings,
        },
        sections,
        symbols,
        warnings,
    })
}

struct ElfLeg {
    sections: Option<Vec<SectionInfo>>,
    symbols: Vec<SymbolInfo>,
    strings_count: Option<u64>,
    warnings: Vec<String>,
}

fn read_elf_leg(inspector: &dyn Inspector, elf_path: &str) -> Result<ElfLeg, AnalyzeError> {
    let mut warnings = vec![];

    let symbols = inspector.dump_symbols(elf_path)?;

    let sections = inspector.dump_sections(elf_path)?;
    if sections.is_none() {
        warnings.push(
            "objdump is not available; section totals and section findings are unavailable"
                .to_string(),
        );
    }

    // String recovery is auxiliary: a failure degrades the STRING_COUNT
    // rule instead of aborting the run.
    let strings_count = match inspector.count_strings(elf_path) {
        Ok(count) => count,
        Err(error) => {
            warnings.push(format!("string recovery failed: {error}"));
            None
        }
    };

    Ok(ElfLeg {
        sections,
        symbols,
        strings_count,
        warnings,
    })
}

/// A missing or unreadable MAP degrades to "no MAP data"; ELF-only totals
/// are still produced.
fn read_map_leg(map_path: Option<&str>) -> MapData {
    let Some(map_path) = map_path.map(str::trim).filter(|p| !p.is_empty()) else {
        return MapData::default();
    };
    match std::fs::read_to_string(map_path) {
        Ok(contents) => parse_map_str(&contents),
        Err(error) => MapData {
            warnings: vec![format!(
                "Failed to read MAP file {map_path}: {error}; continuing with ELF-only totals"
            )],
            ..MapData::default()
        },
    }
}

fn truncated(mut contributions: Vec<ObjectContribution>, limit: usize) -> Vec<ObjectContribution> {
    contributions.truncate(limit);
    contributions
}

/// Only the ELF is load-bearing. A missing or unreadable MAP is handled
/// later by degrading to ELF-only totals.
pub fn validate_inputs(params: &AnalyzeParams) -> Result<(), AnalyzeError> {
    let elf_path = params.elf_path.trim();
    if elf_path.is_empty() {
        return Err(AnalyzeError::input("ELF path is required."));
    }
    let metadata = std::fs::metadata(elf_path).map_err(|e| {
        AnalyzeError::input(format!("Failed to read ELF file {elf_path}: {e}"))
    })?;
    if !metadata.is_file() {
        return Err(AnalyzeError::input("ELF path must point to a file."));
    }
    Ok(())
}
