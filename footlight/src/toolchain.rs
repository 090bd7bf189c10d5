use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use which::which_in;

use crate::error::AnalyzeError;

pub const NM_TOOL: &str = "arm-none-eabi-nm";
pub const OBJDUMP_TOOL: &str = "arm-none-eabi-objdump";
pub const STRINGS_TOOL: &str = "arm-none-eabi-strings";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub auto_detect: bool,
    pub toolchain_root: Option<String>,
    pub nm_path: Option<String>,
    pub objdump_path: Option<String>,
    pub strings_path: Option<String>,
}

impl ToolchainConfig {
    fn has_explicit_paths(&self) -> bool {
        self.nm_path.is_some() || self.toolchain_root.is_some()
    }
}

/// Resolved tool locations. Symbol extraction needs `nm` at minimum; the
/// other two degrade (no section table, no string count) when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainPaths {
    pub nm_path: String,
    pub objdump_path: Option<String>,
    pub strings_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    Explicit,
    Env,
    WellKnown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainCandidate {
    pub source: CandidateSource,
    pub paths: ToolchainPaths,
}

/// Discover toolchain candidates, best first. Soft-fails: an empty vector on
/// total failure, never an error.
pub fn detect_toolchain(config: &ToolchainConfig) -> Vec<ToolchainCandidate> {
    detect_with_search_path(config, std::env::var_os("PATH").as_deref())
}

/// Same as `detect_toolchain`, with the process search path injected so
/// tests never mutate the real environment.
pub fn detect_with_search_path(
    config: &ToolchainConfig,
    search_path: Option<&OsStr>,
) -> Vec<ToolchainCandidate> {
    let mut candidates: Vec<ToolchainCandidate> = vec![];

    if !config.auto_detect {
        if let Some(paths) = paths_from_explicit_unprobed(config) {
            candidates.push(ToolchainCandidate {
                source: CandidateSource::Explicit,
                paths,
            });
        }
        return candidates;
    }

    if let Some(paths) = paths_from_explicit_probed(config) {
        candidates.push(ToolchainCandidate {
            source: CandidateSource::Explicit,
            paths,
        });
    }
    if let Some(paths) = paths_from_search_path(search_path) {
        candidates.push(ToolchainCandidate {
            source: CandidateSource::Env,
            paths,
        });
    }
    if let Some(paths) = paths_from_well_known_roots() {
        candidates.push(ToolchainCandidate {
            source: CandidateSource::WellKnown,
            paths,
        });
    }

    candidates
}

/// Pick the most confident candidate for a pipeline run.
pub fn resolve_toolchain(config: Option<&ToolchainConfig>) -> Result<ToolchainPaths, AnalyzeError> {
    let default_config = ToolchainConfig {
        auto_detect: true,
        ..ToolchainConfig::default()
    };
    let config = config.unwrap_or(&default_config);

    if !config.auto_detect && !config.has_explicit_paths() {
        return Err(AnalyzeError::toolchain(
            "Toolchain paths are not configured.",
        ));
    }

    detect_toolchain(config)
        .into_iter()
        .next()
        .map(|candidate| candidate.paths)
        .ok_or_else(|| {
            AnalyzeError::toolchain(format!("Failed to detect {NM_TOOL} toolchain on PATH."))
        })
}

fn tool_file_name(tool: &str) -> String {
    let suffix = if cfg!(windows) { ".exe" } else { "" };
    format!("{tool}{suffix}")
}

/// Explicit paths with auto-detect off are taken as given: exactly one
/// candidate, no filesystem probing.
fn paths_from_explicit_unprobed(config: &ToolchainConfig) -> Option<ToolchainPaths> {
    let nm_path = explicit_tool_path(config, NM_TOOL, config.nm_path.as_deref())?;
    Some(ToolchainPaths {
        nm_path,
        objdump_path: explicit_tool_path(config, OBJDUMP_TOOL, config.objdump_path.as_deref()),
        strings_path: explicit_tool_path(config, STRINGS_TOOL, config.strings_path.as_deref()),
    })
}

fn paths_from_explicit_probed(config: &ToolchainConfig) -> Option<ToolchainPaths> {
    if !config.has_explicit_paths() {
        return None;
    }
    let nm_path = explicit_tool_path(config, NM_TOOL, config.nm_path.as_deref())
        .filter(|p| Path::new(p).exists())?;
    Some(ToolchainPaths {
        nm_path,
        objdump_path: explicit_tool_path(config, OBJDUMP_TOOL, config.objdump_path.as_deref())
            .filter(|p| Path::new(p).exists()),
        strings_path: explicit_tool_path(config, STRINGS_TOOL, config.strings_path.as_deref())
            .filter(|p| Path::new(p).exists()),
    })
}

fn explicit_tool_path(config: &ToolchainConfig, tool: &str, explicit: Option<&str>) -> Option<String> {
    if let Some(path) = explicit {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    config
        .toolchain_root
        .as_deref()
        .map(|root| guess_from_root(root, tool))
}

/// `<root>/bin/<tool>` unless the root already names a `bin` directory.
fn guess_from_root(root: &str, tool: &str) -> String {
    let mut base = PathBuf::from(root);
    let ends_in_bin = base
        .file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case("bin"))
        .unwrap_or(false);
    if !ends_in_bin {
        base.push("bin");
    }
    base.push(tool_file_name(tool));
    base.to_string_lossy().to_string()
}

fn paths_from_search_path(search_path: Option<&OsStr>) -> Option<ToolchainPaths> {
    let search_path = search_path?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let find = |tool: &str| -> Option<String> {
        which_in(tool_file_name(tool), Some(search_path), &cwd)
            .ok()
            .map(|p| p.to_string_lossy().to_string())
    };
    let nm_path = find(NM_TOOL)?;
    Some(ToolchainPaths {
        nm_path,
        objdump_path: find(OBJDUMP_TOOL),
        strings_path: find(STRINGS_TOOL),
    })
}

fn paths_from_well_known_roots() -> Option<ToolchainPaths> {
    for root in well_known_roots() {
        if let Some(paths) = paths_from_bin_dir(&root.join("bin")) {
            return Some(paths);
        }
        // Versioned installs nest one level down (e.g. /opt/arm/13.2.rel1/bin).
        let Ok(entries) = std::fs::read_dir(&root) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(paths) = paths_from_bin_dir(&path.join("bin")) {
                return Some(paths);
            }
        }
    }
    None
}

fn paths_from_bin_dir(bin_dir: &Path) -> Option<ToolchainPaths> {
    let probe = |tool: &str| -> Option<String> {
        let candidate = bin_dir.join(tool_file_name(tool));
        candidate
            .exists()
            .then(|| candidate.to_string_lossy().to_string())
    };
    let nm_path = probe(NM_TOOL)?;
    Some(ToolchainPaths {
        nm_path,
        objdump_path: probe(OBJDUMP_TOOL),
        strings_path: probe(STRINGS_TOOL),
    })
}

fn well_known_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        [
            r"C:\Program Files\Arm GNU Toolchain",
            r"C:\Program Files (x86)\Arm GNU Toolchain",
            r"C:\Program Files\GNU Arm Embedded Toolchain",
            r"C:\Program Files (x86)\GNU Arm Embedded Toolchain",
            r"C:\Program Files\gcc-arm-none-eabi",
            r"C:\Program Files (x86)\gcc-arm-none-eabi",
            r"C:\ARM\gcc-arm-none-eabi",
            r"C:\GNU Arm Embedded Toolchain",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    } else {
        ["/usr", "/usr/local", "/opt", "/opt/arm", "/opt/gcc-arm-none-eabi"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }
}
