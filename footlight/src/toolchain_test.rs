use std::path::Path;

use crate::toolchain::{
    detect_with_search_path, resolve_toolchain, CandidateSource, ToolchainConfig,
};

fn explicit_config() -> ToolchainConfig {
    ToolchainConfig {
        auto_detect: false,
        toolchain_root: None,
        nm_path: Some("/custom/arm-none-eabi-nm".to_string()),
        objdump_path: Some("/custom/arm-none-eabi-objdump".to_string()),
        strings_path: Some("/custom/arm-none-eabi-strings".to_string()),
    }
}

#[test]
fn explicit_paths_without_auto_detect_skip_probing() {
    // The configured paths do not exist; they are taken as given anyway.
    let candidates = detect_with_search_path(&explicit_config(), None);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].source, CandidateSource::Explicit);
    assert_eq!(candidates[0].paths.nm_path, "/custom/arm-none-eabi-nm");
    assert_eq!(
        candidates[0].paths.objdump_path.as_deref(),
        Some("/custom/arm-none-eabi-objdump")
    );
}

#[test]
fn no_configuration_and_no_auto_detect_yields_nothing() {
    let config = ToolchainConfig::default();
    assert!(detect_with_search_path(&config, None).is_empty());

    let err = resolve_toolchain(Some(&config)).unwrap_err();
    assert_eq!(err.to_string(), "toolchain error: Toolchain paths are not configured.");
}

#[test]
fn root_derives_conventional_bin_paths() {
    let config = ToolchainConfig {
        auto_detect: false,
        toolchain_root: Some("/opt/gcc-arm".to_string()),
        ..ToolchainConfig::default()
    };
    let candidates = detect_with_search_path(&config, None);
    assert_eq!(candidates.len(), 1);
    let nm = &candidates[0].paths.nm_path;
    assert!(
        nm.ends_with("arm-none-eabi-nm") || nm.ends_with("arm-none-eabi-nm.exe"),
        "unexpected nm path {nm}"
    );
    assert!(nm.contains("bin"));
}

#[cfg(unix)]
fn touch_tool(dir: &Path, tool: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(tool);
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn search_path_probing_finds_the_suite() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    touch_tool(&bin, "arm-none-eabi-nm");
    touch_tool(&bin, "arm-none-eabi-objdump");
    touch_tool(&bin, "arm-none-eabi-strings");

    let config = ToolchainConfig {
        auto_detect: true,
        ..ToolchainConfig::default()
    };
    // A well-known install may exist on the machine; the env candidate
    // still leads when nothing explicit is configured.
    let candidates = detect_with_search_path(&config, Some(bin.as_os_str()));
    assert_eq!(candidates[0].source, CandidateSource::Env);
    assert!(candidates[0].paths.nm_path.ends_with("arm-none-eabi-nm"));
    assert!(candidates[0].paths.strings_path.is_some());
}

#[cfg(unix)]
#[test]
fn partial_suite_is_returned_when_nm_is_present() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    touch_tool(&bin, "arm-none-eabi-nm");

    let config = ToolchainConfig {
        auto_detect: true,
        ..ToolchainConfig::default()
    };
    let candidates = detect_with_search_path(&config, Some(bin.as_os_str()));
    assert_eq!(candidates[0].source, CandidateSource::Env);
    assert_eq!(candidates[0].paths.objdump_path, None);
    assert_eq!(candidates[0].paths.strings_path, None);
}

#[cfg(unix)]
#[test]
fn suite_without_nm_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    touch_tool(&bin, "arm-none-eabi-objdump");
    touch_tool(&bin, "arm-none-eabi-strings");

    let config = ToolchainConfig {
        auto_detect: true,
        ..ToolchainConfig::default()
    };
    let candidates = detect_with_search_path(&config, Some(bin.as_os_str()));
    assert!(candidates
        .iter()
        .all(|c| c.source != CandidateSource::Env));
}

#[cfg(unix)]
#[test]
fn explicit_root_outranks_the_search_path() {
    let dir = tempfile::tempdir().unwrap();
    let root_bin = dir.path().join("root/bin");
    touch_tool(&root_bin, "arm-none-eabi-nm");
    let path_bin = dir.path().join("elsewhere");
    touch_tool(&path_bin, "arm-none-eabi-nm");

    let config = ToolchainConfig {
        auto_detect: true,
        toolchain_root: Some(dir.path().join("root").to_string_lossy().to_string()),
        ..ToolchainConfig::default()
    };
    let candidates = detect_with_search_path(&config, Some(path_bin.as_os_str()));
    assert!(candidates.len() >= 2);
    assert_eq!(candidates[0].source, CandidateSource::Explicit);
    assert!(candidates[0].paths.nm_path.starts_with(&*dir.path().join("root").to_string_lossy()));
    assert_eq!(candidates[1].source, CandidateSource::Env);
}
