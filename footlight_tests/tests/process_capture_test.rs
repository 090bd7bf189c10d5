#![cfg(unix)]

use std::process::Command;
use std::time::Duration;

use footlight::error::AnalyzeError;
use footlight::findings::FindingsConfig;
use footlight::model::AnalyzeParams;
use footlight::process::{run_tool_capture_with_timeout, run_tool_expect_success};
use footlight::session::AnalysisSession;
use footlight::toolchain::ToolchainConfig;

use footlight_tests::{write_failing_tool, write_hanging_tool};

#[test]
fn hung_tool_is_killed_and_surfaces_a_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_hanging_tool(dir.path(), "arm-none-eabi-nm");

    let started = std::time::Instant::now();
    let err = run_tool_capture_with_timeout(
        "nm",
        Command::new(&tool),
        tool.to_string_lossy().to_string(),
        Duration::from_millis(200),
    )
    .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(err.is_toolchain_failure());
    match err {
        AnalyzeError::ToolTimedOut {
            tool, timeout_ms, ..
        } => {
            assert_eq!(tool, "nm");
            assert_eq!(timeout_ms, 200);
        }
        other => panic!("expected timeout, got {other}"),
    }
}

#[test]
fn failing_tool_surfaces_its_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_failing_tool(dir.path(), "arm-none-eabi-objdump", "not an ELF file");

    let err = run_tool_expect_success(
        "objdump",
        &tool.to_string_lossy(),
        &["-h", "whatever.elf"],
        Duration::from_secs(5),
    )
    .unwrap_err();
    assert!(err.is_toolchain_failure());
    assert!(err.to_string().contains("not an ELF file"));
}

#[test]
fn missing_tool_fails_the_whole_run_without_caching() {
    let dir = tempfile::tempdir().unwrap();
    let elf = dir.path().join("firmware.elf");
    std::fs::write(&elf, b"\x7fELF fake").unwrap();

    let session = AnalysisSession::new(FindingsConfig::default());
    let params = AnalyzeParams {
        elf_path: elf.to_string_lossy().to_string(),
        map_path: None,
        toolchain: Some(ToolchainConfig {
            auto_detect: false,
            toolchain_root: None,
            nm_path: Some(dir.path().join("no-such-nm").to_string_lossy().to_string()),
            objdump_path: None,
            strings_path: None,
        }),
    };

    let err = session.analyze(&params).unwrap_err();
    assert!(err.is_toolchain_failure());

    // The failed run left no current analysis behind.
    assert!(session.current().is_err());
}
