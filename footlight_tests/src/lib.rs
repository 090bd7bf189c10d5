//! Shared fixtures for the integration tests: fake binutils tools written
//! as tiny shell scripts, so the pipeline runs end-to-end without a cross
//! toolchain on the machine.

use std::path::{Path, PathBuf};

/// Write an executable script that prints `output` on stdout and logs each
/// invocation by appending a line to `<dir>/<name>.calls`.
#[cfg(unix)]
pub fn write_fake_tool(dir: &Path, name: &str, output: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let calls = dir.join(format!("{name}.calls"));
    let script = format!(
        "#!/bin/sh\necho run >> '{}'\ncat <<'FOOTLIGHT_EOF'\n{}\nFOOTLIGHT_EOF\n",
        calls.display(),
        output.trim_end_matches('\n'),
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write an executable script that exits nonzero with a message on stderr.
#[cfg(unix)]
pub fn write_failing_tool(dir: &Path, name: &str, stderr: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let script = format!("#!/bin/sh\necho '{stderr}' >&2\nexit 1\n");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write an executable script that sleeps long enough to trip any bounded
/// wait under test.
#[cfg(unix)]
pub fn write_hanging_tool(dir: &Path, name: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// How many times a fake tool written by `write_fake_tool` has run.
pub fn call_count(dir: &Path, name: &str) -> usize {
    std::fs::read_to_string(dir.join(format!("{name}.calls")))
        .map(|text| text.lines().count())
        .unwrap_or(0)
}
