//! Test mock for `shell::run_host`.
//!
//! Installs a thread-local table of canned responses keyed by command
//! line prefix. The program is matched by file name, so `/usr/sbin/ip -j
//! addr show` is looked up as `ip -j addr show`.

use std::cell::RefCell;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Mock response for a host command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub(crate) fn to_output(&self) -> Output {
        Output {
            // Unix exit code encoding: status = code << 8
            status: ExitStatus::from_raw(self.exit_code << 8),
            stdout: self.stdout.as_bytes().to_vec(),
            stderr: self.stderr.as_bytes().to_vec(),
        }
    }
}

type MockTable = Vec<(String, MockResponse)>;

thread_local! {
    static TABLE: RefCell<Option<MockTable>> = const { RefCell::new(None) };
}

/// Guard that clears the mock table on drop.
pub struct MockGuard;

impl Drop for MockGuard {
    fn drop(&mut self) {
        TABLE.with(|t| *t.borrow_mut() = None);
    }
}

/// Try to answer a command from the installed table. The longest matching
/// prefix wins; commands with no match fail with exit 127.
pub(crate) fn intercept(cmd: &Path, args: &[&str]) -> Option<Output> {
    let program = cmd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let line = std::iter::once(program.as_str())
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    TABLE.with(|t| {
        let table = t.borrow();
        let table = table.as_ref()?;
        let response = table
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| MockResponse::fail(127, "command not mocked"));
        Some(response.to_output())
    })
}

/// Start building a mock table.
pub fn mock_commands() -> MockBuilder {
    MockBuilder { table: Vec::new() }
}

pub struct MockBuilder {
    table: MockTable,
}

impl MockBuilder {
    /// Answer any command line starting with `prefix`.
    pub fn on(mut self, prefix: &str, response: MockResponse) -> Self {
        self.table.push((prefix.to_string(), response));
        self
    }

    /// Install the table. Returns a guard that clears it on drop.
    pub fn install(self) -> MockGuard {
        TABLE.with(|t| *t.borrow_mut() = Some(self.table));
        MockGuard
    }
}
