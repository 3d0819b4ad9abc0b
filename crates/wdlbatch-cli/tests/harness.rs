#![allow(dead_code)]
use assert_cmd::Command as AssertCommand;
use std::ops::Deref;
use wdlbatch_test_utils::TestContext;

/// Nothing listens on this port, so every request fails to connect.
pub const DEAD_SERVER: &str = "http://127.0.0.1:1";

pub struct TestHarness {
    pub context: TestContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            context: TestContext::new(),
        }
    }

    pub fn cmd(&self) -> AssertCommand {
        let mut cmd = AssertCommand::new(env!("CARGO_BIN_EXE_wdlbatch"));
        cmd.current_dir(&self.context.root);
        cmd.env("XDG_CONFIG_HOME", self.context.path("config"));
        cmd.env("XDG_CACHE_HOME", self.context.path("cache"));
        cmd.env("RUST_BACKTRACE", "1");
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("RUST_LOG");
        cmd.arg("--server-url").arg(DEAD_SERVER);
        cmd
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestHarness {
    type Target = TestContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}
