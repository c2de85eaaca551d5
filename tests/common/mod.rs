//! Integration Test Utilities and Common Code

#![allow(dead_code)]

pub use assert_cmd::prelude::*;
pub use assert_cmd::Command;
pub use assert_fs::prelude::*;
pub use assert_fs::{fixture::ChildPath, TempDir};
pub use predicates::prelude::*;
pub use predicates::str::RegexPredicate;
pub use pretty_assertions::{assert_eq, assert_ne};

/// Build a `Command` for the `clabot` crate binary with variadic command-line arguments.
///
/// The arguments can be anything that is allowed by `Command::arg`.
#[macro_export]
macro_rules! clabot {
    ( $( $arg:expr ),* ) => {
        {
            let mut cmd = clabot_cmd();
            $(
                cmd.arg($arg);
            )*
            cmd
        }
    }
}

/// Build an `assert_cmd::assert::Assert` by calling `clabot!(args).assert().success()`.
#[macro_export]
macro_rules! clabot_success {
    ( $( $arg:expr ),* ) => { clabot!($( $arg ),*).assert().success() }
}

/// Build an `assert_cmd::assert::Assert` by calling `clabot!(args).assert().failure()`.
#[macro_export]
macro_rules! clabot_failure {
    ( $( $arg:expr ),* ) => { clabot!($( $arg ),*).assert().failure() }
}

// make macros easily visible to other modules
pub use {clabot, clabot_failure, clabot_success};

/// Build a `Command` for the `clabot` crate binary.
///
/// The command never sees a GitLab token or logging filters from the surrounding environment.
pub fn clabot_cmd() -> Command {
    let mut cmd = Command::cargo_bin("clabot").expect("clabot should be executable");
    cmd.env_remove("GITLAB_ACCESS_TOKEN")
        .env_remove("CLABOT_GITLAB_URL")
        .env_remove("CLABOT_LOG");
    cmd
}

/// Create a `RegexPredicate` from the given pattern.
pub fn is_match(pat: &str) -> RegexPredicate {
    predicates::str::is_match(pat).expect("pattern should compile")
}

/// A temporary directory holding webhook event payloads.
pub struct EventEnv {
    pub root: TempDir,
}

impl EventEnv {
    pub fn new() -> Self {
        let root = TempDir::new().expect("should be able to create tempdir");
        Self { root }
    }

    /// Write a webhook event with the given JSON contents to a file with the given name.
    pub fn event_file(&self, name: &str, contents: &str) -> ChildPath {
        let input = self.root.child(name);
        input
            .write_str(contents)
            .expect("should be able to write event file contents");
        assert!(input.is_file());
        input
    }
}
