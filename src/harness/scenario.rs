//! Table of CLI invocations and the output they must produce

/// One CLI invocation and its expected observable behavior.
///
/// `exit_code == 0` means the process must succeed; any other value must be
/// matched exactly. A `None` expectation means the stream must stay empty,
/// `Some(text)` means it must contain `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub exit_code: i32,
    pub stdout: Option<&'static str>,
    pub stderr: Option<&'static str>,
}

impl Scenario {
    /// Full argv for the entry point, program name first
    pub fn argv(&self, program: &'static str) -> Vec<&'static str> {
        std::iter::once(program)
            .chain(self.args.iter().copied())
            .collect()
    }
}

/// Look up a scenario by its exact name
pub fn find<'a>(scenarios: &'a [Scenario], name: &str) -> Option<&'a Scenario> {
    scenarios.iter().find(|s| s.name == name)
}

const USAGE_LINE: &str = "usage: amtool [<flags>] <command> [<args> ...]";

/// Scenarios for the amtool entry point
pub const AMTOOL_SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "help without command",
        args: &[],
        exit_code: 0,
        stdout: Some(USAGE_LINE),
        stderr: None,
    },
    Scenario {
        name: "empty command",
        args: &[""],
        exit_code: 1,
        stdout: None,
        stderr: Some(r#"error: expected command but got """#),
    },
    Scenario {
        name: "version",
        args: &["--version"],
        exit_code: 0,
        stdout: Some(concat!(
            "amtool, version ",
            env!("CARGO_PKG_VERSION"),
            " (branch: "
        )),
        stderr: None,
    },
    // Expects nothing to be listening on localhost port 1
    Scenario {
        name: "verbose flag",
        args: &[
            "--verbose",
            "alert",
            "add",
            "--alertmanager.url=http://localhost:1",
        ],
        exit_code: 1,
        stdout: None,
        stderr: Some(r#"error: Post "http://localhost:1/api/v2/alerts": dial tcp 127.0.0.1:1"#),
    },
    Scenario {
        name: "unknown command",
        args: &["bogus"],
        exit_code: 1,
        stdout: None,
        stderr: Some(r#"error: expected command but got "bogus""#),
    },
    Scenario {
        name: "missing alertmanager url",
        args: &["--config.file=/dev/null", "alert", "query"],
        exit_code: 1,
        stdout: None,
        stderr: Some("error: required flag --alertmanager.url not provided"),
    },
    Scenario {
        name: "help flag",
        args: &["--help"],
        exit_code: 0,
        stdout: Some(USAGE_LINE),
        stderr: None,
    },
    Scenario {
        name: "invalid matcher",
        args: &[
            "silence",
            "query",
            "--alertmanager.url=http://localhost:1",
            "a=b",
            "foo",
        ],
        exit_code: 1,
        stdout: None,
        stderr: Some("error: bad matcher format: foo"),
    },
];
