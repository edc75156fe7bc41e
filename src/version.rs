//! Build information and the `--version` banner

use std::fmt;

/// Build metadata baked in at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub program: &'static str,
    pub version: &'static str,
    pub branch: &'static str,
    pub revision: &'static str,
    pub build_user: &'static str,
    pub build_date: &'static str,
    pub rustc_version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub tags: &'static str,
}

impl BuildInfo {
    /// Build info for this binary.
    ///
    /// Branch, revision, user, date and tags come from `AMTOOL_BUILD_*`
    /// variables set by the release pipeline; local builds leave them blank.
    pub fn current() -> Self {
        Self {
            program: "amtool",
            version: env!("CARGO_PKG_VERSION"),
            branch: option_env!("AMTOOL_BUILD_BRANCH").unwrap_or(""),
            revision: option_env!("AMTOOL_BUILD_REVISION").unwrap_or("unknown"),
            build_user: option_env!("AMTOOL_BUILD_USER").unwrap_or(""),
            build_date: option_env!("AMTOOL_BUILD_DATE").unwrap_or(""),
            rustc_version: env!("AMTOOL_RUSTC_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            tags: option_env!("AMTOOL_BUILD_TAGS").unwrap_or("unknown"),
        }
    }

    /// `os/arch`, e.g. `linux/x86_64`
    pub fn platform(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}, version {} (branch: {}, revision: {})",
            self.program, self.version, self.branch, self.revision
        )?;
        writeln!(f, "  build user:       {}", self.build_user)?;
        writeln!(f, "  build date:       {}", self.build_date)?;
        writeln!(f, "  rustc version:    {}", self.rustc_version)?;
        writeln!(f, "  platform:         {}", self.platform())?;
        writeln!(f, "  tags:             {}", self.tags)
    }
}
