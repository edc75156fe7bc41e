use std::env;
use std::process::Command;

fn main() {
    // Record the toolchain that built us for the --version banner
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=AMTOOL_RUSTC_VERSION={}", version);

    for var in [
        "AMTOOL_BUILD_BRANCH",
        "AMTOOL_BUILD_REVISION",
        "AMTOOL_BUILD_USER",
        "AMTOOL_BUILD_DATE",
        "AMTOOL_BUILD_TAGS",
    ] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
