use std::process::Command;

/// Short commit for `kaitz --version`. `KAITZ_BUILD_COMMIT` wins (source
/// tarballs have no .git); a dirty tree is marked with `-dirty`.
fn commit() -> String {
    if let Ok(commit) = std::env::var("KAITZ_BUILD_COMMIT") {
        if !commit.trim().is_empty() {
            return commit.trim().to_string();
        }
    }
    Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=7", "--exclude", "*"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

fn main() {
    println!("cargo:rerun-if-env-changed=KAITZ_BUILD_COMMIT");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");

    println!("cargo:rustc-env=KAITZ_COMMIT={}", commit());
    // Cargo only exposes TARGET to build scripts.
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".into());
    println!("cargo:rustc-env=KAITZ_TARGET={target}");
}
