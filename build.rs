fn main() {
    // git HEAD が変わったら再ビルド（--version に反映するため）
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let describe = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty());

    let version = match describe {
        Some(rev) => format!("{} ({})", env!("CARGO_PKG_VERSION"), rev),
        None => env!("CARGO_PKG_VERSION").to_string(),
    };

    println!("cargo:rustc-env=POSEWATCH_BUILD_VERSION={}", version);
}
