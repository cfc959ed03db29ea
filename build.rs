use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    println!("cargo:rustc-env=ROLLCALL_VERSION={}", version());
}

/// Tag without its `v`. Dirty and untagged trees get the build time appended.
fn version() -> String {
    let described = git_describe().unwrap_or_default();
    let tag = described.strip_prefix('v').unwrap_or(&described);

    match tag {
        "" => format!("0.0.0-unknown-{}", build_time()),
        dirty if dirty.ends_with("-dirty") => format!("{}-{}", dirty, build_time()),
        clean => clean.to_string(),
    }
}

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    String::from_utf8(output.stdout)
        .ok()
        .map(|text| text.trim().to_string())
}

fn build_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
