//! Build script - makes `memory.x` visible to the linker and adds the
//! cortex-m-rt / defmt linker scripts for firmware builds.
//!
//! Host builds (`cargo test`) skip the linker arguments entirely.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    if env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::copy("memory.x", out_dir.join("memory.x")).expect("memory.x missing");
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Only the firmware binary needs the runtime linker scripts.
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
