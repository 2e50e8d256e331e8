//! Build script for hermes-ffi
//!
//! Generates the hermes.h C header file using cbindgen.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-changed=src/exports.rs");

    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR").map(PathBuf::from) else {
        return;
    };
    let target_dir = env::var("CARGO_TARGET_DIR").map_or_else(
        |_| crate_dir.join("..").join("..").join("target"),
        PathBuf::from,
    );
    let header_path = target_dir.join("include").join("hermes.h");

    if let Some(parent) = header_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let config = match cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")) {
        Ok(config) => config,
        Err(e) => {
            println!("cargo:warning=cbindgen.toml unreadable, header not generated: {e}");
            return;
        }
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(&header_path);
        }
        Err(e) => {
            // Header generation is best effort; the library itself still builds.
            println!("cargo:warning=cbindgen failed: {e}");
        }
    }
}
