//! Build script for retrievo-service.
//!
//! Compiles the protobuf definitions into Rust code using tonic-build.

use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=../../proto/retrievo.proto");

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("retrievo_descriptor.bin"))
        .compile_protos(&["../../proto/retrievo.proto"], &["../../proto"])?;

    Ok(())
}
