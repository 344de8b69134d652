use std::env::var;
use std::io::Result;
use std::path::PathBuf;

fn main() -> Result<()> {
    let out_dir = PathBuf::from(var("OUT_DIR").expect("Missing OUT_DIR environment variable"));

    if var("PROTOC").is_err() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            unsafe {
                std::env::set_var("PROTOC", protoc);
            }
        }
    }

    // The descriptor set is served by the reflection endpoint in tests.
    tonic_prost_build::configure()
        .file_descriptor_set_path(out_dir.join("descriptors.bin"))
        .protoc_arg("--experimental_allow_proto3_optional")
        .build_client(false)
        .compile_protos(&["proto/echo.proto"], &["proto"])
        .unwrap();

    Ok(())
}
