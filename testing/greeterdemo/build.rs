fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the pure-Rust `protox` compiler to produce the FileDescriptorSet so the
    // build does not depend on a system `protoc` binary, then hand it to
    // tonic-prost-build for code generation (identical output to compile_protos).
    let fds = protox::compile(["proto/demo.proto"], ["proto"])?;
    tonic_prost_build::configure().compile_fds(fds)?;
    Ok(())
}
