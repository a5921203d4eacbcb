fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The generated grpc code is checked in, so regular builds have no
    // codegen step. After changing a proto file, uncomment the block below
    // and build once to refresh the checked-in output.
    //
    // for (out_dir, protos, include) in [
    //     (
    //         "src/raft/generated",
    //         vec![
    //             "src/raft/proto/common.proto",
    //             "src/raft/proto/service.proto",
    //             "src/raft/proto/persistence.proto",
    //         ],
    //         "src/raft/proto",
    //     ),
    //     ("src/engine/generated", vec!["src/engine/engine_proto.proto"], "src/engine"),
    // ] {
    //     std::fs::create_dir_all(out_dir)?;
    //     tonic_build::configure()
    //         .build_server(true)
    //         .build_client(true)
    //         .out_dir(out_dir)
    //         .compile_protos(&protos, &[include])?;
    // }

    Ok(())
}
