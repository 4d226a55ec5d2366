use anyhow::Context as _;

use crate::cli::GenkeyArgs;
use crate::run_error::RunError;

pub(crate) fn genkey(args: &GenkeyArgs) -> Result<(), RunError> {
    let signer = rpcbench_rpc::generate_key_file(&args.key)
        .with_context(|| format!("failed to generate key: {}", args.key.display()))
        .map_err(RunError::RuntimeError)?;

    println!("key: {}", args.key.display());
    println!("public key: {}", signer.public_key_hex());
    Ok(())
}
