use blob_client::BlobClient;
use storage_core::StorageConfig;

use super::transport;
use crate::config::PutBlobArgs;
use crate::error::CliError;

pub async fn run(settings: &StorageConfig, args: PutBlobArgs) -> Result<(), CliError> {
    let body = tokio::fs::read(&args.file).await.map_err(|source| CliError::Io {
        path: args.file.clone(),
        source,
    })?;
    let client = BlobClient::new(transport(settings)?);
    client.put(&args.container, &args.blob, body).await?;
    Ok(())
}
