use aws_types_integration::provider::ProvideCredentials;

use assume_role_cache::SharedCredentialCache;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let provider = SharedCredentialCache::new(assume_role_cache::from_profile().await?);

    let credentials = provider.provide_credentials().await?;

    dbg!(credentials);

    Ok(())
}
