use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut cache = assume_role_cache::from_profile().await?;

    let credentials = cache.get_credentials().await?;
    dbg!(&credentials);

    // served from the cache
    let again = cache.get_credentials().await?;
    assert_eq!(credentials, again);

    Ok(())
}
