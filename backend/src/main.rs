use b2_pipeline::B2UploadPipeline;
use backend::{server, types::Environment};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();

    // JSON logs for staging/production, human-readable for development
    if environment.json_logs() {
        fmt().json().with_env_filter(env_filter).init();
    } else {
        fmt().with_env_filter(env_filter).init();
    }

    let pipeline = B2UploadPipeline::new(environment.b2_credentials()?)?
        .with_auth_base_url(environment.b2_auth_base_url());

    tracing::info!(
        bucket = pipeline.bucket_name(),
        "B2 upload pipeline configured"
    );

    server::start(&environment, pipeline).await
}
