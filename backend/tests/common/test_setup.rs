use axum::{body::Body, http::Request, response::Response, Router};
use b2_pipeline::test_utils::MockB2Server;
use backend::{server, types::Environment};
use tower::ServiceExt;

use super::utils::MULTIPART_BOUNDARY;

/// Bucket the test router uploads into
pub const TEST_BUCKET: &str = "photos";

/// Setup test environment variables with all the required configuration
pub fn setup_test_env() {
    // Load test environment variables
    dotenvy::from_path(".env.example").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Router wired to an in-process mock B2 account
pub struct TestSetup {
    pub router: Router,
    pub environment: Environment,
    pub mock: MockB2Server,
}

impl TestSetup {
    pub async fn new() -> Self {
        setup_test_env();

        let mock = MockB2Server::start().await;
        let environment = Environment::Development {
            b2_api_url_override: Some(mock.base_url().to_string()),
        };

        let pipeline = mock.pipeline(mock.credentials(TEST_BUCKET));
        let router = server::build_router(&environment, pipeline);

        Self {
            router,
            environment,
            mock,
        }
    }

    pub async fn send_post_request(
        &self,
        route: &str,
        payload: serde_json::Value,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        self.send_raw_post(route, "application/json", payload.to_string().into_bytes())
            .await
    }

    /// Posts a `multipart/form-data` body built by [`super::multipart_body`]
    pub async fn send_multipart_request(
        &self,
        route: &str,
        body: Vec<u8>,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let content_type = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");
        self.send_raw_post(route, &content_type, body).await
    }

    pub async fn send_raw_post(
        &self,
        route: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", content_type)
            .body(Body::from(body))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_get_request(
        &self,
        route: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }
}
