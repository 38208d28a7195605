use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::Arc;

/// Executes a prepared request. Wrappers such as [`super::auth::ApiKey`]
/// decorate a request before handing it to the inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req).await
    }
}
