use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue, InvalidHeaderValue};

/// An [`HttpClient`] wrapper that injects a credential as an HTTP header on
/// every request.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    /// Uses `Authorization: Bearer <token>`, the scheme the fleet backend
    /// expects on every call.
    ///
    /// # Errors
    ///
    /// Fails if the token contains characters not allowed in a header value.
    pub fn bearer(inner: C, token: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name: AUTHORIZATION,
            value,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl HttpClient for Noop {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            unreachable!("not called in these tests")
        }
    }

    #[test]
    fn test_bearer_header_value() {
        let auth = ApiKey::bearer(Noop, "abc123").unwrap();
        assert_eq!(auth.header_name, AUTHORIZATION);
        assert_eq!(auth.value.to_str().unwrap(), "Bearer abc123");
        assert!(auth.value.is_sensitive());
    }

    #[test]
    fn test_bearer_rejects_control_characters() {
        assert!(ApiKey::bearer(Noop, "bad\ntoken").is_err());
    }
}
