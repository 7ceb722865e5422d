use futures_util::future::{BoxFuture, FutureExt};
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{ResponseCache, make_cache_key};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::metrics::{API_ERRORS, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::rate_limit::RateLimiter;

const API_KEY_HEADER: &str = "x-apikey";

// One logical API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, e.g. `/projects/1/assets`.
    pub path: String,
    pub body: Option<Value>,
    pub cacheable: bool,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            cacheable: true,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            cacheable: false,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
            cacheable: false,
        }
    }

    /// Read-only POST (searches) whose response may be cached.
    pub fn query(path: impl Into<String>, body: Value) -> Self {
        Self {
            cacheable: true,
            ..Self::post(path, body)
        }
    }

    pub fn fingerprint(&self) -> String {
        make_cache_key(self.method.as_str(), &self.path, self.body.as_ref())
    }

    // `/projects/{id}/` for project-scoped paths
    fn project_scope(&self) -> Option<String> {
        let mut parts = self.path.trim_start_matches('/').split('/');
        match (parts.next(), parts.next()) {
            (Some("projects"), Some(id)) if !id.is_empty() => Some(format!("/projects/{}/", id)),
            _ => None,
        }
    }
}

/// Runs requests through the cache and the rate limiter.
pub struct RequestExecutor {
    http: reqwest::Client,
    base_url: Arc<str>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    ttl: Duration,
}

impl RequestExecutor {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?;
        api_key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            cache: Arc::new(ResponseCache::new()),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_calls,
                config.rate_limit_period,
            )),
            ttl: config.cache_ttl,
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Raw response body for `request`.
    pub async fn execute(&self, request: ApiRequest) -> Result<String> {
        REQUEST_TOTAL.inc();
        let start_time = Instant::now();

        let result = if request.cacheable && !self.ttl.is_zero() {
            let key = request.fingerprint();
            let scope = request.path.clone();
            self.cache
                .get_or_fetch(&key, &scope, self.ttl, || self.dispatch(request))
                .await
        } else {
            let scope = request.project_scope().filter(|_| !request.cacheable);
            let result = self.dispatch(request).await;
            if let (Ok(_), Some(scope)) = (&result, scope) {
                self.cache.invalidate_scope(&scope);
            }
            result
        };

        REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
        result
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let path = request.path.clone();
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| Error::Api {
            message: format!("failed to decode response from {}: {}", path, e),
            status_code: None,
            body: Some(body),
        })
    }

    // Admission + network call on a detached task: an abandoned caller does
    // not cancel a request that is already under way.
    fn dispatch(&self, request: ApiRequest) -> BoxFuture<'static, Result<String>> {
        let call = Dispatch {
            http: self.http.clone(),
            base_url: Arc::clone(&self.base_url),
            limiter: Arc::clone(&self.limiter),
            request,
        };
        let task = tokio::spawn(call.run());
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Error::api(format!("request task failed: {}", e))),
            }
        }
        .boxed()
    }
}

struct Dispatch {
    http: reqwest::Client,
    base_url: Arc<str>,
    limiter: Arc<RateLimiter>,
    request: ApiRequest,
}

impl Dispatch {
    async fn run(self) -> Result<String> {
        self.limiter.admit().await;

        let ApiRequest {
            method,
            path,
            body,
            ..
        } = self.request;
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %path, "sending request");

        let mut builder = self.http.request(method.clone(), url.as_str());
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let result = match builder.send().await {
            Ok(res) => {
                let status = res.status();
                match res.text().await {
                    Ok(text) if status.is_success() => Ok(text),
                    Ok(text) => Err(Error::Api {
                        message: format!("{} {} failed with status {}", method, path, status),
                        status_code: Some(status.as_u16()),
                        body: (!text.is_empty()).then_some(text),
                    }),
                    Err(e) => Err(Error::Api {
                        message: format!("{} {}: failed to read response: {}", method, path, e),
                        status_code: Some(status.as_u16()),
                        body: None,
                    }),
                }
            }
            Err(e) => Err(Error::from(e)),
        };

        if let Err(e) = &result {
            API_ERRORS.inc();
            warn!(%method, %path, status = ?e.status_code(), "request failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_are_cacheable_writes_are_not() {
        assert!(ApiRequest::get("/projects").cacheable);
        assert!(ApiRequest::query("/projects/1/findings/search", json!({})).cacheable);
        assert!(!ApiRequest::post("/projects/1/assets", json!({})).cacheable);
        assert!(!ApiRequest::put("/projects/1/findings", json!({})).cacheable);
    }

    #[test]
    fn project_scope_from_path() {
        let put = ApiRequest::put("/projects/42/assets/7", json!({}));
        assert_eq!(put.project_scope().as_deref(), Some("/projects/42/"));
        assert_eq!(ApiRequest::get("/projects").project_scope(), None);
        assert_eq!(ApiRequest::get("/users/1").project_scope(), None);
    }

    #[test]
    fn fingerprint_ignores_cacheability() {
        let body = json!({"filters": [{"property": "finding_severity"}]});
        let a = ApiRequest::query("/projects/1/findings/search", body.clone());
        let b = ApiRequest::post("/projects/1/findings/search", body);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(
            a.fingerprint(),
            ApiRequest::get("/projects/1/findings/search").fingerprint()
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ClientConfig::new("");
        assert!(matches!(RequestExecutor::new(&config), Err(Error::Config(_))));

        let config = ClientConfig::new("bad\nkey");
        assert!(matches!(RequestExecutor::new(&config), Err(Error::Config(_))));
    }
}
