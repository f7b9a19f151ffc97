use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::{PostLookup, SocialPlatform};
use oauth1_request as oauth;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trendcaster_core::{
    CoreError, Credentials, EngagementCounters, PlatformApiError, Settings,
};

const USER_AGENT: &str = "trendcaster/0.1";
const LOOKUP_FIELDS: &str = "public_metrics,created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPost {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetData {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub bookmark_count: u64,
    #[serde(default)]
    pub impression_count: u64,
}

impl From<PublicMetrics> for EngagementCounters {
    fn from(metrics: PublicMetrics) -> Self {
        Self {
            likes: metrics.like_count,
            retweets: metrics.retweet_count,
            replies: metrics.reply_count,
            quotes: metrics.quote_count,
            bookmarks: metrics.bookmark_count,
            impressions: metrics.impression_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XUser {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// OAuth 1.0a user-context keys: the app's consumer pair plus the account
/// owner's access pair
#[derive(Clone)]
pub struct UserKeys {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl UserKeys {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            consumer_key: credentials.api_key.clone(),
            consumer_secret: credentials.api_secret.clone(),
            access_token: credentials.access_token.clone(),
            access_secret: credentials.access_secret.clone(),
        }
    }

    /// `Authorization` header value for one request. Only the method and the
    /// URL are signed; JSON bodies are not part of the signature base.
    fn sign(&self, method: &Method, url: &str) -> String {
        let token = oauth::Token::from_parts(
            self.consumer_key.as_str(),
            self.consumer_secret.as_str(),
            self.access_token.as_str(),
            self.access_secret.as_str(),
        );

        if *method == Method::POST {
            oauth::post(url, &(), &token, oauth::HMAC_SHA1)
        } else {
            oauth::get(url, &(), &token, oauth::HMAC_SHA1)
        }
    }
}

impl std::fmt::Debug for UserKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserKeys")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// How a request is authorized
#[derive(Debug, Clone, Copy)]
enum AuthContext {
    /// OAuth 1.0a signature for the account owner, required for writes
    User,
    /// The application bearer token, used for public reads
    App,
}

#[derive(Debug)]
pub struct XApiClient {
    http_client: Client,
    write_limiter: Arc<RateLimiter>,
    read_limiter: Arc<RateLimiter>,
    base_url: String,
    user_keys: UserKeys,
    app_token: String,
}

impl XApiClient {
    pub fn new(credentials: &Credentials, settings: &Settings) -> Result<Self, CoreError> {
        Self::with_base_url(
            &settings.x_api_base_url,
            UserKeys::from_credentials(credentials),
            credentials.bearer_token.clone(),
            settings.request_timeout(),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        user_keys: UserKeys,
        app_token: String,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            write_limiter: Arc::new(RateLimiter::new(RateLimitConfig::x_posts())),
            read_limiter: Arc::new(RateLimiter::new(RateLimitConfig::x_reads())),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_keys,
            app_token,
        })
    }

    async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        auth: AuthContext,
        query_params: Option<&[(&str, &str)]>,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let limiter = match auth {
            AuthContext::User => &self.write_limiter,
            AuthContext::App => &self.read_limiter,
        };
        let _permit = limiter.acquire_permit().await;
        debug!("Acquired rate limit permit for {} {}", method, endpoint);

        let mut request_builder = self.http_client.request(method.clone(), &url);
        request_builder = match auth {
            AuthContext::User => {
                request_builder.header(AUTHORIZATION, self.user_keys.sign(&method, &url))
            }
            AuthContext::App => request_builder.bearer_auth(&self.app_token),
        };

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(body) = body {
            request_builder = request_builder.json(body);
        }

        info!("Making platform API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::PlatformApi(PlatformApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let error = match status.as_u16() {
            401 => PlatformApiError::InvalidToken,
            403 => PlatformApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => PlatformApiError::PostNotFound {
                post_id: endpoint.rsplit('/').next().unwrap_or(endpoint).to_string(),
            },
            429 => {
                let retry_after = retry_after_seconds(&response);
                warn!("Rate limited, retry after {} seconds", retry_after);
                PlatformApiError::RateLimitExceeded { retry_after }
            }
            code if status.is_server_error() => PlatformApiError::ServerError { status_code: code },
            code => PlatformApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", code, endpoint),
            },
        };
        Err(CoreError::PlatformApi(error))
    }

    /// Publish a post on behalf of the account owner
    pub async fn create_post(
        &self,
        text: &str,
        media_ids: Option<&[String]>,
    ) -> Result<CreatedPost, CoreError> {
        let mut body = json!({ "text": text });
        if let Some(ids) = media_ids.filter(|ids| !ids.is_empty()) {
            body["media"] = json!({ "media_ids": ids });
        }

        let response = self
            .make_request(Method::POST, "/2/tweets", AuthContext::User, None, Some(&body))
            .await?;

        let envelope: DataEnvelope<CreatedPost> = response.json().await.map_err(|e| {
            error!("Failed to parse created post: {}", e);
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: "Failed to parse created post".to_string(),
            })
        })?;

        let created = envelope.data.ok_or_else(|| {
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: problem_summary(&envelope.errors),
            })
        })?;

        info!("Post created with id {}", created.id);
        Ok(created)
    }

    /// Look up a post with its public metrics. `Ok(None)` when the platform
    /// answers without data (deleted or withheld posts).
    pub async fn get_post(&self, post_id: &str) -> Result<Option<TweetData>, CoreError> {
        let endpoint = format!("/2/tweets/{}", post_id);
        let params = [("tweet.fields", LOOKUP_FIELDS)];

        let response = self
            .make_request(Method::GET, &endpoint, AuthContext::App, Some(&params), None)
            .await?;

        let envelope: DataEnvelope<TweetData> = response.json().await.map_err(|e| {
            error!("Failed to parse post {}: {}", post_id, e);
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: format!("Failed to parse post {}", post_id),
            })
        })?;

        if envelope.data.is_none() && !envelope.errors.is_empty() {
            warn!(
                "Lookup of post {} returned no data: {}",
                post_id,
                problem_summary(&envelope.errors)
            );
        }

        Ok(envelope.data)
    }

    /// The account the user token belongs to
    pub async fn get_me(&self) -> Result<XUser, CoreError> {
        let response = self
            .make_request(Method::GET, "/2/users/me", AuthContext::User, None, None)
            .await?;

        let envelope: DataEnvelope<XUser> = response.json().await.map_err(|e| {
            error!("Failed to parse user data: {}", e);
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: "Failed to parse user data".to_string(),
            })
        })?;

        let user = envelope.data.ok_or_else(|| {
            CoreError::PlatformApi(PlatformApiError::AuthenticationFailed {
                reason: problem_summary(&envelope.errors),
            })
        })?;

        debug!("Authenticated as @{}", user.username);
        Ok(user)
    }

    pub async fn get_rate_limit_status(&self) -> (RateLimitStatus, RateLimitStatus) {
        (
            self.write_limiter.get_rate_limit_status().await,
            self.read_limiter.get_rate_limit_status().await,
        )
    }
}

impl SocialPlatform for XApiClient {
    async fn create_post(
        &self,
        text: &str,
        media_ids: Option<&[String]>,
    ) -> Result<String, CoreError> {
        XApiClient::create_post(self, text, media_ids)
            .await
            .map(|created| created.id)
    }

    async fn lookup_post(&self, post_id: &str) -> Result<Option<PostLookup>, CoreError> {
        let post = self.get_post(post_id).await?;
        Ok(post.map(|data| PostLookup {
            post_id: data.id,
            counters: data.public_metrics.unwrap_or_default().into(),
            created_at: data.created_at,
        }))
    }
}

/// Seconds to wait after a 429, from `retry-after` or the `x-rate-limit-reset` epoch
fn retry_after_seconds(response: &Response) -> u64 {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
    };

    if let Some(seconds) = header("retry-after") {
        return seconds.max(0) as u64;
    }
    if let Some(reset_at) = header("x-rate-limit-reset") {
        let now = chrono::Utc::now().timestamp();
        return (reset_at - now).max(0) as u64;
    }
    60
}

fn problem_summary(problems: &[ApiProblem]) -> String {
    let details: Vec<&str> = problems
        .iter()
        .filter_map(|p| p.detail.as_deref().or(p.title.as_deref()))
        .collect();
    if details.is_empty() {
        "response contained no data".to_string()
    } else {
        details.join("; ")
    }
}
