use crate::error::DiscordError;
use futures::future::{BoxFuture, FutureExt};
use monthgate_core::config::Config;
use monthgate_core::directory::{Category, Channel, Directory, DirectoryError, Overwrite};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const VIEW_CHANNEL: u64 = 1 << 10;
const READ_MESSAGE_HISTORY: u64 = 1 << 16;

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;
const OVERWRITE_TYPE_ROLE: u8 = 0;

const MAX_RATE_LIMIT_RETRIES: u32 = 2;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// DiscordConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub guild_id: String,
    pub api_base: String,
    /// Whole-request limit, including reading the body.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl DiscordConfig {
    pub fn new(token: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            guild_id: guild_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Build from the app config plus a bot token from the environment.
    pub fn from_config(config: &Config, token: impl Into<String>) -> Result<Self, DiscordError> {
        let guild_id = config.guild_id.clone().ok_or(DiscordError::MissingGuild)?;
        Ok(Self::new(token, guild_id))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
}

impl From<ApiChannel> for Channel {
    fn from(c: ApiChannel) -> Self {
        Channel {
            id: c.id,
            name: c.name.unwrap_or_default(),
            parent_id: c.parent_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Allow/deny bitfields for a role overwrite. Discord encodes them as strings.
fn permission_bits(view: bool) -> (String, String) {
    if view {
        ((VIEW_CHANNEL | READ_MESSAGE_HISTORY).to_string(), "0".to_string())
    } else {
        ("0".to_string(), VIEW_CHANNEL.to_string())
    }
}

// ---------------------------------------------------------------------------
// DiscordDirectory
// ---------------------------------------------------------------------------

/// [`Directory`] backed by the Discord REST API, acting as a bot user.
pub struct DiscordDirectory {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordDirectory {
    pub fn new(config: DiscordConfig) -> Result<Self, DiscordError> {
        if config.token.trim().is_empty() {
            return Err(DiscordError::MissingToken);
        }
        if config.guild_id.trim().is_empty() {
            return Err(DiscordError::MissingGuild);
        }

        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|_| DiscordError::InvalidToken)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!(
                "DiscordBot (https://github.com/orchard9/monthgate, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Send a request, waiting out 429s up to [`MAX_RATE_LIMIT_RETRIES`] times.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, DirectoryError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let resp = build()
                .send()
                .await
                .map_err(|e| DirectoryError::Http(e.to_string()))?;
            if resp.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(resp);
            }
            if attempts > MAX_RATE_LIMIT_RETRIES {
                return Err(DirectoryError::RateLimited { attempts });
            }
            let wait = resp
                .json::<RateLimitBody>()
                .await
                .ok()
                .and_then(|b| Duration::try_from_secs_f64(b.retry_after).ok())
                .unwrap_or(Duration::from_secs(1))
                .min(MAX_RETRY_AFTER);
            warn!(attempts, wait_ms = wait.as_millis() as u64, "rate limited by Discord");
            tokio::time::sleep(wait).await;
        }
    }

    async fn fail(resp: Response) -> DirectoryError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        DirectoryError::Status { status, body }
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, DirectoryError> {
        resp.json::<T>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }

    async fn get_category(&self, category_id: &str) -> Result<Option<Category>, DirectoryError> {
        let url = self.url(&format!("/channels/{category_id}"));
        let resp = self.send(|| self.http.get(&url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let channel: ApiChannel = Self::decode(resp).await?;
        if channel.kind != CHANNEL_TYPE_CATEGORY
            || channel.guild_id.as_deref() != Some(self.config.guild_id.as_str())
        {
            debug!(category = %category_id, kind = channel.kind, "id is not a category in this guild");
            return Ok(None);
        }
        Ok(Some(Category {
            id: channel.id,
            name: channel.name.unwrap_or_default(),
        }))
    }

    async fn get_children(&self, category_id: &str) -> Result<Vec<Channel>, DirectoryError> {
        let url = self.url(&format!("/guilds/{}/channels", self.config.guild_id));
        let resp = self.send(|| self.http.get(&url)).await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let channels: Vec<ApiChannel> = Self::decode(resp).await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.parent_id.as_deref() == Some(category_id))
            .map(Channel::from)
            .collect())
    }

    async fn post_channel(&self, category_id: &str, name: &str) -> Result<Channel, DirectoryError> {
        let url = self.url(&format!("/guilds/{}/channels", self.config.guild_id));
        let body = serde_json::json!({
            "name": name,
            "type": CHANNEL_TYPE_TEXT,
            "parent_id": category_id,
        });
        let resp = self.send(|| self.http.post(&url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let channel: ApiChannel = Self::decode(resp).await?;
        Ok(channel.into())
    }

    async fn put_overwrite(&self, channel_id: &str, overwrite: Overwrite) -> Result<(), DirectoryError> {
        let url = self.url(&format!(
            "/channels/{channel_id}/permissions/{}",
            overwrite.principal
        ));
        let (allow, deny) = permission_bits(overwrite.view);
        let body = serde_json::json!({
            "type": OVERWRITE_TYPE_ROLE,
            "allow": allow,
            "deny": deny,
        });
        let resp = self.send(|| self.http.put(&url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(())
    }
}

impl Directory for DiscordDirectory {
    /// The `@everyone` role shares its id with the guild.
    fn everyone_principal(&self) -> String {
        self.config.guild_id.clone()
    }

    fn fetch_category<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Category>, DirectoryError>> {
        self.get_category(category_id).boxed()
    }

    fn list_children<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Channel>, DirectoryError>> {
        self.get_children(category_id).boxed()
    }

    fn create_channel<'a>(
        &'a self,
        category_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Channel, DirectoryError>> {
        self.post_channel(category_id, name).boxed()
    }

    fn set_overwrite<'a>(
        &'a self,
        channel_id: &'a str,
        overwrite: Overwrite,
    ) -> BoxFuture<'a, Result<(), DirectoryError>> {
        self.put_overwrite(channel_id, overwrite).boxed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
