//! Room connection metadata.
//!
//! Before dialing, the client asks the platform API which ingest hosts
//! serve a room and which auth token to present in the handshake. The
//! lookup sits behind [`RoomInfoProvider`] so callers (and tests) can
//! substitute their own source; [`HttpRoomInfoProvider`] is the default.
//!
//! # Endpoint
//!
//! ```text
//! GET {api_base}/xlive/web-room/v1/index/getDanmuInfo?id={room_id}&type=0
//!
//! {"code":0,"message":"0","data":{"token":"...","host_list":[{"host":"..."}]}}
//! ```
//!
//! Metadata is fetched once per connection attempt and never cached.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::RoomId;

// ============================================================================
// Constants
// ============================================================================

/// Default platform API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.live.bilibili.com";

/// Path of the metadata endpoint.
pub const ROOM_INFO_PATH: &str = "/xlive/web-room/v1/index/getDanmuInfo";

/// Ingest host used when the API returns no host list.
pub const DEFAULT_HOST: &str = "broadcastlv.chat.bilibili.com";

// ============================================================================
// RoomInfo
// ============================================================================

/// Connection metadata for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// Host dialed first.
    pub primary_host: String,
    /// Remaining hosts, in API order.
    pub fallback_hosts: Vec<String>,
    /// Auth token for the handshake.
    pub token: String,
}

impl RoomInfo {
    /// Builds metadata from an ordered host list and a token.
    ///
    /// The first host becomes primary. [`DEFAULT_HOST`] is appended as the
    /// last fallback if absent, and used as primary if the list is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenMissing`] if `token` is empty.
    pub fn new(
        room_id: RoomId,
        hosts: impl IntoIterator<Item = String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::token_missing(room_id));
        }

        let mut hosts = hosts
            .into_iter()
            .filter(|host| !host.is_empty())
            .collect::<Vec<_>>();
        if !hosts.iter().any(|host| host == DEFAULT_HOST) {
            hosts.push(DEFAULT_HOST.to_string());
        }

        let primary_host = hosts.remove(0);
        Ok(Self {
            primary_host,
            fallback_hosts: hosts,
            token,
        })
    }

    /// Returns every host, primary first.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_host.as_str())
            .chain(self.fallback_hosts.iter().map(String::as_str))
    }
}

// ============================================================================
// RoomInfoProvider
// ============================================================================

/// Source of room connection metadata.
#[async_trait]
pub trait RoomInfoProvider: Send + Sync {
    /// Fetches metadata for a room.
    ///
    /// # Errors
    ///
    /// - [`Error::MetadataUnavailable`] if the source is unreachable or the
    ///   response cannot be understood
    /// - [`Error::TokenMissing`] if no token is available
    async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo>;
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<DanmuInfo>,
}

#[derive(Debug, Deserialize)]
struct DanmuInfo {
    #[serde(default)]
    token: String,
    #[serde(default)]
    host_list: Vec<HostEntry>,
}

#[derive(Debug, Deserialize)]
struct HostEntry {
    host: String,
}

// ============================================================================
// HttpRoomInfoProvider
// ============================================================================

/// Fetches room metadata from the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRoomInfoProvider {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRoomInfoProvider {
    /// Creates a provider for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `api_base` is not a valid URL.
    pub fn new(api_base: &str) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), api_base)
    }

    /// Creates a provider reusing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `api_base` is not a valid URL.
    pub fn with_client(client: reqwest::Client, api_base: &str) -> Result<Self> {
        let endpoint = Url::parse(api_base)?.join(ROOM_INFO_PATH)?;
        Ok(Self { client, endpoint })
    }

    /// Returns the request URL for a room.
    #[must_use]
    pub fn endpoint_for(&self, room_id: RoomId) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("id", &room_id.to_string())
            .append_pair("type", "0");
        url
    }
}

#[async_trait]
impl RoomInfoProvider for HttpRoomInfoProvider {
    async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo> {
        let url = self.endpoint_for(room_id);
        debug!(%room_id, %url, "Fetching room metadata");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(%room_id, error = %e, "Room metadata request failed");
            Error::metadata_unavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(%room_id, %status, "Room metadata request rejected");
            return Err(Error::metadata_unavailable(format!("HTTP status {status}")));
        }

        let body: ApiResponse = response.json().await.map_err(|e| {
            error!(%room_id, error = %e, "Room metadata response unparseable");
            Error::metadata_unavailable(e.to_string())
        })?;

        if body.code != 0 {
            error!(%room_id, code = body.code, message = %body.message, "Room metadata API error");
            return Err(Error::metadata_unavailable(format!(
                "API code {}: {}",
                body.code, body.message
            )));
        }

        let data = body
            .data
            .ok_or_else(|| Error::metadata_unavailable("response has no data"))?;

        let info = RoomInfo::new(
            room_id,
            data.host_list.into_iter().map(|entry| entry.host),
            data.token,
        )
        .inspect_err(|e| error!(%room_id, error = %e, "Room metadata rejected"))?;

        debug!(
            %room_id,
            host = %info.primary_host,
            fallbacks = info.fallback_hosts.len(),
            "Room metadata fetched"
        );
        Ok(info)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ROOM_INFO_PATH))
            .and(query_param("id", "456"))
            .and(query_param("type", "0"))
            .respond_with(body)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_room_info_orders_hosts() {
        let info = RoomInfo::new(
            RoomId::new(1),
            ["a.example.com".to_string(), "b.example.com".to_string()],
            "tok",
        )
        .unwrap();

        assert_eq!(info.primary_host, "a.example.com");
        assert_eq!(
            info.hosts().collect::<Vec<_>>(),
            ["a.example.com", "b.example.com", DEFAULT_HOST]
        );
    }

    #[test]
    fn test_room_info_empty_host_list() {
        let info = RoomInfo::new(RoomId::new(1), Vec::new(), "tok").unwrap();
        assert_eq!(info.primary_host, DEFAULT_HOST);
        assert!(info.fallback_hosts.is_empty());
    }

    #[test]
    fn test_room_info_requires_token() {
        let err = RoomInfo::new(RoomId::new(9), Vec::new(), "").unwrap_err();
        assert!(matches!(err, Error::TokenMissing { room_id } if room_id == RoomId::new(9)));
    }

    #[test]
    fn test_endpoint_for() {
        let provider = HttpRoomInfoProvider::new("https://api.example.com").unwrap();
        assert_eq!(
            provider.endpoint_for(RoomId::new(456)).as_str(),
            "https://api.example.com/xlive/web-room/v1/index/getDanmuInfo?id=456&type=0"
        );
    }

    #[test]
    fn test_invalid_api_base() {
        let err = HttpRoomInfoProvider::new("not a url").unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = serve(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "0",
            "data": {
                "token": "secret",
                "host_list": [
                    {"host": "zj-cn-live-comet.chat.bilibili.com", "port": 2243, "wss_port": 443},
                    {"host": "bd-bj-live-comet.chat.bilibili.com", "port": 2243, "wss_port": 443}
                ]
            }
        })))
        .await;

        let provider = HttpRoomInfoProvider::new(&server.uri()).unwrap();
        let info = provider.room_info(RoomId::new(456)).await.unwrap();

        assert_eq!(info.token, "secret");
        assert_eq!(info.primary_host, "zj-cn-live-comet.chat.bilibili.com");
        assert_eq!(info.fallback_hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_missing_token() {
        let server = serve(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "host_list": [] }
        })))
        .await;

        let provider = HttpRoomInfoProvider::new(&server.uri()).unwrap();
        let err = provider.room_info(RoomId::new(456)).await.unwrap_err();
        assert!(matches!(err, Error::TokenMissing { .. }));
    }

    #[tokio::test]
    async fn test_fetch_api_error_code() {
        let server = serve(ResponseTemplate::new(200).set_body_json(json!({
            "code": -352,
            "message": "rejected"
        })))
        .await;

        let provider = HttpRoomInfoProvider::new(&server.uri()).unwrap();
        let err = provider.room_info(RoomId::new(456)).await.unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
        assert!(err.to_string().contains("-352"));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = serve(ResponseTemplate::new(503)).await;

        let provider = HttpRoomInfoProvider::new(&server.uri()).unwrap();
        let err = provider.room_info(RoomId::new(456)).await.unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unparseable_body() {
        let server = serve(ResponseTemplate::new(200).set_body_string("<html>")).await;

        let provider = HttpRoomInfoProvider::new(&server.uri()).unwrap();
        let err = provider.room_info(RoomId::new(456)).await.unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let provider = HttpRoomInfoProvider::new("http://127.0.0.1:1").unwrap();
        let err = provider.room_info(RoomId::new(456)).await.unwrap_err();
        assert!(err.is_establishment_error());
    }
}
