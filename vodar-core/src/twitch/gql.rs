use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{PlaybackAccessToken, TwitchError, TwitchResult, Video};

pub const GQL_ENDPOINT: &str = "https://gql.twitch.tv/gql";
pub const TWITCH_CLIENT_ID: &str = "kd1unb4b3q4t58fwlpcbzcbnm76a8fp";

const USER_AGENT: &str = "vodar/1.0";
const CHANNEL_PAGE_SIZE: u32 = 10;

fn video_query(video_id: &str) -> String {
    format!(
        r#"{{
  video(id: "{video_id}") {{
    id
    title
    description
    publishedAt
    broadcastType
    lengthSeconds
  }}
}}"#
    )
}

fn channel_videos_query(login: &str) -> String {
    format!(
        r#"{{
  user(login: "{login}") {{
    videos(first: {CHANNEL_PAGE_SIZE}, type: ARCHIVE, sort: TIME) {{
      edges {{
        node {{
          id
          title
          description
          publishedAt
          broadcastType
          lengthSeconds
        }}
      }}
    }}
  }}
}}"#
    )
}

fn playback_token_query(video_id: &str) -> String {
    format!(
        r#"{{
  videoPlaybackAccessToken(
    id: "{video_id}",
    params: {{
      platform: "web",
      playerBackend: "mediaplayer",
      playerType: "site"
    }}
  ) {{
    value
    signature
  }}
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    data: VideoData,
}

#[derive(Debug, Deserialize)]
struct VideoData {
    video: Option<Video>,
}

#[derive(Debug, Deserialize)]
struct ChannelVideosResponse {
    data: ChannelData,
}

#[derive(Debug, Deserialize)]
struct ChannelData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    videos: VideoConnection,
}

#[derive(Debug, Deserialize)]
struct VideoConnection {
    edges: Vec<VideoEdge>,
}

#[derive(Debug, Deserialize)]
struct VideoEdge {
    node: Video,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(rename = "videoPlaybackAccessToken")]
    video_playback_access_token: Option<PlaybackAccessToken>,
}

/// Client for the platform's GraphQL metadata endpoint. Every call is a
/// single POSTed query identified by the fixed `Client-Id` header.
#[derive(Debug, Clone)]
pub struct GqlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GqlClient {
    pub fn new() -> TwitchResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> TwitchResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: GQL_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn post_query<T: DeserializeOwned>(&self, query: String) -> TwitchResult<T> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Client-Id", TWITCH_CLIENT_ID)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TwitchError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: self.endpoint.clone(),
            });
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "gql response received");
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches one video's metadata. An explicit `"video": null` in the
    /// response body is `NotFound`; everything else that is not a decodable
    /// 200 is a transient failure.
    pub async fn fetch_video(&self, video_id: &str) -> TwitchResult<Video> {
        let response: VideoResponse = self.post_query(video_query(video_id)).await?;
        response.data.video.ok_or(TwitchError::NotFound)
    }

    /// Fetches the channel's most recent archive-type videos (bounded page).
    /// An unknown login is an explicit empty result, not an error.
    pub async fn fetch_channel_videos(&self, login: &str) -> TwitchResult<Vec<Video>> {
        let response: ChannelVideosResponse =
            self.post_query(channel_videos_query(login)).await?;
        let videos = match response.data.user {
            Some(user) => user.videos.edges.into_iter().map(|edge| edge.node).collect(),
            None => Vec::new(),
        };
        Ok(videos)
    }

    pub async fn fetch_playback_token(&self, video_id: &str) -> TwitchResult<PlaybackAccessToken> {
        let response: TokenResponse = self.post_query(playback_token_query(video_id)).await?;
        response
            .data
            .video_playback_access_token
            .ok_or(TwitchError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_query_embeds_the_id() {
        let query = video_query("2220004521");
        assert!(query.contains(r#"video(id: "2220004521")"#));
        assert!(query.contains("lengthSeconds"));
    }

    #[test]
    fn channel_query_requests_a_bounded_archive_page() {
        let query = channel_videos_query("enssatv");
        assert!(query.contains(r#"user(login: "enssatv")"#));
        assert!(query.contains("first: 10"));
        assert!(query.contains("type: ARCHIVE"));
    }

    #[test]
    fn token_query_targets_the_web_player() {
        let query = playback_token_query("2220004521");
        assert!(query.contains(r#"videoPlaybackAccessToken("#));
        assert!(query.contains(r#"platform: "web""#));
        assert!(query.contains("signature"));
    }

    #[test]
    fn decodes_a_video_response() {
        let body = r#"{
            "data": {
                "video": {
                    "id": "2220004521",
                    "title": "Example Stream",
                    "description": "weekly show",
                    "publishedAt": "2024-08-02T18:00:00Z",
                    "broadcastType": "ARCHIVE",
                    "lengthSeconds": 5430
                }
            }
        }"#;
        let response: VideoResponse = serde_json::from_str(body).unwrap();
        let video = response.data.video.unwrap();
        assert_eq!(video.id, "2220004521");
        assert_eq!(video.title, "Example Stream");
        assert_eq!(video.duration, 5430);
    }

    #[test]
    fn null_video_decodes_to_none() {
        let body = r#"{"data": {"video": null}}"#;
        let response: VideoResponse = serde_json::from_str(body).unwrap();
        assert!(response.data.video.is_none());
    }

    #[test]
    fn decodes_a_channel_page() {
        let body = r#"{
            "data": {
                "user": {
                    "videos": {
                        "edges": [
                            {"node": {"id": "1", "title": "a", "description": "", "publishedAt": "2024-01-01T00:00:00Z", "lengthSeconds": 10}},
                            {"node": {"id": "2", "title": "b", "description": "", "publishedAt": "2024-01-02T00:00:00Z", "lengthSeconds": 20}}
                        ]
                    }
                }
            }
        }"#;
        let response: ChannelVideosResponse = serde_json::from_str(body).unwrap();
        let videos: Vec<Video> = response
            .data
            .user
            .unwrap()
            .videos
            .edges
            .into_iter()
            .map(|edge| edge.node)
            .collect();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[1].id, "2");
    }

    #[test]
    fn decodes_a_playback_token() {
        let body = r#"{
            "data": {
                "videoPlaybackAccessToken": {
                    "value": "{\"authorization\":{}}",
                    "signature": "deadbeef"
                }
            }
        }"#;
        let response: TokenResponse = serde_json::from_str(body).unwrap();
        let token = response.data.video_playback_access_token.unwrap();
        assert_eq!(token.signature, "deadbeef");
    }
}
