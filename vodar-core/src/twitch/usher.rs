use reqwest::Client;
use url::Url;

use super::{PlaybackAccessToken, TwitchError, TwitchResult};

pub const USHER_ENDPOINT: &str = "https://usher.ttvnw.net/vod";

const PLAYER_LABEL: &str = "twitchweb";

/// Builds the CDN master-manifest URL for one video, carrying the playback
/// token as `nauth`/`nauthsig` plus the fixed variant flags.
pub fn master_manifest_url(video_id: &str, token: &PlaybackAccessToken) -> TwitchResult<String> {
    let mut url = Url::parse(&format!("{USHER_ENDPOINT}/{video_id}"))?;
    url.query_pairs_mut()
        .append_pair("nauth", &token.value)
        .append_pair("nauthsig", &token.signature)
        .append_pair("allow_audio_only", "true")
        .append_pair("allow_source", "true")
        .append_pair("player", PLAYER_LABEL);
    Ok(String::from(url))
}

/// Fetches the master manifest text. Anything but HTTP 200 is a transient
/// failure.
pub async fn fetch_master_manifest(
    http: &Client,
    video_id: &str,
    token: &PlaybackAccessToken,
) -> TwitchResult<String> {
    let url = master_manifest_url(video_id, token)?;
    let response = http.get(&url).send().await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(TwitchError::UnexpectedStatus {
            status: status.as_u16(),
            endpoint: url,
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_carries_token_and_flags() {
        let token = PlaybackAccessToken {
            value: "tok".into(),
            signature: "sig".into(),
        };
        let url = master_manifest_url("2220004521", &token).unwrap();
        assert!(url.starts_with("https://usher.ttvnw.net/vod/2220004521?"));
        assert!(url.contains("nauth=tok"));
        assert!(url.contains("nauthsig=sig"));
        assert!(url.contains("allow_audio_only=true"));
        assert!(url.contains("allow_source=true"));
        assert!(url.contains("player=twitchweb"));
    }
}
