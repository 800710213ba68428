use crate::{NowPlayingUpdate, ScrobbleError, ScrobbleService, ScrobbleSubmission};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LovedResponse {
    loved: bool,
}

pub struct HttpScrobbleClient {
    http: Client,
    endpoint: String,
    api_key: String,
    session_key: String,
}

impl HttpScrobbleClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        session_key: impl Into<String>,
    ) -> Result<Self, ScrobbleError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("scrobble-relay/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            session_key: session_key.into(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.endpoint, route)
    }

    async fn post_json(
        &self,
        route: &str,
        body: &impl serde::Serialize,
    ) -> Result<Response, ScrobbleError> {
        let response = self
            .http
            .post(self.url(route))
            .header("x-api-key", &self.api_key)
            .header("x-session-key", &self.session_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }
}

#[async_trait]
impl ScrobbleService for HttpScrobbleClient {
    async fn submit_completion(
        &self,
        submission: &ScrobbleSubmission,
    ) -> Result<(), ScrobbleError> {
        debug!(track = %submission.track, "submitting scrobble");
        self.post_json("track/scrobble", submission).await?;
        Ok(())
    }

    async fn update_now_playing(&self, update: &NowPlayingUpdate) -> Result<(), ScrobbleError> {
        self.post_json("track/now-playing", update).await?;
        Ok(())
    }

    async fn query_favorite(&self, artist: &str, track: &str) -> Result<bool, ScrobbleError> {
        let response = self
            .http
            .get(self.url("track/love"))
            .header("x-api-key", &self.api_key)
            .header("x-session-key", &self.session_key)
            .query(&[("artist", artist), ("track", track)])
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let loved: LovedResponse = response
            .json()
            .await
            .map_err(|e| ScrobbleError::Parse(e.to_string()))?;
        Ok(loved.loved)
    }

    async fn set_favorite(
        &self,
        artist: &str,
        track: &str,
        loved: bool,
    ) -> Result<(), ScrobbleError> {
        let body = serde_json::json!({
            "artist": artist,
            "track": track,
            "loved": loved,
        });
        self.post_json("track/love", &body).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> ScrobbleError {
    if err.is_connect() || err.is_timeout() {
        ScrobbleError::Unreachable(err.to_string())
    } else {
        ScrobbleError::Request(err)
    }
}

async fn check_status(response: Response) -> Result<Response, ScrobbleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ScrobbleError::Service {
        status: status.as_u16(),
        message,
    })
}
