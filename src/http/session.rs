use crate::domain::{Color, Light, OperationResult, Scene, Selector};
use crate::error::ClientError;
use crate::http::responses::{LightResponse, ResultsResponse, SceneResponse};
use crate::remote::RemoteService;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.lifx.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// [`RemoteService`] implementation against the LIFX cloud API.
///
/// Holds a connection-pooling HTTP client with the access token, accept header and request
/// timeout baked in. One instance is moved into the [`crate::Client`] and shared behind it.
pub struct HttpRemoteService {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct StateRequest<'a> {
    duration: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    power: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness: Option<f64>,
}

#[derive(Serialize)]
struct ToggleRequest {
    duration: f32,
}

#[derive(Serialize)]
struct ActivateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f32>,
}

impl HttpRemoteService {
    pub fn new(access_token: &str) -> Result<Self, ClientError> {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(access_token: &str, base_url: impl Into<String>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| ClientError::Transport("access token is not a valid header value".to_string()))?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(HttpRemoteService { http, base_url: base_url.into() })
    }

    fn url(&self, path: impl AsRef<str>) -> String {
        format!("{}/{}", self.base_url, path.as_ref())
    }

    /// Maps the API's failure statuses onto the client error taxonomy; success statuses
    /// pass the response through for decoding.
    fn checked(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        match status {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized(status.as_u16())),
            StatusCode::TOO_MANY_REQUESTS => Err(ClientError::RateLimited),
            status => Err(ClientError::UnexpectedStatus(status.as_u16())),
        }
    }

    async fn decode_results(response: Response) -> Result<Vec<OperationResult>, ClientError> {
        let results = Self::checked(response)?.json::<ResultsResponse>().await.map_err(invalid_payload)?;
        Ok(results.into_results())
    }
}

fn transport(error: reqwest::Error) -> ClientError {
    ClientError::Transport(error.to_string())
}

fn invalid_payload(error: reqwest::Error) -> ClientError {
    ClientError::InvalidPayload(error.to_string())
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    #[instrument(skip(self))]
    async fn fetch_lights(&self, selector: &Selector) -> Result<Vec<Light>, ClientError> {
        let response = self.http.get(self.url(format!("lights/{selector}"))).send().await.map_err(transport)?;
        let lights = Self::checked(response)?.json::<Vec<LightResponse>>().await.map_err(invalid_payload)?;
        debug!("🔵 Decoded {} light(s)", lights.len());
        Ok(lights.into_iter().map(LightResponse::into_light).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_scenes(&self) -> Result<Vec<Scene>, ClientError> {
        let response = self.http.get(self.url("scenes")).send().await.map_err(transport)?;
        let scenes = Self::checked(response)?.json::<Vec<SceneResponse>>().await.map_err(invalid_payload)?;
        debug!("🔵 Decoded {} scene(s)", scenes.len());
        Ok(scenes.into_iter().map(SceneResponse::into_scene).collect())
    }

    #[instrument(skip(self))]
    async fn apply_state(
        &self,
        selector: &Selector,
        power: Option<bool>,
        color: Option<Color>,
        brightness: Option<f64>,
        duration: f32,
    ) -> Result<Vec<OperationResult>, ClientError> {
        let body = StateRequest {
            duration,
            power: power.map(|power| if power { "on" } else { "off" }),
            color: color.map(|color| color.to_query_string()),
            brightness,
        };
        let response = self.http.put(self.url(format!("lights/{selector}/state"))).json(&body).send().await.map_err(transport)?;
        Self::decode_results(response).await
    }

    #[instrument(skip(self))]
    async fn activate_scene(&self, selector: &Selector, duration: Option<f32>) -> Result<Vec<OperationResult>, ClientError> {
        if !matches!(selector, Selector::Scene(_)) {
            return Err(ClientError::UnacceptableSelector(selector.clone()));
        }

        let body = ActivateRequest { duration };
        let response = self.http.put(self.url(format!("scenes/{selector}/activate"))).json(&body).send().await.map_err(transport)?;
        Self::decode_results(response).await
    }

    #[instrument(skip(self))]
    async fn toggle_power(&self, selector: &Selector, duration: f32) -> Result<Vec<OperationResult>, ClientError> {
        let body = ToggleRequest { duration };
        let response = self.http.post(self.url(format!("lights/{selector}/toggle"))).json(&body).send().await.map_err(transport)?;
        Self::decode_results(response).await
    }
}
