//! Client - HTTP access to a running gateway server

pub mod commands;

use crate::protocol::{
    ActionResponse, ConnectionSummary, CreateRequest, CreateResponse, ErrorResponse,
    PairRequest, QrResponse, SendRequest, StatusResponse, API_PREFIX,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({kind}, HTTP {status})")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },
}

impl ClientError {
    /// Machine-readable kind reported by the server, if any
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => Some(kind),
            ClientError::Http(_) => None,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Thin wrapper over the `/api/whatsapp` routes
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Start a connection; the server mints an id when `id` is `None`
    pub async fn create(&self, name: &str, id: Option<&str>) -> ClientResult<CreateResponse> {
        let body = CreateRequest {
            connection_id: id.map(str::to_owned),
            name: name.to_string(),
        };
        self.call(self.request(Method::POST, "/create").json(&body))
            .await
    }

    pub async fn connections(&self) -> ClientResult<Vec<ConnectionSummary>> {
        self.call(self.request(Method::GET, "/connections")).await
    }

    pub async fn status(&self, id: &str) -> ClientResult<StatusResponse> {
        self.call(self.request(Method::GET, &format!("/status/{}", id)))
            .await
    }

    /// Raw pairing payload; `None` while no QR code is available
    pub async fn qr_payload(&self, id: &str) -> ClientResult<Option<String>> {
        let request = self
            .request(Method::GET, &format!("/qr/{}", id))
            .query(&[("format", "payload")]);

        match self.call::<QrResponse>(request).await {
            Ok(response) => Ok(Some(response.qr_code)),
            Err(e) if e.kind() == Some("qr_unavailable") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// QR code as an image `data:` URL
    pub async fn qr_image(&self, id: &str) -> ClientResult<String> {
        let response: QrResponse = self
            .call(self.request(Method::GET, &format!("/qr/{}", id)))
            .await?;
        Ok(response.qr_code)
    }

    pub async fn send(&self, id: &str, to: &str, message: &str) -> ClientResult<ActionResponse> {
        let body = SendRequest {
            to: to.to_string(),
            message: message.to_string(),
        };
        self.call(
            self.request(Method::POST, &format!("/send/{}", id))
                .json(&body),
        )
        .await
    }

    pub async fn disconnect(&self, id: &str) -> ClientResult<ActionResponse> {
        self.call(self.request(Method::DELETE, &format!("/disconnect/{}", id)))
            .await
    }

    pub async fn refresh(&self, id: &str) -> ClientResult<ActionResponse> {
        self.call(self.request(Method::POST, &format!("/refresh/{}", id)))
            .await
    }

    /// Ask a simulating server to pair the connection with `phone`
    pub async fn simulate_pair(&self, id: &str, phone: &str) -> ClientResult<ActionResponse> {
        let body = PairRequest {
            phone_number: phone.to_string(),
        };
        self.call(
            self.request(Method::POST, &format!("/simulate/{}/pair", id))
                .json(&body),
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, path);
        self.http.request(method, url)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await?;
    let (kind, message) = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => (body.kind, body.error),
        Err(_) => ("http".to_string(), text),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        kind,
        message,
    })
}
