// Supervisor HTTP client
//
// Wraps `reqwest::Client` with bearer-token auth, segment-safe URL
// construction, and `{result, data}` envelope unwrapping. Endpoint groups
// (add-ons, core proxy) are inherent methods in sibling files.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::models::SupervisorResponse;
use crate::auth::SupervisorCredentials;
use crate::error::{Error, body_preview};
use crate::transport::TransportConfig;

/// Async client for the Supervisor REST API.
#[derive(Debug, Clone)]
pub struct SupervisorClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SupervisorClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a bearer token and transport config.
    ///
    /// Injects `Authorization: Bearer …` as a sensitive default header.
    pub fn from_token(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::InvalidHeader {
                message: format!("invalid bearer token: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Build from credentials read out of the environment.
    pub fn from_credentials(
        credentials: &SupervisorCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Self::from_token(&credentials.base_url, &credentials.token, transport)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Parse the base URL, adding `http://` for bare hosts and a trailing
    /// slash so relative joins land under it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&crate::auth::normalize_address(raw))?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl { url: raw.to_owned() });
        }
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append path segments to the base URL, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl {
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub(crate) async fn get_raw(&self, url: Url) -> Result<reqwest::Response, Error> {
        debug!("GET {url}");
        Ok(self.http.get(url).send().await?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.get_raw(url).await?;
        Self::unwrap_envelope(resp).await
    }

    /// POST a JSON body and only check the status; the core API answers
    /// service calls with a bare array, not the Supervisor envelope.
    pub(crate) async fn post_unenveloped<B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<(), Error> {
        debug!("POST {url}");
        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    /// Check the status, decode the envelope, and return `data`.
    pub(crate) async fn unwrap_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }

        let body = resp.text().await?;
        let envelope: SupervisorResponse<T> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", body_preview(&body)),
                body: body.clone(),
            })?;

        if envelope.result != "ok" {
            return Err(Error::Supervisor {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("result={}", envelope.result)),
            });
        }

        envelope.data.ok_or_else(|| Error::Deserialization {
            message: "envelope has no data".into(),
            body,
        })
    }

    pub(crate) async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Error::Authentication {
                message: format!("Supervisor rejected the token (HTTP {status})"),
            };
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<SupervisorResponse<serde_json::Value>>(&raw)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    body_preview(&raw)
                }
            });

        Error::Supervisor {
            status: status.as_u16(),
            message,
        }
    }
}
