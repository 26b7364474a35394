use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::{
    dao::engine::{CommandAck, RaceEngine},
    dto::snapshot::RaceSnapshot,
    state::race_machine::Command,
};

use super::error::{EngineError, EngineResult};

const STATE_PATH: &str = "race/state";
const SET_FLAG_PATH: &str = "race/set-flag";

/// Runtime configuration describing how to reach the race engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
    /// Per-request timeout applied to polls and commands alike.
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
        }
    }
}

/// Body the engine may attach to a command answer. Every field is optional and an
/// empty body counts as acceptance.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAck {
    ok: Option<bool>,
    error: Option<String>,
    message: Option<String>,
    countdown_s: Option<f64>,
}

impl RawAck {
    fn parse(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(body).unwrap_or_default()
    }

    fn rejection(&self) -> Option<String> {
        if self.ok == Some(false) {
            Some(self.reason().unwrap_or_else(|| "command refused".into()))
        } else {
            None
        }
    }

    fn reason(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message.clone())
    }

    fn countdown(&self) -> Option<Duration> {
        self.countdown_s
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

#[derive(Serialize)]
struct SetFlagBody {
    flag: &'static str,
}

/// Race engine reached over its JSON HTTP API.
#[derive(Clone)]
pub struct HttpRaceEngine {
    client: Client,
    base_url: Arc<str>,
}

impl HttpRaceEngine {
    /// Build the HTTP client. No request is made until the first poll.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| EngineError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        self.client.request(method, url)
    }

    async fn get_state(&self, race_id: Option<String>) -> EngineResult<RaceSnapshot> {
        let mut builder = self.request(Method::GET, STATE_PATH);
        if let Some(id) = race_id.as_deref() {
            builder = builder.query(&[("race_id", id)]);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| EngineError::RequestSend {
                path: STATE_PATH.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(EngineError::RequestStatus {
                path: STATE_PATH.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<RaceSnapshot>()
            .await
            .map_err(|source| EngineError::DecodeResponse {
                path: STATE_PATH.to_string(),
                source,
            })
    }

    async fn post_command(&self, command: Command) -> EngineResult<CommandAck> {
        let (path, builder) = match command {
            Command::SetFlag(flag) => (
                SET_FLAG_PATH.to_string(),
                self.request(Method::POST, SET_FLAG_PATH)
                    .json(&SetFlagBody { flag: flag.as_str() }),
            ),
            Command::Control(action) => {
                let path = format!("race/{}", action.as_str());
                let builder = self.request(Method::POST, &path);
                (path, builder)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|source| EngineError::RequestSend {
                path: path.clone(),
                source,
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| EngineError::DecodeResponse {
                path: path.clone(),
                source,
            })?;
        let ack = RawAck::parse(&body);

        interpret_ack(path, status, &ack)
    }
}

fn interpret_ack(path: String, status: StatusCode, ack: &RawAck) -> EngineResult<CommandAck> {
    if !status.is_success() {
        let message = ack
            .reason()
            .unwrap_or_else(|| format!("race engine answered {status}"));
        return Err(EngineError::Rejected {
            path,
            status,
            message,
        });
    }
    if let Some(message) = ack.rejection() {
        return Err(EngineError::Rejected {
            path,
            status,
            message,
        });
    }
    Ok(CommandAck {
        countdown: ack.countdown(),
    })
}

impl RaceEngine for HttpRaceEngine {
    fn fetch_snapshot(
        &self,
        race_id: Option<String>,
    ) -> BoxFuture<'static, EngineResult<RaceSnapshot>> {
        let engine = self.clone();
        Box::pin(async move { engine.get_state(race_id).await })
    }

    fn send_command(&self, command: Command) -> BoxFuture<'static, EngineResult<CommandAck>> {
        let engine = self.clone();
        Box::pin(async move { engine.post_command(command).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_acceptance() {
        let ack = interpret_ack("race/end-race".into(), StatusCode::OK, &RawAck::parse(""))
            .expect("accepted");
        assert_eq!(ack.countdown, None);
    }

    #[test]
    fn ok_false_is_rejection_even_with_success_status() {
        let raw = RawAck::parse(r#"{"ok": false, "error": "not allowed in PRE"}"#);
        let err = interpret_ack(SET_FLAG_PATH.into(), StatusCode::OK, &raw).unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(err.summary(), "not allowed in PRE");
    }

    #[test]
    fn non_success_status_is_rejection() {
        let raw = RawAck::parse("<html>nope</html>");
        let err =
            interpret_ack("race/start-race".into(), StatusCode::CONFLICT, &raw).unwrap_err();
        assert!(err.is_rejection());
        assert!(err.summary().contains("409"));
    }

    #[test]
    fn countdown_length_is_read_from_ack() {
        let raw = RawAck::parse(r#"{"ok": true, "countdown_s": 7.5}"#);
        let ack = interpret_ack("race/start-race".into(), StatusCode::OK, &raw).expect("ok");
        assert_eq!(ack.countdown, Some(Duration::from_millis(7500)));
    }

    #[test]
    fn negative_countdown_is_ignored() {
        let raw = RawAck::parse(r#"{"countdown_s": -3}"#);
        let ack = interpret_ack("race/start-race".into(), StatusCode::OK, &raw).expect("ok");
        assert_eq!(ack.countdown, None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let engine = HttpRaceEngine::new(EngineConfig::new(
            "http://engine.local:8080/",
            Duration::from_secs(2),
        ))
        .expect("client");
        assert_eq!(&*engine.base_url, "http://engine.local:8080");
    }
}
