use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crossbar_core::activity::Activity;
use crossbar_core::error::{ConfigError, SkillError};
use crossbar_core::skill::Skill;

use crate::auth::TokenProvider;

/// Header carrying the callback base URL the skill answers to.
const CALLBACK_HEADER: &str = "x-crossbar-callback";
/// Header carrying the caller's app identity.
const CALLER_HEADER: &str = "x-crossbar-caller";

/// Outcome of a delivered forward: HTTP-style status plus whatever body the
/// skill returned.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub status: u16,
    pub body: Value,
}

/// Outbound delivery of one activity to a skill endpoint.
#[async_trait]
pub trait SkillForwarder: Send + Sync {
    /// Post one activity to a skill. Success is any status in 200-299;
    /// everything else, transport failure included, is a [`SkillError`].
    /// Never retried here: a forwarded user message is not idempotent and a
    /// blind retry risks duplicate skill-side effects.
    async fn forward(
        &self,
        caller_app_id: &str,
        skill: &Skill,
        callback_endpoint: &str,
        skill_conversation_id: &str,
        activity: &Activity,
    ) -> Result<InvocationResult, SkillError>;
}

/// reqwest-backed forwarder. The client carries the configured deadline, so a
/// hung skill surfaces as a transport-classified error instead of blocking the
/// turn forever.
pub struct HttpSkillForwarder {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpSkillForwarder {
    pub fn new(timeout: Duration, tokens: Arc<dyn TokenProvider>) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self { http, tokens })
    }
}

#[async_trait]
impl SkillForwarder for HttpSkillForwarder {
    async fn forward(
        &self,
        caller_app_id: &str,
        skill: &Skill,
        callback_endpoint: &str,
        skill_conversation_id: &str,
        activity: &Activity,
    ) -> Result<InvocationResult, SkillError> {
        let url = activity_url(&skill.endpoint, skill_conversation_id);

        let mut request = self
            .http
            .post(&url)
            .json(activity)
            .header(CALLBACK_HEADER, callback_endpoint)
            .header(CALLER_HEADER, caller_app_id);
        if let Some(token) = self.tokens.token(caller_app_id, &skill.app_id).await? {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| classify_transport_error(err, skill, &url))?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|err| SkillError::Transport {
            skill_id: skill.id.clone(),
            endpoint: url.clone(),
            detail: format!("reading response body: {err}"),
        })?;
        let body = parse_body(&bytes);

        if !(200..300).contains(&status) {
            return Err(SkillError::Invocation {
                skill_id: skill.id.clone(),
                endpoint: url,
                status,
                body: body.to_string(),
            });
        }

        debug!(
            skill_id = %skill.id,
            skill_conversation_id,
            status,
            activity_type = %activity.activity_type,
            "activity delivered to skill"
        );
        Ok(InvocationResult { status, body })
    }
}

fn activity_url(endpoint: &str, skill_conversation_id: &str) -> String {
    format!(
        "{}/v1/conversations/{}/activities",
        endpoint.trim_end_matches('/'),
        skill_conversation_id
    )
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn classify_transport_error(err: reqwest::Error, skill: &Skill, endpoint: &str) -> SkillError {
    let detail = if err.is_connect() {
        format!("unable to connect: {err}")
    } else if err.is_timeout() {
        format!("deadline exceeded: {err}")
    } else {
        err.to_string()
    };
    SkillError::Transport {
        skill_id: skill.id.clone(),
        endpoint: endpoint.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::json;

    use crate::auth::AnonymousTokens;

    fn skill_at(endpoint: String) -> Skill {
        Skill {
            id: "EchoSkillBot".to_string(),
            app_id: "echo-app".to_string(),
            endpoint,
        }
    }

    fn forwarder() -> HttpSkillForwarder {
        HttpSkillForwarder::new(Duration::from_secs(2), Arc::new(AnonymousTokens))
            .expect("forwarder")
    }

    async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[test]
    fn activity_url_tolerates_trailing_slashes() {
        assert_eq!(
            activity_url("http://skills.local/", "abc"),
            "http://skills.local/v1/conversations/abc/activities"
        );
        assert_eq!(
            activity_url("http://skills.local", "abc"),
            "http://skills.local/v1/conversations/abc/activities"
        );
    }

    #[tokio::test]
    async fn a_2xx_response_is_a_delivered_forward() {
        let app = axum::Router::new().route(
            "/v1/conversations/{id}/activities",
            post(|Json(activity): Json<Value>| async move {
                assert_eq!(activity["type"], "message");
                Json(json!({"received": true}))
            }),
        );
        let endpoint = serve(app).await;

        let activity = Activity::message("C1", "webchat", "let's use the skill");
        let result = forwarder()
            .forward(
                "root-app",
                &skill_at(endpoint),
                "http://127.0.0.1:3978/api/skills",
                "skill-conv-1",
                &activity,
            )
            .await
            .expect("forward");
        assert_eq!(result.status, 200);
        assert_eq!(result.body, json!({"received": true}));
    }

    #[tokio::test]
    async fn a_non_2xx_response_surfaces_status_and_body() {
        let app = axum::Router::new().route(
            "/v1/conversations/{id}/activities",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let endpoint = serve(app).await;

        let activity = Activity::message("C2", "webchat", "hello");
        let err = forwarder()
            .forward(
                "root-app",
                &skill_at(endpoint),
                "http://127.0.0.1:3978/api/skills",
                "skill-conv-2",
                &activity,
            )
            .await
            .unwrap_err();
        match err {
            SkillError::Invocation { status, body, skill_id, .. } => {
                assert_eq!(status, 503);
                assert_eq!(skill_id, "EchoSkillBot");
                assert!(body.contains("overloaded"));
            }
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_connect_failure_is_transport_classified() {
        // Bind to reserve a free port, then release it before forwarding.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let activity = Activity::message("C3", "webchat", "hello");
        let err = forwarder()
            .forward(
                "root-app",
                &skill_at(endpoint),
                "http://127.0.0.1:3978/api/skills",
                "skill-conv-3",
                &activity,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::Transport { .. }));
    }
}
