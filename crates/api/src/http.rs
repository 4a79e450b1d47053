//! HTTP implementation of [`RulesApi`].
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Every request body and response is JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use brms_core::{RuleField, RuleMap, Scenario};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::record::{
    validate_decision_runs, DecisionRun, EvaluateRequest, EvaluateResponse,
    GenerateRuleMapRequest, RawDecisionRun, RuleMapRequest, RunDecisionsRequest,
    SimulationResult,
};
use crate::traits::RulesApi;

/// Connection settings for [`HttpRulesApi`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Service root, e.g. `http://localhost:3000/api`.
    pub base_url: String,
    /// Rules directory name sent as `ruleDir` with every rule request.
    pub rule_dir: String,
    /// Bearer token added to every request when present.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpConfig {
            base_url: base_url.into(),
            rule_dir: "rules".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// [`RulesApi`] over HTTP.
pub struct HttpRulesApi {
    config: HttpConfig,
    agent: ureq::Agent,
}

impl HttpRulesApi {
    pub fn new(config: HttpConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build();
        HttpRulesApi {
            agent: ureq::Agent::new_with_config(agent_config),
            config,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let agent = self.agent.clone();
        let url = self.url(path);
        let token = self.config.token.clone();

        debug!(method = method.as_str(), %url, "sending request");
        tokio::task::spawn_blocking(move || {
            blocking_request(&agent, method, &url, token.as_deref(), &query, body.as_ref())
        })
        .await
        .map_err(|e| ApiError::Join(e.to_string()))?
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = to_body(body, &self.url(path))?;
        let value = self.request(Method::Post, path, Vec::new(), Some(body)).await?;
        decode(value, &self.url(path))
    }
}

fn to_body<B: Serialize>(body: &B, url: &str) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: format!("could not encode request body: {}", e),
    })
}

fn decode<T: DeserializeOwned>(value: Value, url: &str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn prepare<B>(
    mut request: ureq::RequestBuilder<B>,
    token: Option<&str>,
    query: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (key, value) in query {
        request = request.query(key, value);
    }
    if let Some(token) = token {
        request = request.header("Authorization", &format!("Bearer {}", token));
    }
    request
}

fn blocking_request(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    token: Option<&str>,
    query: &[(String, String)],
    body: Option<&Value>,
) -> Result<Value, ApiError> {
    let empty = Value::Null;
    let response = match method {
        Method::Get => prepare(agent.get(url), token, query).call(),
        Method::Delete => prepare(agent.delete(url), token, query).call(),
        Method::Post => prepare(agent.post(url), token, query).send_json(body.unwrap_or(&empty)),
        Method::Put => prepare(agent.put(url), token, query).send_json(body.unwrap_or(&empty)),
    }
    .map_err(|e| ApiError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status().as_u16();
    let text = response
        .into_body()
        .read_to_string()
        .map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if status >= 400 {
        return Err(ApiError::Status {
            method: method.as_str().to_string(),
            url: url.to_string(),
            status,
            body: text,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: format!("failed to parse response as JSON: {}", e),
    })
}

fn not_found_as(id: &str, err: ApiError) -> ApiError {
    match err {
        ApiError::Status { status: 404, .. } => ApiError::NotFound { id: id.to_string() },
        other => other,
    }
}

#[async_trait]
impl RulesApi for HttpRulesApi {
    async fn get_rule_map(
        &self,
        filepath: &str,
        rule_content: &Value,
    ) -> Result<RuleMap, ApiError> {
        let body = RuleMapRequest {
            rule_dir: &self.config.rule_dir,
            filepath,
            rule_content,
        };
        self.post("/rulemap", &body).await
    }

    async fn generate_rule_map(&self, rule_content: &Value) -> Result<RuleMap, ApiError> {
        let body = GenerateRuleMapRequest {
            rule_dir: &self.config.rule_dir,
            rule_content,
        };
        self.post("/rulemap/generateFromRuleContent", &body).await
    }

    async fn search_fields(&self, query: &str) -> Result<Vec<RuleField>, ApiError> {
        let path = "/rulemap/fields";
        let value = self
            .request(
                Method::Get,
                path,
                vec![("searchText".to_string(), query.to_string())],
                None,
            )
            .await?;
        decode(value, &self.url(path))
    }

    async fn evaluate(
        &self,
        rule_content: &Value,
        context: &Map<String, Value>,
        trace: bool,
    ) -> Result<SimulationResult, ApiError> {
        let body = EvaluateRequest {
            rule_dir: &self.config.rule_dir,
            rule_content,
            context,
            trace,
        };
        let response: EvaluateResponse = self.post("/decisions/evaluate", &body).await?;
        SimulationResult::from_response(response)
    }

    async fn run_decisions(
        &self,
        filepath: &str,
        rule_content: &Value,
    ) -> Result<BTreeMap<String, DecisionRun>, ApiError> {
        let body = RunDecisionsRequest {
            rule_dir: &self.config.rule_dir,
            filepath,
            rule_content,
        };
        let raw: BTreeMap<String, RawDecisionRun> =
            self.post("/scenario/run-decisions", &body).await?;
        validate_decision_runs(raw)
    }

    async fn list_scenarios(&self, filepath: &str) -> Result<Vec<Scenario>, ApiError> {
        let path = "/scenario/by-filepath";
        let value = self
            .request(
                Method::Get,
                path,
                vec![("filepath".to_string(), filepath.to_string())],
                None,
            )
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        decode(value, &self.url(path))
    }

    async fn create_scenario(&self, scenario: &Scenario) -> Result<Scenario, ApiError> {
        self.post("/scenario", scenario).await
    }

    async fn update_scenario(&self, id: &str, scenario: &Scenario) -> Result<Scenario, ApiError> {
        let path = format!("/scenario/{}", id);
        let body = to_body(scenario, &self.url(&path))?;
        let value = self
            .request(Method::Put, &path, Vec::new(), Some(body))
            .await
            .map_err(|e| not_found_as(id, e))?;
        // Some deployments answer an update with an acknowledgement instead
        // of the stored document.
        match serde_json::from_value::<Scenario>(value) {
            Ok(stored) => Ok(stored),
            Err(_) => Ok(Scenario {
                id: Some(id.to_string()),
                ..scenario.clone()
            }),
        }
    }

    async fn delete_scenario(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/scenario/{}", id);
        self.request(Method::Delete, &path, Vec::new(), None)
            .await
            .map_err(|e| not_found_as(id, e))?;
        Ok(())
    }
}
