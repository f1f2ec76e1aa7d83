//! HTTP implementation of the gateway on top of reqwest.
//!
//! Every endpoint lives under `<host>/index.php?/api/v2/<operation>`. The
//! operation path sits in the query string, so extra parameters are appended
//! as `&key=value` pairs after it.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::models::{
    ApiErrorBody, Attachment, Plan, PlanEntry, Project, ResultRecord, ResultSubmission, Run,
    RunPayload, Suite, Test, User,
};
use super::{GatewayError, GatewayResult, TestRailApi};
use crate::config::TestRailConfig;

const USER_AGENT_VALUE: &str = concat!("railpost/", env!("CARGO_PKG_VERSION"));
const JSON: &str = "application/json";

/// Gateway that talks to a live service over HTTP(S).
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    host: String,
}

#[derive(Serialize)]
struct ResultsBody<'a> {
    results: &'a [ResultSubmission],
}

impl HttpGateway {
    /// Creates a gateway for `host` authenticating as `user`.
    ///
    /// `password` may be the account password or an API key.
    pub fn new(host: &str, user: &str, password: &str) -> GatewayResult<Self> {
        let host = host.trim_end_matches('/').to_string();
        Url::parse(&host).map_err(|_| GatewayError::InvalidHost(host.clone()))?;

        let token = BASE64.encode(format!("{}:{}", user, password));
        let mut auth = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|e| GatewayError::InvalidCredentials(e.to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| GatewayError::Transport {
                operation: "client setup".to_string(),
                source,
            })?;

        Ok(Self { client, host })
    }

    /// Creates a gateway from the `[testrail]` configuration section.
    pub fn from_config(config: &TestRailConfig) -> GatewayResult<Self> {
        let password = config.password.as_deref().unwrap_or_default();
        Self::new(&config.host, &config.user, password)
    }

    /// The host this gateway talks to, without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Builds the endpoint URL for an operation plus query parameters.
    pub fn url(&self, operation: &str, query: &[(&str, &str)]) -> GatewayResult<Url> {
        let mut url = Url::parse(&format!("{}/index.php?/api/v2/{}", self.host, operation))
            .map_err(|_| GatewayError::InvalidHost(self.host.clone()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Issues a GET and decodes the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<T> {
        let url = self.url(operation, query)?;
        debug!(%url, "GET");

        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, JSON)
            .send()
            .await
            .map_err(transport(operation))?;

        decode(operation, response).await
    }

    /// Issues a POST with an optional JSON body and decodes the JSON response.
    pub async fn post<T, B>(
        &self,
        operation: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(operation, query)?;
        debug!(%url, "POST");

        let mut request = self.client.post(url).header(CONTENT_TYPE, JSON);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport(operation))?;
        decode(operation, response).await
    }

    /// Streams a file to the service as multipart form data.
    ///
    /// The form field is named `attachment`. No JSON content type is set;
    /// reqwest supplies the multipart boundary header.
    pub async fn upload_attachment<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &Path,
    ) -> GatewayResult<T> {
        let io_error = |source: std::io::Error| GatewayError::Attachment {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let length = file.metadata().await.map_err(io_error)?.len();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let form = Form::new().part(
            "attachment",
            Part::stream_with_length(body, length).file_name(file_name),
        );

        let url = self.url(operation, &[])?;
        debug!(%url, path = %path.display(), bytes = length, "POST multipart");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport(operation))?;

        decode(operation, response).await
    }

    async fn list<T: DeserializeOwned>(&self, operation: &str, key: &str) -> GatewayResult<Vec<T>> {
        let value: Value = self.get(operation, &[]).await?;
        unwrap_list(operation, key, value)
    }
}

fn transport(operation: &str) -> impl FnOnce(reqwest::Error) -> GatewayError + '_ {
    move |source| GatewayError::Transport {
        operation: operation.to_string(),
        source,
    }
}

/// Maps the status code and decodes the body.
async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> GatewayResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport(operation))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(GatewayError::Api {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| GatewayError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

/// Accepts either a bare array or a paged object holding the list under `key`.
///
/// Only the page contained in this response is returned.
pub(crate) fn unwrap_list<T: DeserializeOwned>(
    operation: &str,
    key: &str,
    value: Value,
) -> GatewayResult<Vec<T>> {
    let decode_error = |message: String| GatewayError::Decode {
        operation: operation.to_string(),
        message,
    };

    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut page) => page
            .remove(key)
            .ok_or_else(|| decode_error(format!("missing '{}' in paged response", key)))?,
        other => return Err(decode_error(format!("expected a list, got {}", other))),
    };

    serde_json::from_value(items).map_err(|e| decode_error(e.to_string()))
}

#[async_trait]
impl TestRailApi for HttpGateway {
    async fn get_user_by_email(&self, email: &str) -> GatewayResult<User> {
        self.get("get_user_by_email", &[("email", email)]).await
    }

    async fn get_projects(&self) -> GatewayResult<Vec<Project>> {
        self.list("get_projects", "projects").await
    }

    async fn get_plans(&self, project_id: u64) -> GatewayResult<Vec<Plan>> {
        self.list(&format!("get_plans/{}", project_id), "plans").await
    }

    async fn get_suites(&self, project_id: u64) -> GatewayResult<Vec<Suite>> {
        self.list(&format!("get_suites/{}", project_id), "suites")
            .await
    }

    async fn get_runs(&self, project_id: u64) -> GatewayResult<Vec<Run>> {
        self.list(&format!("get_runs/{}", project_id), "runs").await
    }

    async fn add_run(&self, project_id: u64, payload: &RunPayload) -> GatewayResult<Run> {
        self.post(&format!("add_run/{}", project_id), Some(payload), &[])
            .await
    }

    async fn add_plan_entry(
        &self,
        plan_id: u64,
        payload: &RunPayload,
    ) -> GatewayResult<PlanEntry> {
        self.post(&format!("add_plan_entry/{}", plan_id), Some(payload), &[])
            .await
    }

    async fn close_run(&self, run_id: u64) -> GatewayResult<Run> {
        self.post::<Run, ()>(&format!("close_run/{}", run_id), None, &[])
            .await
    }

    async fn add_results_for_cases(
        &self,
        run_id: u64,
        results: &[ResultSubmission],
    ) -> GatewayResult<Vec<ResultRecord>> {
        let operation = format!("add_results_for_cases/{}", run_id);
        let value: Value = self
            .post(&operation, Some(&ResultsBody { results }), &[])
            .await?;
        unwrap_list(&operation, "results", value)
    }

    async fn get_tests(&self, run_id: u64) -> GatewayResult<Vec<Test>> {
        self.list(&format!("get_tests/{}", run_id), "tests").await
    }

    async fn add_attachment_to_result(
        &self,
        result_id: u64,
        path: &Path,
    ) -> GatewayResult<Attachment> {
        self.upload_attachment(&format!("add_attachment_to_result/{}", result_id), path)
            .await
    }
}
