use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{
    config::TrackerConfig,
    error::{TrackerError, TrackerResult},
    models::{BacklogItem, BacklogPage, IssueDetails, IssueRef},
    rich_text,
};

/// Issues fetched per backlog page; matches the UI's list chunk size.
const BACKLOG_PAGE_SIZE: u32 = 20;
/// Field the tracker keeps story-point estimates in.
const STORY_POINTS_FIELD: &str = "customfield_10016";

/// Thin HTTP client for the issue tracker's REST API.
#[derive(Clone)]
pub struct TrackerClient {
    client: Client,
    base_url: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl TrackerClient {
    /// Build a client from the given configuration.
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| TrackerError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            auth: config
                .email
                .zip(config.api_token)
                .map(|(e, t)| (Arc::<str>::from(e), Arc::<str>::from(t))),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref token)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(token.as_ref()))
        } else {
            builder
        }
    }

    /// Resolve an issue key to its id and summary. `None` when the issue
    /// does not exist or is not visible.
    pub async fn lookup_issue(&self, issue_key: &str) -> TrackerResult<Option<IssueRef>> {
        let path = format!("/rest/api/3/issue/{issue_key}?fields=summary");
        let Some(raw) = self.get_json::<RawIssue>(&path).await? else {
            return Ok(None);
        };

        Ok(Some(IssueRef {
            id: raw.id,
            key: raw.key,
            summary: raw.fields.summary.unwrap_or_default(),
        }))
    }

    /// Fetch the details rendered on the estimation panel. `None` when the
    /// issue does not exist or is not visible.
    pub async fn fetch_issue(&self, id_or_key: &str) -> TrackerResult<Option<IssueDetails>> {
        let path = format!("/rest/api/3/issue/{id_or_key}?fields=summary,description,status");
        let Some(raw) = self.get_json::<RawIssue>(&path).await? else {
            return Ok(None);
        };

        Ok(Some(IssueDetails {
            id: raw.id,
            key: raw.key,
            summary: raw.fields.summary.unwrap_or_default(),
            description: raw
                .fields
                .description
                .as_ref()
                .map(rich_text::to_plain_text)
                .filter(|text| !text.is_empty()),
            status: raw.fields.status.map(|status| status.name),
        }))
    }

    /// Search one page of a project's open backlog, in rank order. The
    /// returned token resumes the search where this page ended.
    pub async fn search_backlog(
        &self,
        project_key: &str,
        next_page_token: Option<String>,
    ) -> TrackerResult<BacklogPage> {
        const PATH: &str = "/rest/api/3/search/jql";

        let jql = format!("project = \"{project_key}\" AND statusCategory != Done ORDER BY rank ASC");
        let mut body = json!({
            "jql": jql,
            "maxResults": BACKLOG_PAGE_SIZE,
            "fields": ["summary", "status", "issuetype", STORY_POINTS_FIELD],
        });
        if let Some(token) = next_page_token {
            body["nextPageToken"] = Value::String(token);
        }

        let response = self
            .request(Method::POST, PATH)
            .json(&body)
            .send()
            .await
            .map_err(|source| TrackerError::RequestSend {
                path: PATH.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(TrackerError::RequestStatus {
                path: PATH.to_string(),
                status: response.status(),
            });
        }

        let raw = response
            .json::<RawSearchResponse>()
            .await
            .map_err(|source| TrackerError::DecodeResponse {
                path: PATH.to_string(),
                source,
            })?;

        Ok(BacklogPage {
            issues: raw.issues.into_iter().map(BacklogItem::from).collect(),
            total: raw.total,
            next_page_token: raw.next_page_token,
        })
    }

    /// Update an issue's summary and/or description. A plain-text description
    /// is converted to the tracker's structured document format.
    pub async fn update_issue(
        &self,
        issue_id: &str,
        summary: Option<&str>,
        description: Option<&str>,
    ) -> TrackerResult<()> {
        let path = format!("/rest/api/3/issue/{issue_id}");

        let mut fields = Map::new();
        if let Some(summary) = summary {
            fields.insert("summary".into(), Value::String(summary.to_string()));
        }
        if let Some(description) = description {
            fields.insert("description".into(), rich_text::to_document(description));
        }

        let response = self
            .request(Method::PUT, &path)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(|source| TrackerError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TrackerError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }

    async fn get_json<T>(&self, path: &str) -> TrackerResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.request(Method::GET, path).send().await.map_err(|source| {
            TrackerError::RequestSend {
                path: path.to_string(),
                source,
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    TrackerError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    }
                })
            }
            other => Err(TrackerError::RequestStatus {
                path: path.to_string(),
                status: other,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: String,
    key: String,
    #[serde(default)]
    fields: RawIssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct RawIssueFields {
    summary: Option<String>,
    description: Option<Value>,
    status: Option<RawStatus>,
    issuetype: Option<RawIssueType>,
    #[serde(rename = "customfield_10016")]
    story_points: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssueType {
    #[serde(rename = "iconUrl")]
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    issues: Vec<RawIssue>,
    total: Option<u64>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

impl From<RawIssue> for BacklogItem {
    fn from(raw: RawIssue) -> Self {
        Self {
            id: raw.id,
            key: raw.key,
            summary: raw.fields.summary.unwrap_or_default(),
            status: raw
                .fields
                .status
                .map(|status| status.name)
                .unwrap_or_default(),
            icon: raw.fields.issuetype.and_then(|kind| kind.icon_url),
            story_points: raw.fields.story_points,
        }
    }
}
