use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use selection_core::{LevelDef, OptionItem, OptionSource};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{
        CountryId, DisciplineId, OptionId, OrganizationId, OrganizationProgramId, ProgramCourseId,
        ProgramId, StateId, StreamId,
    },
    error::ApiError,
    protocol::{
        AssignedProgram, CountrySummary, CourseSummary, DisciplineSummary, DistrictSummary,
        MappingPayload, MaybeWrapped, OrgProgramPayload, OrganizationSummary, ProgramSummary,
        StateSummary, StreamSummary, SyllabusRow,
    },
};
use tracing::debug;
use url::Url;

pub const STREAM_LEVEL: usize = 0;
pub const DISCIPLINE_LEVEL: usize = 1;
pub const PROGRAM_LEVEL: usize = 2;

pub const COUNTRY_LEVEL: usize = 0;
pub const STATE_LEVEL: usize = 1;
pub const DISTRICT_LEVEL: usize = 2;

/// Level layout for the academics filter chain.
pub fn academics_levels() -> Vec<LevelDef> {
    vec![
        LevelDef::root("Stream"),
        LevelDef::child_of("Discipline", STREAM_LEVEL),
        LevelDef::child_of("Program", DISCIPLINE_LEVEL),
    ]
}

/// Level layout for the masters geography chain.
pub fn geography_levels() -> Vec<LevelDef> {
    vec![
        LevelDef::root("Country"),
        LevelDef::child_of("State", COUNTRY_LEVEL),
        LevelDef::child_of("District", STATE_LEVEL),
    ]
}

/// Request configuration injected into the client. The bearer token lives
/// here rather than in any process-global store.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub bearer_token: Option<String>,
}

impl ApiConfig {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url.as_ref()).context("invalid API base url")?,
            bearer_token: None,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn from_env() -> Result<Self> {
        let base = std::env::var("UNIVERSITY_API_BASE")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let mut config = Self::new(base)?;
        if let Ok(token) = std::env::var("UNIVERSITY_API_TOKEN") {
            if !token.is_empty() {
                config.bearer_token = Some(token);
            }
        }
        Ok(config)
    }
}

/// Acknowledgement body some mutation routes return next to a 2xx status.
#[derive(Debug, Deserialize)]
struct SaveAck {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the university admin REST API.
pub struct AcademicsClient {
    http: Client,
    config: ApiConfig,
}

impl AcademicsClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Non-2xx responses often carry the backend's error envelope; surface
    /// its message instead of the bare status line when one decodes.
    async fn check_status(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
            return Err(anyhow!("{path} failed ({status}): {}", error.message));
        }
        Err(anyhow!("{path} returned an error status: {status}"))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!("api: GET {path}");
        let response = self
            .authorized(self.http.get(self.endpoint(path)).query(query))
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;
        let response = self.check_status(path, response).await?;
        let body: MaybeWrapped<T> = response
            .json()
            .await
            .with_context(|| format!("failed to decode {path} response"))?;
        Ok(body.into_result()?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        debug!("api: POST {path}");
        let response = self
            .authorized(self.http.post(self.endpoint(path)).json(body))
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;
        let response = self.check_status(path, response).await?;
        let text = response
            .text()
            .await
            .with_context(|| format!("failed to read {path} response"))?;
        if let Ok(ack) = serde_json::from_str::<SaveAck>(&text) {
            if ack.success == Some(false) {
                let message = ack
                    .message
                    .unwrap_or_else(|| "request rejected by server".to_string());
                return Err(anyhow!("{path} rejected the request: {message}"));
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        debug!("api: DELETE {path}");
        let response = self
            .authorized(self.http.delete(self.endpoint(path)))
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;
        self.check_status(path, response).await?;
        Ok(())
    }

    pub async fn list_streams(&self) -> Result<Vec<StreamSummary>> {
        self.get_json("/api/academics/streams", &[]).await
    }

    pub async fn list_disciplines(&self, stream: StreamId) -> Result<Vec<DisciplineSummary>> {
        self.get_json(
            "/api/academics/disciplines",
            &[("streamId", stream.0.to_string())],
        )
        .await
    }

    pub async fn list_programs(&self, discipline: DisciplineId) -> Result<Vec<ProgramSummary>> {
        self.get_json(
            "/api/academics/programs",
            &[("disciplineId", discipline.0.to_string())],
        )
        .await
    }

    /// Free-text course search used by the syllabus mapping dialog.
    pub async fn lookup_courses(&self, query: &str, take: u32) -> Result<Vec<CourseSummary>> {
        self.get_json(
            "/api/academics/courses/lookup",
            &[("q", query.to_string()), ("take", take.to_string())],
        )
        .await
    }

    pub async fn get_syllabus(&self, program: ProgramId) -> Result<Vec<SyllabusRow>> {
        self.get_json(
            &format!("/api/academics/program-courses/programs/{}/syllabus", program.0),
            &[],
        )
        .await
    }

    pub async fn save_mapping(&self, payload: &MappingPayload) -> Result<()> {
        self.post_json("/api/academics/program-courses", payload)
            .await
    }

    pub async fn delete_mapping(&self, id: ProgramCourseId) -> Result<()> {
        self.delete(&format!("/api/academics/program-courses/{}", id.0))
            .await
    }

    pub async fn list_organizations(&self) -> Result<Vec<OrganizationSummary>> {
        self.get_json("/api/organizations", &[]).await
    }

    pub async fn list_org_programs(
        &self,
        organization: OrganizationId,
    ) -> Result<Vec<AssignedProgram>> {
        self.get_json(
            &format!("/api/academics/organization-programs/{}", organization.0),
            &[],
        )
        .await
    }

    pub async fn save_org_program(&self, payload: &OrgProgramPayload) -> Result<()> {
        self.post_json("/api/academics/organization-programs", payload)
            .await
    }

    pub async fn delete_org_program(&self, id: OrganizationProgramId) -> Result<()> {
        self.delete(&format!("/api/academics/organization-programs/{}", id.0))
            .await
    }

    pub async fn list_countries(&self) -> Result<Vec<CountrySummary>> {
        self.get_json("/api/masters/countries", &[]).await
    }

    pub async fn list_states(&self, country: CountryId) -> Result<Vec<StateSummary>> {
        self.get_json(
            "/api/masters/states",
            &[("countryId", country.0.to_string())],
        )
        .await
    }

    pub async fn list_districts(&self, state: StateId) -> Result<Vec<DistrictSummary>> {
        self.get_json(
            "/api/masters/districts",
            &[("stateId", state.0.to_string())],
        )
        .await
    }
}

fn to_option<T: Serialize>(id: i64, label: &str, payload: &T) -> Result<OptionItem> {
    let fields = serde_json::to_value(payload).context("failed to encode option payload")?;
    Ok(OptionItem::new(id, label).with_fields(fields))
}

fn require_parent(parent: Option<OptionId>, level_name: &str) -> Result<OptionId> {
    parent.ok_or_else(|| anyhow!("{level_name} options require a parent selection"))
}

/// Stream → Discipline → Program option source backed by the academics
/// endpoints. Pair with `academics_levels()`.
pub struct AcademicsChainSource {
    client: Arc<AcademicsClient>,
}

impl AcademicsChainSource {
    pub fn new(client: Arc<AcademicsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OptionSource for AcademicsChainSource {
    async fn fetch_options(
        &self,
        level: usize,
        parent: Option<OptionId>,
    ) -> Result<Vec<OptionItem>> {
        match level {
            STREAM_LEVEL => self
                .client
                .list_streams()
                .await?
                .iter()
                .map(|stream| to_option(stream.stream_id.0, &stream.stream_name, stream))
                .collect(),
            DISCIPLINE_LEVEL => {
                let stream = require_parent(parent, "discipline")?;
                self.client
                    .list_disciplines(StreamId(stream.0))
                    .await?
                    .iter()
                    .map(|discipline| {
                        to_option(
                            discipline.discipline_id.0,
                            &discipline.discipline_name,
                            discipline,
                        )
                    })
                    .collect()
            }
            PROGRAM_LEVEL => {
                let discipline = require_parent(parent, "program")?;
                self.client
                    .list_programs(DisciplineId(discipline.0))
                    .await?
                    .iter()
                    .map(|program| to_option(program.program_id.0, &program.program_name, program))
                    .collect()
            }
            other => Err(anyhow!("academics chain has no level {other}")),
        }
    }
}

/// Country → State → District option source backed by the masters
/// endpoints. Pair with `geography_levels()`.
pub struct GeographyChainSource {
    client: Arc<AcademicsClient>,
}

impl GeographyChainSource {
    pub fn new(client: Arc<AcademicsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OptionSource for GeographyChainSource {
    async fn fetch_options(
        &self,
        level: usize,
        parent: Option<OptionId>,
    ) -> Result<Vec<OptionItem>> {
        match level {
            COUNTRY_LEVEL => self
                .client
                .list_countries()
                .await?
                .iter()
                .map(|country| to_option(country.country_id.0, &country.country_name, country))
                .collect(),
            STATE_LEVEL => {
                let country = require_parent(parent, "state")?;
                self.client
                    .list_states(CountryId(country.0))
                    .await?
                    .iter()
                    .map(|state| to_option(state.state_id.0, &state.state_name, state))
                    .collect()
            }
            DISTRICT_LEVEL => {
                let state = require_parent(parent, "district")?;
                self.client
                    .list_districts(StateId(state.0))
                    .await?
                    .iter()
                    .map(|district| {
                        to_option(district.district_id.0, &district.district_name, district)
                    })
                    .collect()
            }
            other => Err(anyhow!("geography chain has no level {other}")),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
