use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        CountryId, CourseId, DisciplineId, DistrictId, OrganizationId, OrganizationProgramId,
        ProgramCourseId, ProgramId, SemesterId, StateId, StreamId,
    },
    error::{ApiException, ErrorCode},
};

/// The university backend answers some routes with a bare payload and
/// others with a `{ success, data, message }` envelope. Both shapes are
/// accepted on every route.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaybeWrapped<T> {
    Wrapped(ApiEnvelope<T>),
    Bare(T),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> MaybeWrapped<T> {
    pub fn into_result(self) -> Result<T, ApiException> {
        match self {
            MaybeWrapped::Bare(data) => Ok(data),
            MaybeWrapped::Wrapped(envelope) => {
                if envelope.success == Some(false) {
                    let message = envelope
                        .message
                        .unwrap_or_else(|| "request rejected by server".to_string());
                    return Err(ApiException::new(ErrorCode::Validation, message));
                }
                Ok(envelope.data)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub stream_id: StreamId,
    pub stream_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineSummary {
    pub discipline_id: DisciplineId,
    pub stream_id: StreamId,
    pub discipline_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSummary {
    pub program_id: ProgramId,
    pub discipline_id: DisciplineId,
    pub program_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_years: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_credits: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    pub credit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub semester_id: SemesterId,
    pub semester_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub component_type_id: i64,
    pub component_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub country_id: CountryId,
    pub country_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub state_id: StateId,
    pub country_id: CountryId,
    pub state_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictSummary {
    pub district_id: DistrictId,
    pub state_id: StateId,
    pub district_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub organization_id: OrganizationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrganizationSummary {
    /// English name where present, institute name otherwise.
    pub fn display_name(&self) -> &str {
        self.name_en
            .as_deref()
            .or(self.institute_name.as_deref())
            .unwrap_or("")
    }
}

/// One row of a program's syllabus table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusRow {
    pub program_course_id: ProgramCourseId,
    pub semester: String,
    pub component: String,
    pub course_code: String,
    pub course_name: String,
    pub credit: f64,
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEntry {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub credit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterPlan {
    pub semester_id: SemesterId,
    pub semester_name: String,
    #[serde(default)]
    pub courses: Vec<CourseEntry>,
}

/// A program as assigned to an organization, nested with its curriculum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedProgram {
    pub organization_program_id: OrganizationProgramId,
    pub program_id: ProgramId,
    pub program_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_years: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake_capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_credits: Option<f64>,
    #[serde(default)]
    pub semesters: Vec<SemesterPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPayload {
    pub program_course_id: ProgramCourseId,
    pub program_id: ProgramId,
    pub course_id: CourseId,
    pub semester_id: SemesterId,
    pub component_type_id: i64,
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgProgramPayload {
    pub organization_program_id: OrganizationProgramId,
    pub organization_id: OrganizationId,
    pub program_id: ProgramId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake_capacity: Option<i32>,
    pub is_active: bool,
}
