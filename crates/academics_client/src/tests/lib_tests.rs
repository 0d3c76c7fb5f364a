use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use selection_core::{
    aggregate::{display_credits, program_total_credits},
    SelectionChain,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct ApiServerState {
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    discipline_queries: Arc<Mutex<Vec<String>>>,
    fail_streams: Arc<Mutex<bool>>,
    reject_states: Arc<Mutex<bool>>,
    saved_mappings: Arc<Mutex<Vec<MappingPayload>>>,
    deleted_mapping_ids: Arc<Mutex<Vec<i64>>>,
}

async fn handle_streams(
    State(state): State<ApiServerState>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.auth_headers.lock().await.push(auth);
    if *state.fail_streams.lock().await {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "code": "not_found", "message": "stream master offline" })),
        ));
    }
    Ok(Json(json!([
        { "streamId": 1, "streamName": "Science" },
        { "streamId": 2, "streamName": "Commerce" }
    ])))
}

async fn handle_disciplines(
    State(state): State<ApiServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state
        .discipline_queries
        .lock()
        .await
        .push(query.get("streamId").cloned().unwrap_or_default());
    Json(json!({
        "success": true,
        "data": [
            { "disciplineId": 10, "streamId": 1, "disciplineName": "Physics" }
        ]
    }))
}

async fn handle_programs(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(query.get("disciplineId").map(String::as_str), Some("10"));
    Json(json!({
        "success": true,
        "data": [
            {
                "programId": 100,
                "disciplineId": 10,
                "programName": "B.Sc Physics",
                "degreeLevel": "UG",
                "durationYears": 3
            }
        ]
    }))
}

async fn handle_syllabus(Path(program_id): Path<i64>) -> Json<Value> {
    assert_eq!(program_id, 100);
    Json(json!({
        "success": true,
        "data": [
            {
                "programCourseId": 7,
                "semester": "Semester 1",
                "component": "Core",
                "courseCode": "PHY101",
                "courseName": "Mechanics",
                "credit": 4.0,
                "isMandatory": true
            }
        ]
    }))
}

async fn handle_org_programs(Path(organization_id): Path<i64>) -> Json<Value> {
    assert_eq!(organization_id, 3);
    Json(json!([
        {
            "organizationProgramId": 55,
            "programId": 100,
            "programName": "B.Sc Physics",
            "semesters": [
                {
                    "semesterId": 1,
                    "semesterName": "Semester 1",
                    "courses": [
                        { "courseId": 1, "courseCode": "PHY101", "courseName": "Mechanics", "credit": 4.0 },
                        { "courseId": 2, "courseCode": "PHY102", "courseName": "Waves", "credit": 2.0 }
                    ]
                },
                {
                    "semesterId": 2,
                    "semesterName": "Semester 2",
                    "courses": [
                        { "courseId": 3, "courseCode": "PHY201", "courseName": "Optics", "credit": 3.0 }
                    ]
                }
            ]
        }
    ]))
}

async fn handle_save_mapping(
    State(state): State<ApiServerState>,
    Json(payload): Json<MappingPayload>,
) -> Json<Value> {
    state.saved_mappings.lock().await.push(payload);
    Json(json!({ "success": true, "data": {} }))
}

async fn handle_delete_mapping(
    State(state): State<ApiServerState>,
    Path(id): Path<i64>,
) -> StatusCode {
    state.deleted_mapping_ids.lock().await.push(id);
    StatusCode::NO_CONTENT
}

async fn handle_countries() -> Json<Value> {
    Json(json!([{ "countryId": 1, "countryName": "India" }]))
}

async fn handle_states(State(state): State<ApiServerState>) -> Json<Value> {
    if *state.reject_states.lock().await {
        Json(json!({ "success": false, "data": [], "message": "state master unavailable" }))
    } else {
        Json(json!({
            "success": true,
            "data": [{ "stateId": 5, "countryId": 1, "stateName": "Kerala" }]
        }))
    }
}

async fn spawn_api_server() -> anyhow::Result<(String, ApiServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ApiServerState::default();
    let app = Router::new()
        .route("/api/academics/streams", get(handle_streams))
        .route("/api/academics/disciplines", get(handle_disciplines))
        .route("/api/academics/programs", get(handle_programs))
        .route("/api/academics/program-courses", post(handle_save_mapping))
        .route(
            "/api/academics/program-courses/:id",
            delete(handle_delete_mapping),
        )
        .route(
            "/api/academics/program-courses/programs/:id/syllabus",
            get(handle_syllabus),
        )
        .route(
            "/api/academics/organization-programs/:id",
            get(handle_org_programs),
        )
        .route("/api/masters/countries", get(handle_countries))
        .route("/api/masters/states", get(handle_states))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn client_for(server_url: &str) -> AcademicsClient {
    AcademicsClient::new(ApiConfig::new(server_url).expect("config"))
}

#[tokio::test]
async fn decodes_bare_and_wrapped_response_shapes() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = client_for(&server_url);

    let streams = client.list_streams().await.expect("streams");
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].stream_name, "Science");

    let disciplines = client
        .list_disciplines(StreamId(1))
        .await
        .expect("disciplines");
    assert_eq!(disciplines.len(), 1);
    assert_eq!(disciplines[0].discipline_name, "Physics");

    assert_eq!(
        state.discipline_queries.lock().await.clone(),
        vec!["1".to_string()]
    );
    assert_eq!(state.auth_headers.lock().await.clone(), vec![None]);
}

#[tokio::test]
async fn attaches_bearer_token_from_injected_config() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let config = ApiConfig::new(&server_url)
        .expect("config")
        .with_bearer_token("admin-session-token");
    let client = AcademicsClient::new(config);

    client.list_streams().await.expect("streams");

    assert_eq!(
        state.auth_headers.lock().await.clone(),
        vec![Some("Bearer admin-session-token".to_string())]
    );
}

#[tokio::test]
async fn envelope_rejection_surfaces_the_server_message() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    *state.reject_states.lock().await = true;
    let client = client_for(&server_url);

    let err = client
        .list_states(CountryId(1))
        .await
        .expect_err("must reject");
    assert!(err.to_string().contains("state master unavailable"));
}

#[tokio::test]
async fn error_status_surfaces_the_backend_error_body() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    *state.fail_streams.lock().await = true;
    let client = client_for(&server_url);

    let err = client.list_streams().await.expect_err("must fail");
    assert!(err.to_string().contains("stream master offline"));
}

#[tokio::test]
async fn fetches_syllabus_rows_by_program() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = client_for(&server_url);

    let rows = client.get_syllabus(ProgramId(100)).await.expect("syllabus");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].program_course_id, ProgramCourseId(7));
    assert_eq!(rows[0].course_code, "PHY101");
    assert!(rows[0].is_mandatory);
}

#[tokio::test]
async fn nested_assignments_support_credit_totals() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = client_for(&server_url);

    let programs = client
        .list_org_programs(OrganizationId(3))
        .await
        .expect("assignments");
    assert_eq!(programs.len(), 1);

    let total = program_total_credits(&programs[0]);
    assert_eq!(total, 9.0);
    assert_eq!(display_credits(total), 9);
}

#[tokio::test]
async fn save_and_delete_mapping_hit_the_expected_routes() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = client_for(&server_url);

    let payload = MappingPayload {
        program_course_id: ProgramCourseId(0),
        program_id: ProgramId(100),
        course_id: shared::domain::CourseId(1),
        semester_id: shared::domain::SemesterId(1),
        component_type_id: 2,
        is_mandatory: true,
    };
    client.save_mapping(&payload).await.expect("save");
    client
        .delete_mapping(ProgramCourseId(7))
        .await
        .expect("delete");

    let saved = state.saved_mappings.lock().await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].program_id, ProgramId(100));
    assert_eq!(state.deleted_mapping_ids.lock().await.clone(), vec![7]);
}

#[tokio::test]
async fn chain_source_drives_dependent_selection_end_to_end() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = Arc::new(client_for(&server_url));
    let chain = SelectionChain::new(
        academics_levels(),
        Arc::new(AcademicsChainSource::new(client)),
    )
    .expect("chain");

    chain.init().await.expect("init");
    let streams = chain.eligible_options(STREAM_LEVEL).await;
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].label, "Science");

    chain
        .select(STREAM_LEVEL, Some(OptionId(1)))
        .await
        .expect("select stream");
    let disciplines = chain.eligible_options(DISCIPLINE_LEVEL).await;
    assert_eq!(disciplines.len(), 1);
    assert_eq!(disciplines[0].label, "Physics");

    chain
        .select(DISCIPLINE_LEVEL, Some(OptionId(10)))
        .await
        .expect("select discipline");
    let programs = chain.eligible_options(PROGRAM_LEVEL).await;
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].id, OptionId(100));
    assert_eq!(programs[0].fields["degreeLevel"], "UG");
}

#[tokio::test]
async fn chain_sources_reject_unknown_levels() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = Arc::new(client_for(&server_url));

    let academics = AcademicsChainSource::new(client.clone());
    assert!(academics.fetch_options(9, None).await.is_err());

    let geography = GeographyChainSource::new(client);
    assert!(geography.fetch_options(9, None).await.is_err());
}

#[tokio::test]
async fn geography_chain_loads_states_for_a_country() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = Arc::new(client_for(&server_url));
    let chain = SelectionChain::new(
        geography_levels(),
        Arc::new(GeographyChainSource::new(client)),
    )
    .expect("chain");

    chain.init().await.expect("init");
    chain
        .select(COUNTRY_LEVEL, Some(OptionId(1)))
        .await
        .expect("select country");

    let states = chain.eligible_options(STATE_LEVEL).await;
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].label, "Kerala");
}
