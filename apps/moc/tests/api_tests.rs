//! Integration tests for the MOC HTTP API.
//!
//! Uses axum-test to drive the router without starting a real server.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum_test::TestServer;
use moc::api::{
    AppState, DocumentResponse, EventsResponse, HealthResponse, ListResponse, RequestResponse,
    RiskResponse, TransitionResponse, create_router,
};
use moc::config::MocConfig;
use moc_core::{
    RequestStatus, StageKind, TaskSlot, TaskStatus, WorkflowEvent, document_from_bytes,
};
use serde_json::{Value, json};

const CONFIG: &str = r#"
[server]
rate_limit = 0

[[people]]
id = "p1"
name = "Ana Costa"
role = "Electrical Engineer"

[[people]]
id = "p2"
name = "Bo Lindgren"
role = "MOC Engineer"

[[disciplines]]
id = "d1"
name = "Electrical"
direct_manager = "R. Osei"

[[disciplines]]
id = "d2"
name = "Mechanical"
direct_manager = "L. Brandt"
"#;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn create_test_server() -> TestServer {
    let config = MocConfig::from_toml_str(CONFIG).unwrap();
    TestServer::new(create_router(AppState::new(&config))).unwrap()
}

fn intake() -> Value {
    json!({
        "title": "Replace relief valve PSV-101",
        "area": "North Plant",
        "unit": "Unit 3",
        "change_type": "Equipment",
        "change_length": "Permanent",
        "priority": "Normal",
        "justification": "Valve is undersized for the new throughput",
        "initiator": "p1",
        "risk_before": { "severity": 3, "probability": 3 },
        "risk_after": { "severity": 2, "probability": 1 }
    })
}

async fn open_request(server: &TestServer, id: &str) -> RequestResponse {
    let response = server
        .post("/requests")
        .json(&json!({ "id": id, "intake": intake() }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    response.json()
}

async fn complete(server: &TestServer, id: &str, body: Value) -> (u16, TransitionResponse) {
    let response = server
        .post(&format!("/requests/{}/tasks/complete", id))
        .json(&body)
        .await;
    (response.status_code().as_u16(), response.json())
}

async fn complete_plain(server: &TestServer, id: &str, stage: &str, index: usize) {
    let (status, body) = complete(
        server,
        id,
        json!({ "stage": stage, "task_index": index }),
    )
    .await;
    assert_eq!(status, 200, "{}/{} failed: {:?}", stage, index, body.error);
}

/// Drive a fresh request up to the approval task.
async fn drive_to_approval(server: &TestServer, id: &str) -> TransitionResponse {
    complete_plain(server, id, "Initiation", 0).await;
    complete_plain(server, id, "Initiation", 1).await;

    let (status, _) = complete(
        server,
        id,
        json!({
            "stage": "Initiation",
            "task_index": 2,
            "payload": { "EngineerSelection": "p2" }
        }),
    )
    .await;
    assert_eq!(status, 200);

    complete_plain(server, id, "Review", 0).await;

    let (status, body) = complete(
        server,
        id,
        json!({
            "stage": "Review",
            "task_index": 1,
            "payload": { "DisciplineAssignments": [
                {
                    "discipline_id": "d1",
                    "discipline_name": "Electrical",
                    "assigned_person": "p1",
                    "direct_manager_name": "R. Osei",
                    "not_applicable": false
                },
                {
                    "discipline_id": "d2",
                    "discipline_name": "Mechanical",
                    "assigned_person": "p404",
                    "direct_manager_name": "L. Brandt",
                    "not_applicable": false
                }
            ]}
        }),
    )
    .await;
    assert_eq!(status, 200, "{:?}", body.error);
    body
}

// =============================================================================
// HEALTH & RISK
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();
    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_risk_endpoint() {
    let server = create_test_server();

    let response = server
        .post("/risk")
        .json(&json!({ "severity": 4, "probability": 4 }))
        .await;
    response.assert_status_ok();
    let risk: RiskResponse = response.json();
    assert_eq!(risk.risk_code.as_deref(), Some("D4"));
    assert_eq!(risk.band.as_deref(), Some("Critical"));
    assert_eq!(risk.product, Some(16));

    let response = server
        .post("/risk")
        .json(&json!({ "severity": 0, "probability": 1 }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
    let risk: RiskResponse = response.json();
    assert!(!risk.success);
}

// =============================================================================
// REQUEST LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_request() {
    let server = create_test_server();
    let created = open_request(&server, "MOC-1").await;

    assert!(created.success);
    assert_eq!(
        created.active,
        Some(TaskSlot::new(StageKind::Initiation, 0))
    );
    assert_eq!(created.progress.len(), 4);

    let response = server.get("/requests/MOC-1").await;
    response.assert_status_ok();
    let fetched: RequestResponse = response.json();
    let request = fetched.request.unwrap();
    assert_eq!(request.risk_before().risk_code(), "C3");
    assert_eq!(request.risk_after().risk_code(), "A2");

    let list: ListResponse = server.get("/requests").await.json();
    assert_eq!(list.requests.len(), 1);
    assert_eq!(list.requests[0].id, "MOC-1");
}

#[tokio::test]
async fn test_create_assigns_id_and_refuses_duplicates() {
    let server = create_test_server();

    let response = server
        .post("/requests")
        .json(&json!({ "intake": intake() }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    let created: RequestResponse = response.json();
    assert_eq!(created.request.unwrap().id().as_str(), "MOC-0001");

    let response = server
        .post("/requests")
        .json(&json!({ "id": "MOC-0001", "intake": intake() }))
        .await;
    assert_eq!(response.status_code().as_u16(), 409);
}

#[tokio::test]
async fn test_create_invalid_intake() {
    let server = create_test_server();

    let mut body = intake();
    body["title"] = json!("   ");
    let response = server
        .post("/requests")
        .json(&json!({ "id": "MOC-2", "intake": body }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);

    let mut body = intake();
    body["risk_after"] = json!({ "severity": 5, "probability": 1 });
    let response = server
        .post("/requests")
        .json(&json!({ "id": "MOC-3", "intake": body }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);

    let list: ListResponse = server.get("/requests").await.json();
    assert!(list.requests.is_empty());
}

#[tokio::test]
async fn test_unknown_request_is_404() {
    let server = create_test_server();

    assert_eq!(
        server.get("/requests/MOC-404").await.status_code().as_u16(),
        404
    );
    let (status, body) = complete(
        &server,
        "MOC-404",
        json!({ "stage": "Initiation", "task_index": 0 }),
    )
    .await;
    assert_eq!(status, 404);
    assert!(!body.success);
}

// =============================================================================
// GATING
// =============================================================================

#[tokio::test]
async fn test_out_of_order_completion_is_conflict() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;

    let (status, body) = complete(
        &server,
        "MOC-1",
        json!({ "stage": "Initiation", "task_index": 1 }),
    )
    .await;
    assert_eq!(status, 409);
    assert!(body.error.unwrap().contains("Out-of-order"));

    let (status, _) = complete(
        &server,
        "MOC-1",
        json!({ "stage": "Closeout", "task_index": 9 }),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_payload_mismatch_and_validation() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;
    complete_plain(&server, "MOC-1", "Initiation", 0).await;
    complete_plain(&server, "MOC-1", "Initiation", 1).await;

    let (status, body) = complete(
        &server,
        "MOC-1",
        json!({
            "stage": "Initiation",
            "task_index": 2,
            "payload": { "DocumentReview": [] }
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body.error.unwrap().contains("Payload mismatch"));

    complete_plain(&server, "MOC-1", "Initiation", 2).await;
    complete_plain(&server, "MOC-1", "Review", 0).await;

    let (status, body) = complete(
        &server,
        "MOC-1",
        json!({ "stage": "Review", "task_index": 1 }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body.error.unwrap().contains("no discipline assigned"));
}

#[tokio::test]
async fn test_reject_annotate_reopen() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;

    let response = server
        .post("/requests/MOC-1/tasks/reject")
        .json(&json!({ "stage": "Initiation", "task_index": 0, "remark": "" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);

    let response = server
        .post("/requests/MOC-1/tasks/reopen")
        .json(&json!({ "stage": "Initiation", "task_index": 0 }))
        .await;
    assert_eq!(response.status_code().as_u16(), 409);

    let response = server
        .post("/requests/MOC-1/tasks/reject")
        .json(&json!({ "stage": "Initiation", "task_index": 0, "remark": "sketch missing" }))
        .await;
    response.assert_status_ok();
    let body: TransitionResponse = response.json();
    assert_eq!(
        body.events[0].status_change(),
        Some((TaskSlot::new(StageKind::Initiation, 0), TaskStatus::Rejected))
    );

    let response = server
        .post("/requests/MOC-1/tasks/annotate")
        .json(&json!({
            "stage": "Initiation",
            "task_index": 0,
            "comment": "sketch attached",
            "attachments": [{ "category": "Sketch", "file_name": "psv-101.pdf" }]
        }))
        .await;
    response.assert_status_ok();

    let response = server
        .post("/requests/MOC-1/tasks/reopen")
        .json(&json!({ "stage": "Initiation", "task_index": 0 }))
        .await;
    response.assert_status_ok();

    let fetched: RequestResponse = server.get("/requests/MOC-1").await.json();
    let request = fetched.request.unwrap();
    let task = request
        .task(TaskSlot::new(StageKind::Initiation, 0))
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.attachments.len(), 1);
    assert!(task.rejection_remark.is_none());
    assert!(task.comments.iter().any(|c| c.contains("sketch missing")));
}

// =============================================================================
// FULL WORKFLOW
// =============================================================================

#[tokio::test]
async fn test_full_workflow_over_http() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;

    let assigned = drive_to_approval(&server, "MOC-1").await;
    assert!(assigned.events.iter().any(|e| matches!(
        e,
        WorkflowEvent::PayloadPropagated { entries: 2, .. }
    )));
    assert!(assigned.events.iter().any(WorkflowEvent::is_warning));
    assert_eq!(
        assigned.active,
        Some(TaskSlot::new(StageKind::Review, 2))
    );

    // Rows mirror the assignments; the unknown person has an empty name.
    let fetched: RequestResponse = server.get("/requests/MOC-1").await.json();
    let request = fetched.request.unwrap();
    let rows = request
        .task(TaskSlot::new(StageKind::Review, 2))
        .unwrap()
        .payload
        .approval_rows()
        .unwrap()
        .to_vec();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].assigned_person_name, "Ana Costa");
    assert_eq!(rows[1].assigned_person_name, "");

    let response = server
        .post("/requests/MOC-1/approvals")
        .json(&json!({ "row_id": "d9", "status": "Approved" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 404);

    for (row, decision) in [("d1", "Approved"), ("d2", "Rejected")] {
        let response = server
            .post("/requests/MOC-1/approvals")
            .json(&json!({ "row_id": row, "status": decision, "remark": "checked" }))
            .await;
        response.assert_status_ok();
    }

    // Walk every remaining task with its current payload.
    let mut last = TransitionResponse::error("not started");
    for _ in 0..16 {
        let fetched: RequestResponse = server.get("/requests/MOC-1").await.json();
        let Some(slot) = fetched.active else {
            break;
        };
        let (status, body) = complete(
            &server,
            "MOC-1",
            json!({ "stage": slot.stage, "task_index": slot.index }),
        )
        .await;
        assert_eq!(status, 200, "{} failed: {:?}", slot, body.error);
        last = body;
    }

    assert_eq!(last.status, Some(RequestStatus::Closed));
    assert!(last.events.contains(&WorkflowEvent::RequestClosed));
    assert_eq!(last.active, None);

    // Terminal: no further transitions or side actions.
    let (status, _) = complete(
        &server,
        "MOC-1",
        json!({ "stage": "Closeout", "task_index": 1 }),
    )
    .await;
    assert_eq!(status, 409);
    let response = server
        .post("/requests/MOC-1/actions")
        .json(&json!({ "action": "cancel", "reason": "too late" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 409);

    let events: EventsResponse = server.get("/requests/MOC-1/events").await.json();
    assert!(events.success);
    assert_eq!(events.events.last(), Some(&WorkflowEvent::RequestClosed));
}

// =============================================================================
// SIDE ACTIONS
// =============================================================================

#[tokio::test]
async fn test_side_actions() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;

    let response = server
        .post("/requests/MOC-1/actions")
        .json(&json!({ "action": "extend", "new_end_date": "2025-01-01", "reason": "delay" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);

    let response = server
        .post("/requests/MOC-1/actions")
        .json(&json!({ "action": "change_champion", "champion": "p2", "reason": "handover" }))
        .await;
    response.assert_status_ok();

    let response = server
        .post("/requests/MOC-1/actions")
        .json(&json!({ "action": "cancel", "reason": "superseded by MOC-9" }))
        .await;
    response.assert_status_ok();
    let body: TransitionResponse = response.json();
    assert_eq!(body.status, Some(RequestStatus::Cancelled));

    let fetched: RequestResponse = server.get("/requests/MOC-1").await.json();
    let request = fetched.request.unwrap();
    assert_eq!(request.champion().map(|p| p.as_str()), Some("p2"));
    assert_eq!(request.history().len(), 2);
    assert_eq!(fetched.active, None);
}

// =============================================================================
// DOCUMENT EXPORT / IMPORT
// =============================================================================

#[tokio::test]
async fn test_document_round_trip() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;
    complete_plain(&server, "MOC-1", "Initiation", 0).await;

    let response = server.get("/requests/MOC-1/document").await;
    response.assert_status_ok();
    let document: DocumentResponse = response.json();
    let data = document.data.unwrap();

    let bytes =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &data).unwrap();
    assert_eq!(bytes.len(), document.size);
    let restored = document_from_bytes(&bytes).unwrap();
    assert_eq!(
        restored.active_slot(),
        Some(TaskSlot::new(StageKind::Initiation, 1))
    );

    // Same server: id already taken.
    let response = server
        .post("/requests/import")
        .json(&json!({ "data": data }))
        .await;
    assert_eq!(response.status_code().as_u16(), 409);

    // Fresh server picks up where the first left off.
    let other = create_test_server();
    let response = other
        .post("/requests/import")
        .json(&json!({ "data": data }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    complete_plain(&other, "MOC-1", "Initiation", 1).await;

    let response = other
        .post("/requests/import")
        .json(&json!({ "data": "bm90IGEgZG9jdW1lbnQ=" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
}

// =============================================================================
// ACCESS
// =============================================================================

#[tokio::test]
async fn test_endpoints_need_no_credentials() {
    let server = create_test_server();
    open_request(&server, "MOC-1").await;

    let response = server.get("/requests").await;
    response.assert_status_ok();
    let list: ListResponse = response.json();
    assert_eq!(list.requests.len(), 1);

    let response = server
        .get("/requests/MOC-1")
        .add_header(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer anything"),
        )
        .await;
    response.assert_status_ok();
}
