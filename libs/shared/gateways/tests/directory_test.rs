use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_gateways::{GatewayError, HttpStaffDirectory, StaffDirectory, StaffType};

fn config_for(server: &MockServer, timeout_ms: u64) -> AppConfig {
    AppConfig {
        staff_directory_url: server.uri(),
        staff_directory_api_key: "test-directory-key".to_string(),
        collaborator_timeout_ms: timeout_ms,
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn available_staff_parses_a_feed_page() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/v1/staff/available"))
        .and(query_param("type", "doctor"))
        .and(query_param("page", "0"))
        .and(query_param("page_size", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [{
                "id": doctor_id,
                "staff_type": "doctor",
                "first_name": "Imre",
                "last_name": "Farkas",
                "is_available": true
            }],
            "page": 0,
            "has_more": true
        })))
        .mount(&server)
        .await;

    let directory = HttpStaffDirectory::new(&config_for(&server, 5_000));
    let page = directory
        .available_staff(StaffType::Doctor, 0, 50)
        .await
        .expect("feed page");

    assert_eq!(page.members.len(), 1);
    assert_eq!(page.members[0].id, doctor_id);
    assert_eq!(page.members[0].full_name(), "Imre Farkas");
    assert!(page.has_more);
}

#[tokio::test]
async fn slow_feed_surfaces_as_unavailable_not_a_hang() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/staff/available"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"members": [], "page": 0, "has_more": false}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let directory = HttpStaffDirectory::new(&config_for(&server, 50));
    let result = directory.available_staff(StaffType::Doctor, 0, 50).await;

    assert_matches!(result, Err(GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn server_error_surfaces_as_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/staff/available"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let directory = HttpStaffDirectory::new(&config_for(&server, 5_000));
    let result = directory.available_staff(StaffType::Doctor, 0, 50).await;

    assert_matches!(result, Err(GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn unknown_user_resolves_to_none() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/v1/staff/resolve/{user_id}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let directory = HttpStaffDirectory::new(&config_for(&server, 5_000));
    let resolved = directory.resolve_doctor(user_id).await.expect("resolution");
    assert_eq!(resolved, None);
}

#[tokio::test]
async fn known_user_resolves_to_their_doctor_id() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/v1/staff/resolve/{user_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"doctor_id": doctor_id})))
        .mount(&server)
        .await;

    let directory = HttpStaffDirectory::new(&config_for(&server, 5_000));
    let resolved = directory.resolve_doctor(user_id).await.expect("resolution");
    assert_eq!(resolved, Some(doctor_id));
}
