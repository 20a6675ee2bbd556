//! Integration tests for the login handshake and session cookies

mod common;

use campus_harvest::harvest::StaticCredentials;
use campus_harvest::{DatasetSelection, HarvestError, RunOutcome, RunStatus};
use common::*;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn error_steps(orchestrator: &campus_harvest::Orchestrator) -> Vec<String> {
    orchestrator
        .state()
        .errors
        .iter()
        .map(|e| e.step.clone())
        .collect()
}

#[tokio::test]
async fn test_login_sends_token_from_login_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/displayLogin.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/j_aisis/login.do"))
        .and(body_string_contains("rnd=r123"))
        .and(body_string_contains("command=login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WELCOME_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let outcome = orchestrator.start(&DatasetSelection::default()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    let state = orchestrator.state();
    assert_eq!(state.total_steps, 1);
    assert_eq!(state.completed_steps, 1);
    assert!(state.errors.is_empty());
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_login_without_token_omits_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/displayLogin.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form action="login.do"><input name="userName"><input name="password"></form>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/j_aisis/login.do"))
        .and(|request: &Request| !String::from_utf8_lossy(&request.body).contains("rnd="))
        .respond_with(ResponseTemplate::new(200).set_body_string(WELCOME_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let outcome = orchestrator.start(&DatasetSelection::default()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_login_succeeds_on_landing_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/displayLogin.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/j_aisis/login.do"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/j_aisis/welcome.do", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/welcome.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Hello, STUDENT</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let outcome = orchestrator.start(&DatasetSelection::default()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_bad_credentials_fail_the_run_without_retry() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    // Anyone but the test user gets the login page back
    Mock::given(method("POST"))
        .and(path("/j_aisis/login.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator_with(
        test_config(&server, &dir.path().join("state.db")),
        StaticCredentials::new("intruder", "guess"),
    );
    let selection = DatasetSelection::from_names(["grades"]).unwrap();
    let result = orchestrator.start(&selection).await;

    assert!(matches!(result, Err(HarvestError::Authentication(_))));
    let state = orchestrator.state();
    assert_eq!(state.status, RunStatus::Failed);
    assert!(state.last_failure.is_some());
    assert_eq!(error_steps(&orchestrator), vec!["login", "main"]);
    assert!(!state.scraped_data.contains_key(&campus_harvest::DatasetKey::Grades));
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_login_retries_timeouts_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/displayLogin.do"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LOGIN_PAGE)
                .set_delay(Duration::from_millis(500)),
        )
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir.path().join("state.db"));
    config.client.timeout_ms = 100;
    let mut orchestrator = orchestrator(config);
    let result = orchestrator.start(&DatasetSelection::default()).await;

    assert!(matches!(result, Err(HarvestError::Authentication(_))));
    let state = orchestrator.state();
    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.metrics.last_status.as_deref(), Some("timeout"));
    assert_eq!(state.metrics.total_requests, 4);
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_session_cookie_is_sent_after_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/displayLogin.do"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LOGIN_PAGE)
                .insert_header("set-cookie", "JSESSIONID=abc123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/j_aisis/login.do"))
        .and(header("cookie", "JSESSIONID=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WELCOME_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VHOR.do"))
        .and(header("cookie", "JSESSIONID=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
                 <tr><th>Hold</th><th>Office</th></tr>
                 <tr><td>Library fine</td><td>Library</td></tr>
               </table>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let selection = DatasetSelection::from_names(["holds"]).unwrap();
    assert_eq!(
        orchestrator.start(&selection).await.unwrap(),
        RunOutcome::Completed
    );
    assert!(orchestrator.state().errors.is_empty());
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_missing_credentials_never_touch_the_portal() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator_with(
        test_config(&server, &dir.path().join("state.db")),
        StaticCredentials::none(),
    );
    let result = orchestrator.start(&DatasetSelection::all()).await;

    assert!(matches!(result, Err(HarvestError::MissingCredentials)));
    assert_eq!(orchestrator.state().status, RunStatus::Idle);
    assert_eq!(error_steps(&orchestrator), vec!["main"]);
    assert!(server.received_requests().await.unwrap().is_empty());
    orchestrator.shutdown();
}
