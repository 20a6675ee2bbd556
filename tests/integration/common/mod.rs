//! Mock portal shared by the integration tests

#![allow(dead_code)]

use campus_harvest::config::{Config, PacingConfig};
use campus_harvest::harvest::StaticCredentials;
use campus_harvest::storage::SqliteStateStore;
use campus_harvest::Orchestrator;
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "student";
pub const PASSWORD: &str = "s3cret";

pub const LOGIN_PAGE: &str = r#"<html><body>
    <form action="login.do" method="post">
      <input type="text" name="userName">
      <input type="password" name="password">
      <input type="hidden" name="rnd" value="r123">
    </form></body></html>"#;

pub const WELCOME_PAGE: &str =
    r#"<html><body><a href="welcome.do">welcome</a>, STUDENT</body></html>"#;

/// Creates a configuration pointing at the mock portal with no pacing delays
pub fn test_config(server: &MockServer, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.portal.base_url = format!("{}/j_aisis/", server.uri());
    config.client.timeout_ms = 2_000;
    config.client.cooldown_min_ms = 0;
    config.client.cooldown_max_ms = 0;
    config.pacing = PacingConfig {
        item_delay_min_ms: 0,
        item_delay_max_ms: 0,
        page_delay_ms: 0,
        login_retries: 3,
        login_backoff_ms: 0,
    };
    config.storage.database_path = db_path.to_string_lossy().to_string();
    config
}

/// Opens an orchestrator over the configured database with test credentials
pub fn orchestrator(config: Config) -> Orchestrator {
    orchestrator_with(config, StaticCredentials::new(USERNAME, PASSWORD))
}

pub fn orchestrator_with(config: Config, credentials: StaticCredentials) -> Orchestrator {
    let store = SqliteStateStore::new(Path::new(&config.storage.database_path))
        .expect("Failed to open state database");
    Orchestrator::new(config, Box::new(store), Arc::new(credentials), "test-hash")
        .expect("Failed to create orchestrator")
}

/// Mounts a login page with a token and a login form that accepts the test user
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/j_aisis/displayLogin.do"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LOGIN_PAGE)
                .insert_header("set-cookie", "JSESSIONID=abc123; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/j_aisis/login.do"))
        .and(body_string_contains(format!("userName={}", USERNAME)))
        .respond_with(ResponseTemplate::new(200).set_body_string(WELCOME_PAGE))
        .mount(server)
        .await;
}

pub fn schedule_index() -> String {
    r#"<html><body><form method="post">
        <select name="applicablePeriod">
          <option value="2024-2">Second Semester 2024</option>
          <option value="2025-0" selected>Intersession 2025</option>
        </select>
        <select name="deptCode">
          <option value="ALL">All Departments</option>
          <option value="MA">Mathematics</option>
          <option value="CS">Computer Science</option>
          <option value="IS">Information Systems</option>
          <option value="EN">English</option>
        </select>
      </form></body></html>"#
        .to_string()
}

/// Results page of one department with `count` class rows
pub fn schedule_results(department: &str, count: usize) -> String {
    let mut rows = String::new();
    for i in 0..count {
        rows.push_str(&format!(
            "<tr><td>{dept} {n}</td><td>{sec}</td><td>Course {n}</td><td>3</td>\
             <td>M-TH 0800-0930</td><td>SEC-A 20{i}</td><td>DOE, JANE</td><td>40</td>\
             <td>ENG</td><td>U</td><td>5</td><td>-</td><td>N</td><td>-</td></tr>",
            dept = department,
            n = 10 + i,
            sec = ["A", "B", "C"][i % 3],
            i = i,
        ));
    }
    format!(
        r#"<html><body>
        <table><tr><td>Schedule of Classes</td></tr></table>
        <table>
          <tr><td>Subject Code</td><td>Section</td><td>Course Title</td><td>Units</td>
              <td>Time</td><td>Room</td><td>Instructor</td><td>Max No</td><td>Lang</td>
              <td>Level</td><td>Free Slots</td><td>Remarks</td><td>S</td><td>P</td></tr>
          {}
        </table></body></html>"#,
        rows
    )
}

/// Rows per department served by [`mount_schedule`]
pub const DEPARTMENTS: [(&str, usize); 4] = [("MA", 2), ("CS", 1), ("IS", 3), ("EN", 2)];

/// Mounts the schedule of classes index and one result page per department
pub async fn mount_schedule(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VCSC.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(schedule_index()))
        .mount(server)
        .await;

    for (department, count) in DEPARTMENTS {
        Mock::given(method("POST"))
            .and(path("/j_aisis/J_VCSC.do"))
            .and(body_string_contains(format!("deptCode={}", department)))
            .and(body_string_contains("applicablePeriod=2025-0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(schedule_results(department, count)),
            )
            .mount(server)
            .await;
    }
}

pub async fn mount_curriculum(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VOFC.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<select name="degCode">
                 <option value="">Select a program</option>
                 <option value="BSCS">BS Computer Science</option>
               </select>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/j_aisis/J_VOFC.do"))
        .and(body_string_contains("degCode=BSCS"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
                 <tr><td colspan="3">First Year, First Semester</td></tr>
                 <tr><td>Cat No</td><td>Course Title</td><td>Units</td></tr>
                 <tr><td>CSCI 20</td><td>Programming</td><td>3</td></tr>
                 <tr><td>MATH 21</td><td>Calculus</td><td>4</td></tr>
               </table>"#,
        ))
        .mount(server)
        .await;
}

pub async fn mount_grades(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VG.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
                 <tr><td class="text02">2024-2025</td><td class="text02">1</td>
                     <td class="text02">BS CS</td><td class="text02">CSCI 30</td>
                     <td class="text02">Algorithms</td><td class="text02">3</td>
                     <td class="text02">3.5</td></tr>
               </table>"#,
        ))
        .mount(server)
        .await;
}

pub async fn mount_class_schedule(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VMCS.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
                 <tr><th>Time</th><th>Mon</th><th>Tue</th></tr>
                 <tr><td>0800-0930</td><td>CSCI 30<br>Room 301</td><td></td></tr>
                 <tr><td>1:00-2:30pm</td><td></td><td>MATH 21<br>Online</td></tr>
               </table>"#,
        ))
        .mount(server)
        .await;
}

pub async fn mount_hold_orders(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VHOR.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
                 <tr><th>Hold</th><th>Office</th></tr>
                 <tr><td>Library fine</td><td>Library</td></tr>
               </table>"#,
        ))
        .mount(server)
        .await;
}
