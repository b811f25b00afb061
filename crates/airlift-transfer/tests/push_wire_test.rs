mod common;

use std::fs;

use serde_json::json;

use airlift_core::TableSnapshot;
use airlift_transfer::protocol::VERSION;
use airlift_transfer::{ConnectionMode, Departure};
use common::{CannedServer, TestSite};

fn ok_handshakes_then(status: u16, body: &str) -> CannedServer {
    CannedServer::start(vec![
        (200, "{}".to_string()),
        (200, "{}".to_string()),
        (status, body.to_string()),
    ])
}

fn push_site(address: &str) -> TestSite {
    let mut site = TestSite::new();
    site.settings.foreign_address = address.to_string();
    site.settings.foreign_password = "pw".into();
    site.settings.require_https = false;
    site
}

#[test]
fn transfer_requests_carry_identity_and_item_headers() {
    let server = ok_handshakes_then(200, "{}");
    let site = push_site(&server.address);
    fs::create_dir_all(site.dir.path().join("uploads")).unwrap();
    fs::write(site.dir.path().join("uploads/a.txt"), b"alpha").unwrap();

    let ctx = site.ctx();
    let summary = Departure::new(&ctx)
        .run(ConnectionMode::Push, "file", &[json!("uploads/a.txt")])
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let requests = server.join();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/airlift/v1/connection");
    assert_eq!(requests[1].path, "/airlift/v1/connection");

    let transfer = &requests[2];
    assert_eq!(transfer.method, "PATCH");
    assert_eq!(transfer.path, "/airlift/v1/transfer");
    assert_eq!(transfer.header("X-Airlift-Password"), Some("pw"));
    assert_eq!(transfer.header("X-Airlift-Item-Type"), Some("file"));
    assert_eq!(transfer.header("X-Airlift-Path"), Some("uploads/a.txt"));
    let expected_agent = format!("Airlift/{VERSION}");
    assert_eq!(transfer.header("User-Agent"), Some(expected_agent.as_str()));
    assert_eq!(transfer.body.as_slice(), b"alpha");

    // One connection id correlates every request of the run.
    let id = requests[0].header("X-Airlift-Connection").unwrap();
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    for request in &requests {
        assert_eq!(request.header("X-Airlift-Connection"), Some(id));
    }
}

#[test]
fn compat_mode_downgrades_the_transfer_verb() {
    let server = ok_handshakes_then(200, "{}");
    let mut site = push_site(&server.address);
    site.settings.compat_verbs = true;
    fs::write(site.dir.path().join("a.txt"), b"alpha").unwrap();

    let ctx = site.ctx();
    let summary = Departure::new(&ctx)
        .run(ConnectionMode::Push, "file", &[json!("a.txt")])
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let requests = server.join();
    let transfer = &requests[2];
    assert_eq!(transfer.method, "POST");
    assert_eq!(transfer.path, "/airlift/v1/transfer");
    assert_eq!(transfer.header("X-Airlift-Method-Override"), Some("PATCH"));
}

#[test]
fn remote_error_envelope_becomes_the_leaf_failure() {
    let server = ok_handshakes_then(500, r#"{"code":"SQL_FAILED","message":"bad dump"}"#);
    let site = push_site(&server.address);
    site.tables.insert_table(TableSnapshot {
        name: "wp_posts".into(),
        create_statement: "CREATE TABLE `wp_posts` (`ID` bigint)".into(),
        primary_key: "ID".into(),
        columns: vec!["ID".into()],
        rows: vec![vec!["1".into()]],
    });

    let ctx = site.ctx();
    let summary = Departure::new(&ctx)
        .run(ConnectionMode::Push, "database", &[json!("wp_posts")])
        .unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].1.starts_with("SQL_FAILED:"));
    assert!(summary.failures[0].1.contains("bad dump"));

    let requests = server.join();
    let transfer = &requests[2];
    assert_eq!(transfer.header("X-Airlift-Item-Type"), Some("database"));
    assert_eq!(transfer.header("X-Airlift-Table"), Some("wp_posts"));
    assert_eq!(transfer.header("X-Airlift-Prefix"), Some("wp_"));

    let log = fs::read_to_string(summary.log_path.unwrap()).unwrap();
    assert!(log.contains("\"SQL_FAILED\""));
}

#[test]
fn non_envelope_response_reads_as_a_failed_response() {
    let server = ok_handshakes_then(502, "<html>Bad Gateway</html>");
    let site = push_site(&server.address);
    fs::write(site.dir.path().join("a.txt"), b"alpha").unwrap();

    let ctx = site.ctx();
    let summary = Departure::new(&ctx)
        .run(ConnectionMode::Push, "file", &[json!("a.txt")])
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].1.starts_with("HTTP_RESPONSE_FAILED"));

    server.join();
}
