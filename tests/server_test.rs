//! HTTP server endpoint tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use tower::ServiceExt;
use vmware_exporter::{
    client::{HttpConnector, SESSION_HEADER},
    config::Settings,
    credentials::{Credentials, StaticCredentials},
    metrics::ExporterMetrics,
    prober::Prober,
    server::router,
};

/// Helper to build the exporter router talking plain HTTP to the mock vCenter
fn create_test_app() -> Router {
    let mut vcenter = Settings::default().vcenter;
    vcenter.scheme = "http".to_string();
    vcenter.timeout_seconds = 5;

    let prober = Prober::new(
        Arc::new(HttpConnector::new(&vcenter)),
        Arc::new(StaticCredentials::new(Credentials::new("user", "pass"))),
        vcenter.port,
        vcenter.probe_timeout(),
    );

    router(prober, ExporterMetrics::new().unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn probe_uri(server: &ServerGuard, dc: &str) -> String {
    format!("/probe?target={}&dc={}", server.host_with_port(), dc)
}

/// Mocks for a complete probe. Returned in order:
/// session, datacenter, datastore, host, logout.
async fn mock_vcenter(server: &mut ServerGuard, hits: usize) -> Vec<Mock> {
    let session = server
        .mock("POST", "/api/session")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .with_status(201)
        .with_body(r#""tok123""#)
        .expect(hits)
        .create_async()
        .await;

    let datacenter = server
        .mock("GET", "/api/vcenter/datacenter")
        .match_query(Matcher::UrlEncoded("datacenters".into(), "DC1".into()))
        .match_header(SESSION_HEADER, "tok123")
        .with_status(200)
        .with_body(r#"[{"name":"DC1","datacenter":"dc-1"}]"#)
        .expect(hits)
        .create_async()
        .await;

    let datastore = server
        .mock("GET", "/api/vcenter/datastore")
        .match_query(Matcher::UrlEncoded("datacenters".into(), "DC1".into()))
        .match_header(SESSION_HEADER, "tok123")
        .with_status(200)
        .with_body(r#"[{"name":"ds1","type":"VMFS","free_space":100,"capacity":500}]"#)
        .expect(hits)
        .create_async()
        .await;

    let host = server
        .mock("GET", "/api/vcenter/host")
        .match_query(Matcher::UrlEncoded("datacenters".into(), "DC1".into()))
        .match_header(SESSION_HEADER, "tok123")
        .with_status(200)
        .with_body(r#"[{"name":"esx1","power_state":"POWERED_ON","connection_state":"CONNECTED"}]"#)
        .expect(hits)
        .create_async()
        .await;

    let logout = server
        .mock("DELETE", "/api/session")
        .match_header(SESSION_HEADER, "tok123")
        .with_status(200)
        .expect(hits)
        .create_async()
        .await;

    vec![session, datacenter, datastore, host, logout]
}

async fn assert_all(mocks: &[Mock]) {
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_root_endpoint_links_probe() {
    let app = create_test_app();

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/probe?target="));
}

#[tokio::test]
async fn test_probe_end_to_end() {
    let mut server = Server::new_async().await;
    let mocks = mock_vcenter(&mut server, 1).await;
    let app = create_test_app();

    let (status, body) = get(&app, &probe_uri(&server, "DC1")).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body.contains("# TYPE vmware_datastore_capacity_size gauge"));
    assert!(body.contains(
        r#"vmware_datastore_capacity_size{dc_name="DC1",ds_name="ds1",ds_type="VMFS"} 500"#
    ));
    assert!(body.contains(
        r#"vmware_datastore_free_size{dc_name="DC1",ds_name="ds1",ds_type="VMFS"} 100"#
    ));
    assert!(body.contains(r#"vmware_host_power_state{dc_name="DC1",host_name="esx1"} 1"#));
    assert!(body.contains(r#"vmware_host_connection_state{dc_name="DC1",host_name="esx1"} 1"#));

    // Logout recorded exactly once
    assert_all(&mocks).await;
}

#[tokio::test]
async fn test_probe_is_repeatable() {
    let mut server = Server::new_async().await;
    let mocks = mock_vcenter(&mut server, 2).await;
    let app = create_test_app();

    let (_, first) = get(&app, &probe_uri(&server, "DC1")).await;
    let (_, second) = get(&app, &probe_uri(&server, "DC1")).await;

    assert_eq!(first, second);
    assert_all(&mocks).await;
}

#[tokio::test]
async fn test_repeated_parameters_use_first_value() {
    let mut server = Server::new_async().await;
    let mocks = mock_vcenter(&mut server, 1).await;
    let app = create_test_app();

    let uri = format!(
        "/probe?target={}&dc=DC1&target=vc.invalid&dc=DC2",
        server.host_with_port()
    );
    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body.contains(r#"vmware_host_power_state{dc_name="DC1",host_name="esx1"} 1"#));
    assert_all(&mocks).await;
}

#[tokio::test]
async fn test_missing_target() {
    let mut server = Server::new_async().await;
    let mocks = mock_vcenter(&mut server, 0).await;
    let app = create_test_app();

    let (status, body) = get(&app, "/probe?dc=DC1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Target parameter is missing");

    let (status, body) = get(&app, "/probe?target=&dc=DC1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Target parameter is missing");

    assert_all(&mocks).await;
}

#[tokio::test]
async fn test_missing_dc() {
    let mut server = Server::new_async().await;
    let mocks = mock_vcenter(&mut server, 0).await;
    let app = create_test_app();

    let uri = format!("/probe?target={}", server.host_with_port());
    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "DC parameter is missing");
    assert_all(&mocks).await;
}

#[tokio::test]
async fn test_authentication_rejected() {
    let mut server = Server::new_async().await;

    let session = server
        .mock("POST", "/api/session")
        .with_status(403)
        .expect(1)
        .create_async()
        .await;
    let fetches = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let logout = server
        .mock("DELETE", "/api/session")
        .expect(0)
        .create_async()
        .await;

    let app = create_test_app();
    let (status, body) = get(&app, &probe_uri(&server, "DC1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "http response error: 403");
    assert_all(&[session, fetches, logout]).await;
}

#[tokio::test]
async fn test_fetch_failure_releases_session() {
    let mut server = Server::new_async().await;

    let session = server
        .mock("POST", "/api/session")
        .with_status(201)
        .with_body(r#""tok123""#)
        .create_async()
        .await;
    let datacenter = server
        .mock("GET", "/api/vcenter/datacenter")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"name":"DC1","datacenter":"dc-1"}]"#)
        .create_async()
        .await;
    let datastore = server
        .mock("GET", "/api/vcenter/datastore")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    let host = server
        .mock("GET", "/api/vcenter/host")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let logout = server
        .mock("DELETE", "/api/session")
        .match_header(SESSION_HEADER, "tok123")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let app = create_test_app();
    let (status, body) = get(&app, &probe_uri(&server, "DC1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "http response error: 503");
    assert!(!body.contains("vmware_"));
    assert_all(&[session, datacenter, datastore, host, logout]).await;
}

#[tokio::test]
async fn test_unknown_datacenter() {
    let mut server = Server::new_async().await;

    let _session = server
        .mock("POST", "/api/session")
        .with_status(201)
        .with_body(r#""tok123""#)
        .create_async()
        .await;
    let _datacenter = server
        .mock("GET", "/api/vcenter/datacenter")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let datastore = server
        .mock("GET", "/api/vcenter/datastore")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let logout = server
        .mock("DELETE", "/api/session")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let app = create_test_app();
    let (status, body) = get(&app, &probe_uri(&server, "NOPE")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Datacenter 'NOPE' not found");
    assert_all(&[datastore, logout]).await;
}

#[tokio::test]
async fn test_invalid_target_port() {
    let app = create_test_app();

    let (status, body) = get(&app, "/probe?target=vc.example.com:notaport&dc=DC1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid target"));
}

#[tokio::test]
async fn test_exporter_metrics_count_probes() {
    let mut server = Server::new_async().await;
    let _mocks = mock_vcenter(&mut server, 1).await;
    let app = create_test_app();

    get(&app, &probe_uri(&server, "DC1")).await;
    get(&app, "/probe?dc=DC1").await;

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"vmware_exporter_probes_total{result="success"} 1"#));
    assert!(body.contains(r#"vmware_exporter_probes_total{result="failure"} 1"#));
    // Probe series never show up on the exporter's own endpoint
    assert!(!body.contains("vmware_host_power_state"));
}
