//! Poll → reconcile → target files, end to end

use std::fs;
use std::path::Path;
use std::time::Duration;

use flink_sd::common::protocol::TargetGroup;
use flink_sd::error::SdError;
use flink_sd::reconciler::Reconciler;
use flink_sd::registry::DirectoryRegistry;
use flink_sd::service::{poll_once, run_once, run_polling};
use flink_sd::shutdown::ShutdownController;
use flink_sd::yarn::ApplicationFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{
    extractor, fast_settings, mount_app_list, mount_running, yarn_client, FlinkApp,
};

fn read_targets(dir: &Path, app_id: &str) -> Option<Vec<String>> {
    let content = fs::read_to_string(dir.join(format!("{app_id}.json"))).ok()?;
    let groups: Vec<TargetGroup> = serde_json::from_str(&content).unwrap();
    assert_eq!(groups.len(), 1);
    Some(groups.into_iter().next().unwrap().targets)
}

fn filter() -> ApplicationFilter {
    ApplicationFilter::new(Some("Apache Flink"), None).unwrap()
}

#[tokio::test]
async fn test_discovers_then_removes_application() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = FlinkApp::new("app-1", "h", &["w1"]);
    mount_app_list(&server, vec![app.yarn_json(&server)]).await;
    mount_running(&server, &app).await;

    let yarn = yarn_client(&server);
    let registry = DirectoryRegistry::open(dir.path()).unwrap();
    let mut reconciler = Reconciler::new(extractor(&server, fast_settings(3)), registry);

    let report = poll_once(&yarn, &filter(), &mut reconciler).await.unwrap();
    assert_eq!(report.written, vec!["app-1"]);
    assert_eq!(
        read_targets(dir.path(), "app-1").unwrap(),
        vec!["h:9249", "w1:9250"]
    );
    let raw = fs::read_to_string(dir.path().join("app-1.json")).unwrap();
    assert_eq!(raw, r#"[{"targets":["h:9249","w1:9250"]}]"#);

    server.reset().await;
    mount_app_list(&server, vec![]).await;

    let report = poll_once(&yarn, &filter(), &mut reconciler).await.unwrap();
    assert_eq!(report.removed, vec!["app-1"]);
    assert!(read_targets(dir.path(), "app-1").is_none());
}

#[tokio::test]
async fn test_restart_rewrites_with_fresh_endpoints() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let first = FlinkApp::new("app-1", "h", &["w1"]);
    mount_app_list(&server, vec![first.yarn_json(&server)]).await;
    mount_running(&server, &first).await;

    let yarn = yarn_client(&server);
    let registry = DirectoryRegistry::open(dir.path()).unwrap();
    let mut reconciler = Reconciler::new(extractor(&server, fast_settings(3)), registry)
        .with_refresh(false);
    poll_once(&yarn, &filter(), &mut reconciler).await.unwrap();

    server.reset().await;
    let second = FlinkApp::new("app-1", "h2", &["w2"]).with_attempt(2);
    mount_app_list(&server, vec![second.yarn_json(&server)]).await;
    mount_running(&server, &second).await;

    let report = poll_once(&yarn, &filter(), &mut reconciler).await.unwrap();

    assert_eq!(report.restarted, vec!["app-1"]);
    assert_eq!(
        read_targets(dir.path(), "app-1").unwrap(),
        vec!["h2:9249", "w2:9250"]
    );
}

#[tokio::test]
async fn test_list_failure_keeps_targets() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = FlinkApp::new("app-1", "h", &["w1"]);
    mount_app_list(&server, vec![app.yarn_json(&server)]).await;
    mount_running(&server, &app).await;

    let yarn = yarn_client(&server);
    let registry = DirectoryRegistry::open(dir.path()).unwrap();
    let mut reconciler = Reconciler::new(extractor(&server, fast_settings(3)), registry);
    poll_once(&yarn, &filter(), &mut reconciler).await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(poll_once(&yarn, &filter(), &mut reconciler).await.is_none());
    assert!(read_targets(dir.path(), "app-1").is_some());
    assert!(reconciler.previous().contains("app-1"));
}

#[tokio::test]
async fn test_run_once_writes_single_application() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = FlinkApp::new("app-1", "h", &["w1", "w2"]);
    mount_running(&server, &app).await;

    let registry = DirectoryRegistry::open(dir.path()).unwrap();
    let endpoints = run_once("app-1", &extractor(&server, fast_settings(3)), &registry)
        .await
        .unwrap();

    assert_eq!(endpoints.len(), 3);
    assert_eq!(
        read_targets(dir.path(), "app-1").unwrap(),
        vec!["h:9249", "w1:9250", "w2:9250"]
    );
}

#[tokio::test]
async fn test_run_once_unresolved_is_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let registry = DirectoryRegistry::open(dir.path()).unwrap();
    let err = run_once("app-missing", &extractor(&server, fast_settings(2)), &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, SdError::Unresolved { ref app_id, .. } if app_id == "app-missing"));
    assert!(read_targets(dir.path(), "app-missing").is_none());
}

#[tokio::test]
async fn test_polling_stops_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"apps": null})))
        .expect(1..)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let yarn = yarn_client(&server);
    let registry = DirectoryRegistry::open(dir.path()).unwrap();
    let mut reconciler = Reconciler::new(extractor(&server, fast_settings(1)), registry);
    let shutdown = ShutdownController::default();

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.request_shutdown();
        })
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        run_polling(
            &yarn,
            &filter(),
            &mut reconciler,
            Duration::from_millis(20),
            &shutdown,
        ),
    )
    .await
    .unwrap();
    trigger.await.unwrap();
}
