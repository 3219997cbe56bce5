//! Endpoint extraction against a mocked JobManager

use flink_sd::extractor::{
    EndpointResolver, NoReporterPolicy, PartialPolicy, Resolution, UnresolvedReason,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{
    extractor, fast_settings, mount_flink, mount_running, mount_yarn_app, reporter_log, FlinkApp,
};

fn targets(resolution: Resolution) -> Vec<String> {
    match resolution {
        Resolution::Resolved(endpoints) => endpoints.targets(),
        Resolution::Unresolved(reason) => panic!("unexpected unresolved: {reason}"),
    }
}

#[tokio::test]
async fn test_resolves_master_and_worker() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "h", &["w1"]);
    mount_running(&server, &app).await;

    let resolution = extractor(&server, fast_settings(3)).resolve("app-1").await;

    assert_eq!(targets(resolution), vec!["h:9249", "w1:9250"]);
}

#[tokio::test]
async fn test_master_log_hostname_overrides_rpc_address() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "10.1.2.3", &["w1", "w2"])
        .with_master_log(reporter_log(Some("jm-host"), 9249));
    mount_running(&server, &app).await;

    let resolution = extractor(&server, fast_settings(3)).resolve("app-1").await;

    assert_eq!(
        targets(resolution),
        vec!["jm-host:9249", "w1:9250", "w2:9250"]
    );
}

#[tokio::test]
async fn test_worker_count_gate_skips_worker_logs() {
    let server = MockServer::start().await;
    // N+1 containers but only N-1 workers registered
    let app = FlinkApp::new("app-1", "h", &["w1"]).with_running_containers(Some(3));
    mount_yarn_app(&server, &app).await;

    Mock::given(method("GET"))
        .and(path(app.proxy_path("overview")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flink-version": "1.17.1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(app.proxy_path("taskmanagers")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"taskmanagers": [{"id": app.workers[0].0}]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(app.proxy_path(&format!(
            "taskmanagers/{}/log",
            app.workers[0].0
        ))))
        .respond_with(ResponseTemplate::new(200).set_body_string(app.workers[0].1.clone()))
        .expect(0)
        .mount(&server)
        .await;

    let resolution = extractor(&server, fast_settings(2)).resolve("app-1").await;

    assert_eq!(
        resolution,
        Resolution::Unresolved(UnresolvedReason::RetriesExhausted { attempts: 2 })
    );
}

#[tokio::test]
async fn test_unknown_container_count_still_scans_workers() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "h", &["w1", "w2"]).with_running_containers(None);
    mount_running(&server, &app).await;

    let resolution = extractor(&server, fast_settings(1)).resolve("app-1").await;

    assert_eq!(targets(resolution), vec!["h:9249", "w1:9250", "w2:9250"]);
}

#[tokio::test]
async fn test_missing_flink_version_is_not_ready() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "h", &[]);
    mount_yarn_app(&server, &app).await;
    Mock::given(method("GET"))
        .and(path(app.proxy_path("overview")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskmanagers": 0})))
        .mount(&server)
        .await;

    let resolution = extractor(&server, fast_settings(2)).resolve("app-1").await;

    assert!(matches!(
        resolution,
        Resolution::Unresolved(UnresolvedReason::RetriesExhausted { .. })
    ));
}

#[tokio::test]
async fn test_reporter_appearing_between_attempts() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "h", &["w1"]);
    mount_yarn_app(&server, &app).await;
    mount_flink(&server, &app).await;

    // 最初の試行では TaskManager の Reporter がまだ起動していない
    Mock::given(method("GET"))
        .and(path(app.proxy_path(&format!(
            "taskmanagers/{}/log",
            app.workers[0].0
        ))))
        .respond_with(ResponseTemplate::new(200).set_body_string("INFO starting\n"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    let resolution = extractor(&server, fast_settings(3)).resolve("app-1").await;

    assert_eq!(targets(resolution), vec!["h:9249", "w1:9250"]);
}

#[tokio::test]
async fn test_no_reporter_policies() {
    let server = MockServer::start().await;
    let mut app = FlinkApp::new("app-1", "h", &["w1"]);
    app.workers[0].1 = "INFO  org.apache.flink.runtime.metrics.ReporterSetup - No metrics reporter configured, no metrics will be exposed/reported.".to_string();
    mount_running(&server, &app).await;

    let exclude = extractor(&server, fast_settings(2)).resolve("app-1").await;
    assert_eq!(targets(exclude), vec!["h:9249"]);

    let mut settings = fast_settings(5);
    settings.no_reporter_policy = NoReporterPolicy::Block;
    let block = extractor(&server, settings).resolve("app-1").await;
    assert!(matches!(
        block,
        Resolution::Unresolved(UnresolvedReason::Blocked(_))
    ));
}

#[tokio::test]
async fn test_partial_policies() {
    let server = MockServer::start().await;
    let mut app = FlinkApp::new("app-1", "h", &["w1", "w2"]);
    app.workers[1].1 = "INFO still starting".to_string();
    mount_running(&server, &app).await;

    let require_all = extractor(&server, fast_settings(2)).resolve("app-1").await;
    assert_eq!(
        require_all,
        Resolution::Unresolved(UnresolvedReason::RetriesExhausted { attempts: 2 })
    );

    let mut settings = fast_settings(2);
    settings.partial_policy = PartialPolicy::AllowPartial;
    let allow_partial = extractor(&server, settings).resolve("app-1").await;
    assert_eq!(targets(allow_partial), vec!["h:9249", "w1:9250"]);
}

#[tokio::test]
async fn test_finished_application_is_blocked() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "h", &["w1"]);
    let mut body = app.yarn_json(&server);
    body["state"] = json!("FINISHED");
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps/app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "app": body })))
        .mount(&server)
        .await;

    let resolution = extractor(&server, fast_settings(5)).resolve("app-1").await;

    assert!(matches!(
        resolution,
        Resolution::Unresolved(UnresolvedReason::Blocked(_))
    ));
}
