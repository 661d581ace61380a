//! Template engine and response marshaling tests.

mod common;

use http::StatusCode;
use serde_json::{json, Value};
use starling::orm::ModelInstance;
use starling::plugins::{OrmPlugin, Plugin};
use starling::response::{Response, ResponseContent};
use starling::template::{JinjaTemplateEngine, TemplateConfig, TemplateEngine};
use starling::FrameworkError;
use std::fs;
use std::sync::Arc;

#[test]
fn test_template_not_found_carries_exact_name() {
    let dir = tempfile::tempdir().unwrap();
    let engine = JinjaTemplateEngine::new(vec![dir.path().to_path_buf()]);
    let err = engine.get_template("missing/page.html").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    match err {
        FrameworkError::TemplateNotFound { template_name } => {
            assert_eq!(template_name, "missing/page.html")
        }
        other => panic!("expected TemplateNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_template_response_from_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("hello.html"),
        "<h1>Hello {{ user }}</h1>",
    )
    .unwrap();
    let engine = TemplateConfig::new(dir.path()).to_engine().unwrap();

    let response = Response::marshal(
        ResponseContent::Template {
            name: "hello.html".into(),
            context: json!({"user": "<admin>"}),
        },
        StatusCode::OK,
        &[],
        Some(engine.as_ref()),
    )
    .await
    .unwrap();
    assert_eq!(
        String::from_utf8(response.body.clone()).unwrap(),
        "<h1>Hello &lt;admin&gt;</h1>"
    );
    let http = response.into_http();
    assert_eq!(http.headers()["content-type"], "text/html; charset=utf-8");
}

#[tokio::test]
async fn test_missing_template_in_response() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TemplateConfig::new(dir.path()).to_engine().unwrap();
    let err = Response::marshal(
        ResponseContent::Template {
            name: "gone.html".into(),
            context: Value::Null,
        },
        StatusCode::OK,
        &[],
        Some(engine.as_ref()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.detail(), "Template gone.html not found.");
}

#[tokio::test]
async fn test_model_responses_use_plugin() {
    let m = common::models();
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(OrmPlugin::new(m.registry.clone()))];

    let mut reds = ModelInstance::new(&m.team);
    reds.set("id", json!(1)).unwrap();
    reds.set("name", json!("Reds")).unwrap();
    let mut blues = ModelInstance::new(&m.team);
    blues.set("id", json!(2)).unwrap();
    blues.set("name", json!("Blues")).unwrap();

    let response = Response::marshal(
        ResponseContent::Models(vec![reds.clone(), blues]),
        StatusCode::OK,
        &plugins,
        None,
    )
    .await
    .unwrap();
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(
        body,
        json!([{"id": 1, "name": "Reds"}, {"id": 2, "name": "Blues"}])
    );

    let err = Response::marshal(ResponseContent::Model(reds), StatusCode::OK, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FrameworkError::ImproperlyConfigured { .. }));
}

#[tokio::test]
async fn test_no_content() {
    let response = Response::marshal(ResponseContent::Empty, StatusCode::NO_CONTENT, &[], None)
        .await
        .unwrap();
    assert!(response.body.is_empty());
}
