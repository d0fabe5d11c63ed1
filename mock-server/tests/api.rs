use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_token, Page, Settings, Tag, Widget};
use serde_json::Value;
use tower::{Service, ServiceExt};

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

async fn send(
    app: &mut axum::routing::RouterIntoService<String>,
    request: Request<String>,
) -> axum::response::Response {
    ServiceExt::ready(app).await.unwrap().call(request).await.unwrap()
}

// --- list ---

#[tokio::test]
async fn list_widgets_empty_envelope() {
    let resp = app().oneshot(get("/widgets/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page: Page<Widget> = body_json(resp).await;
    assert_eq!(page.count, 0);
    assert!(page.next.is_none());
    assert!(page.previous.is_none());
    assert!(page.results.is_empty());
}

#[tokio::test]
async fn list_widgets_links_to_next_page() {
    let mut app = app().into_service();
    for name in ["a", "b", "c"] {
        let body = format!(r#"{{"name":"{name}"}}"#);
        let resp = send(&mut app, json_request("POST", "/widgets/", &body)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let request = Request::builder()
        .uri("/widgets/?page_size=2")
        .header(http::header::HOST, "api.test:8000")
        .body(String::new())
        .unwrap();
    let page: Page<Widget> = body_json(send(&mut app, request).await).await;
    assert_eq!(page.count, 3);
    assert_eq!(page.results.len(), 2);
    assert_eq!(
        page.next.as_deref(),
        Some("http://api.test:8000/widgets/?page=2&page_size=2")
    );

    let page: Page<Widget> = body_json(send(&mut app, get("/widgets/?page=2&page_size=2")).await).await;
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].name, "c");
    assert!(page.next.is_none());
}

#[tokio::test]
async fn list_widgets_filters_by_status() {
    let mut app = app().into_service();
    send(&mut app, json_request("POST", "/widgets/", r#"{"name":"a","status":"active"}"#)).await;
    send(&mut app, json_request("POST", "/widgets/", r#"{"name":"b"}"#)).await;

    let page: Page<Widget> = body_json(send(&mut app, get("/widgets/?status=active")).await).await;
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].name, "a");
}

#[tokio::test]
async fn head_reports_total_count() {
    let mut app = app().into_service();
    send(&mut app, json_request("POST", "/widgets/", r#"{"name":"a"}"#)).await;

    let request = Request::builder()
        .method("HEAD")
        .uri("/widgets/")
        .body(String::new())
        .unwrap();
    let resp = send(&mut app, request).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-total-count"], "1");
    assert!(body_bytes(resp).await.is_empty());
}

// --- create ---

#[tokio::test]
async fn create_widget_returns_201() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/widgets/",
            r#"{"name":"Sprocket","parts":[{"sku":"S-1","quantity":4}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let widget: Widget = body_json(resp).await;
    assert_eq!(widget.name, "Sprocket");
    assert_eq!(widget.status, "draft");
    assert!(widget.note.is_none());
    assert_eq!(widget.parts[0].quantity, 4);
}

#[tokio::test]
async fn create_widget_invalid_status_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/widgets/", r#"{"name":"x","status":"lost"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert_eq!(body["status"][0], "\"lost\" is not a valid choice.");
}

#[tokio::test]
async fn create_widget_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/widgets/", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_widget_not_found() {
    let resp = app()
        .oneshot(get("/widgets/00000000-0000-0000-0000-000000000000/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Not found.");
}

#[tokio::test]
async fn get_widget_bad_uuid_returns_400() {
    let resp = app().oneshot(get("/widgets/not-a-uuid/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- update / delete ---

#[tokio::test]
async fn update_widget_not_found() {
    let resp = app()
        .oneshot(json_request(
            "PATCH",
            "/widgets/00000000-0000-0000-0000-000000000000/",
            r#"{"name":"Nope"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_widget_not_found() {
    let request = Request::builder()
        .method("DELETE")
        .uri("/widgets/00000000-0000-0000-0000-000000000000/")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- tags / settings ---

#[tokio::test]
async fn tags_are_a_bare_array() {
    let resp = app().oneshot(get("/tags/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let tags: Vec<Tag> = body_json(resp).await;
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].slug, "metal");
}

#[tokio::test]
async fn settings_update_in_place() {
    let mut app = app().into_service();

    let before: Settings = body_json(send(&mut app, get("/settings/")).await).await;
    assert!(!before.maintenance);

    let resp = send(&mut app, json_request("POST", "/settings/", r#"{"maintenance":true}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Settings = body_json(resp).await;
    assert!(updated.maintenance);
    assert_eq!(updated.site_name, before.site_name);

    let after: Settings = body_json(send(&mut app, get("/settings/")).await).await;
    assert_eq!(after, updated);
}

#[tokio::test]
async fn settings_reject_unknown_field() {
    let resp = app()
        .oneshot(json_request("POST", "/settings/", r#"{"theme":"dark"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- auth ---

#[tokio::test]
async fn missing_token_returns_401() {
    let resp = app_with_token(Some("s3cret".to_string()))
        .oneshot(get("/tags/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Invalid token.");
}

#[tokio::test]
async fn valid_token_is_accepted() {
    let request = Request::builder()
        .uri("/tags/")
        .header(http::header::AUTHORIZATION, "Token s3cret")
        .body(String::new())
        .unwrap();
    let resp = app_with_token(Some("s3cret".to_string()))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    let mut app = app().into_service();

    // create
    let resp = send(
        &mut app,
        json_request("POST", "/widgets/", r#"{"name":"Gear","note":"fragile"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Widget = body_json(resp).await;
    let id = created.id;

    // get
    let resp = send(&mut app, get(&format!("/widgets/{id}/"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Widget = body_json(resp).await;
    assert_eq!(fetched, created);

    // patch: absent keys untouched
    let resp = send(
        &mut app,
        json_request("PATCH", &format!("/widgets/{id}/"), r#"{"status":"active"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Widget = body_json(resp).await;
    assert_eq!(updated.status, "active");
    assert_eq!(updated.note.as_deref(), Some("fragile"));

    // patch: explicit null clears
    let resp = send(
        &mut app,
        json_request("PATCH", &format!("/widgets/{id}/"), r#"{"note":null}"#),
    )
    .await;
    let updated: Widget = body_json(resp).await;
    assert!(updated.note.is_none());
    assert_eq!(updated.name, "Gear");

    // invalid choice leaves the widget unchanged
    let resp = send(
        &mut app,
        json_request("PATCH", &format!("/widgets/{id}/"), r#"{"name":"X","status":"lost"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let fetched: Widget = body_json(send(&mut app, get(&format!("/widgets/{id}/"))).await).await;
    assert_eq!(fetched.name, "Gear");

    // delete
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/widgets/{id}/"))
        .body(String::new())
        .unwrap();
    let resp = send(&mut app, request).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // gone
    let resp = send(&mut app, get(&format!("/widgets/{id}/"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let page: Page<Widget> = body_json(send(&mut app, get("/widgets/")).await).await;
    assert_eq!(page.count, 0);
}
