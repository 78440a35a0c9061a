//! HTTP router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Trace + CORS → 2. Body limit → 3. Auth validator → 4. Audit logger

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let body_limit = core.settings().max_upload_bytes;
    let cors = cors_layer(&core.settings().allowed_origins);
    let ctx = ApiContext::new(core);

    // Protected routes: require auth, then audit.
    //
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/logout", post(endpoints::auth::logout))
        .route("/operators", post(endpoints::operators::create))
        .route(
            "/operators/me",
            get(endpoints::auth::me).put(endpoints::operators::update_me),
        )
        .route(
            "/patients",
            post(endpoints::patients::create).get(endpoints::patients::list),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .put(endpoints::patients::update)
                .delete(endpoints::patients::remove),
        )
        .route("/tests", post(endpoints::tests::create))
        .route(
            "/tests/:id",
            get(endpoints::tests::detail)
                .patch(endpoints::tests::patch)
                .delete(endpoints::tests::remove),
        )
        .route(
            "/tests/patient/:patient_id",
            get(endpoints::tests::list_for_patient),
        )
        .route("/report/download/:id", get(endpoints::reports::download))
        .route("/report/export/:id", post(endpoints::reports::export))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// CORS for the configured browser origins. No origins means no
/// cross-origin access at all.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::core_state::fixtures::test_core_state;
    use crate::db::repository::fixtures::seed_operator;
    use crate::pipeline::preprocess::fixtures::png_bytes;

    const BOUNDARY: &str = "pulmoscan-test-boundary";

    struct Harness {
        core: Arc<CoreState>,
        _tmp: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let (core, tmp) = test_core_state();
            Self { core, _tmp: tmp }
        }

        fn app(&self) -> Router {
            api_router(self.core.clone())
        }

        /// Seed an operator (password "correct horse") and log in over HTTP.
        async fn login(&self, username: &str, is_admin: bool) -> String {
            {
                let conn = self.core.open_db().unwrap();
                seed_operator(&conn, username, is_admin);
            }
            let body = serde_json::json!({"username": username, "password": "correct horse"});
            let response = self
                .app()
                .oneshot(json_request("POST", "/api/login", None, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            json["access_token"].as_str().unwrap().to_string()
        }

        async fn send(&self, req: Request<Body>) -> axum::response::Response {
            self.app().oneshot(req).await.unwrap()
        }

        async fn create_patient(&self, token: &str, phone: &str) -> String {
            let body = serde_json::json!({
                "name": "Jonas Weber",
                "date_of_birth": "1958-02-11",
                "gender": "Male",
                "phone": phone,
                "address": null,
                "emergency_contact": null,
                "blood_type": null,
                "allergies": null,
                "notes": null
            });
            let response = self
                .send(json_request("POST", "/api/patients", Some(token), body))
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            body_json(response).await["id"].as_str().unwrap().to_string()
        }

        async fn upload(&self, token: &str, patient_id: &str, file_name: &str) -> axum::response::Response {
            self.send(multipart_request(token, patient_id, file_name, &png_bytes(64, 48)))
                .await
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn multipart_request(token: &str, patient_id: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"patientId\"\r\n\r\n{patient_id}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/tests")
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn stored_images(core: &CoreState) -> usize {
        std::fs::read_dir(core.processor().images().root())
            .unwrap()
            .count()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let response = h.send(request("GET", "/api/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["classes"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let h = Harness::new();
        let response = h.send(request("GET", "/api/patients", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let response = h.send(request("GET", "/api/patients", Some("bogus"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_401() {
        let h = Harness::new();
        {
            let conn = h.core.open_db().unwrap();
            seed_operator(&conn, "mhansen", false);
        }
        let body = serde_json::json!({"username": "mhansen", "password": "guess"});
        let response = h.send(json_request("POST", "/api/login", None, body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn me_lists_recent_activity() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        h.create_patient(&token, "+41791234567").await;

        let response = h.send(request("GET", "/api/operators/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = body_json(response).await;
        assert_eq!(json["operator"]["username"], "mhansen");
        let actions: Vec<&str> = json["recent_activity"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap())
            .collect();
        assert!(actions.contains(&"login"));
        assert!(actions
            .iter()
            .any(|a| a.starts_with("POST ") && a.ends_with("/patients")));
    }

    #[tokio::test]
    async fn admins_create_operators_who_can_log_in() {
        let h = Harness::new();
        let admin = h.login("root", true).await;
        let body = serde_json::json!({
            "username": "tech02",
            "password": "long-enough-pw",
            "display_name": "Radiology Tech"
        });
        let response = h
            .send(json_request("POST", "/api/operators", Some(&admin), body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["username"], "tech02");
        assert_eq!(json["is_admin"], false);
        assert!(json.get("password_hash").is_none());

        let login = serde_json::json!({"username": "tech02", "password": "long-enough-pw"});
        let response = h.send(json_request("POST", "/api/login", None, login)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .send(json_request("POST", "/api/operators", Some(&admin), body))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn non_admins_cannot_create_operators() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let body = serde_json::json!({
            "username": "sneaky",
            "password": "long-enough-pw",
            "is_admin": true
        });
        let response = h
            .send(json_request("POST", "/api/operators", Some(&token), body))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"]["code"], "FORBIDDEN");

        let conn = h.core.open_db().unwrap();
        assert!(crate::db::repository::get_operator_credentials(&conn, "sneaky")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn operators_rename_themselves() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let response = h
            .send(json_request(
                "PUT",
                "/api/operators/me",
                Some(&token),
                serde_json::json!({"display_name": "Dr. Mette Hansen"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["display_name"], "Dr. Mette Hansen");

        let response = h.send(request("GET", "/api/operators/me", Some(&token))).await;
        assert_eq!(
            body_json(response).await["operator"]["display_name"],
            "Dr. Mette Hansen"
        );

        let response = h
            .send(json_request(
                "PUT",
                "/api/operators/me",
                Some(&token),
                serde_json::json!({"is_admin": true}),
            ))
            .await;
        assert!(response.status().is_client_error());
        let response = h.send(request("GET", "/api/operators/me", Some(&token))).await;
        assert_eq!(body_json(response).await["operator"]["is_admin"], false);
    }

    #[tokio::test]
    async fn upload_classifies_and_returns_201() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;

        let response = h.upload(&token, &patient_id, "chest.PNG").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["result"], "Normal");
        assert_eq!(json["patient_id"], patient_id);
        assert!((json["confidence"].as_f64().unwrap() - 0.92).abs() < 1e-6);
        assert_eq!(json["all_predictions"].as_array().unwrap().len(), 3);
        assert_eq!(json["all_predictions"][1]["label"], "Pneumonia");
        assert_eq!(stored_images(&h.core), 1);

        let test_id = json["test_id"].as_str().unwrap();
        let response = h
            .send(request("GET", &format!("/api/tests/{test_id}"), Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["top_label"], "Normal");
        assert_eq!(json["has_report"], false);
        assert!(json.get("image_path").is_none());
    }

    #[tokio::test]
    async fn unsupported_extension_is_400_and_writes_nothing() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;

        let response = h.upload(&token, &patient_id, "scan.gif").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UNSUPPORTED_FORMAT");
        assert_eq!(stored_images(&h.core), 0);
    }

    #[tokio::test]
    async fn undecodable_image_is_422() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;

        let response = h
            .send(multipart_request(&token, &patient_id, "scan.png", b"not really a png"))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "IMAGE_DECODE");
        assert_eq!(stored_images(&h.core), 0);
    }

    #[tokio::test]
    async fn other_operators_records_look_missing() {
        let h = Harness::new();
        let owner = h.login("owner", false).await;
        let other = h.login("other", false).await;
        let patient_id = h.create_patient(&owner, "+41791234567").await;
        let json = body_json(h.upload(&owner, &patient_id, "chest.png").await).await;
        let test_id = json["test_id"].as_str().unwrap().to_string();

        let foreign = h
            .send(request("GET", &format!("/api/tests/{test_id}"), Some(&other)))
            .await;
        let missing = h
            .send(request(
                "GET",
                &format!("/api/tests/{}", uuid::Uuid::new_v4()),
                Some(&other),
            ))
            .await;
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(foreign).await, body_json(missing).await);

        // Uploading against someone else's patient fails the same way.
        let response = h.upload(&other, &patient_id, "chest.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(stored_images(&h.core), 1);
    }

    #[tokio::test]
    async fn patient_list_is_scoped_but_admins_see_all() {
        let h = Harness::new();
        let a = h.login("a", false).await;
        let b = h.login("b", false).await;
        let admin = h.login("root", true).await;
        h.create_patient(&a, "+41790000001").await;
        h.create_patient(&b, "+41790000002").await;

        let json = body_json(h.send(request("GET", "/api/patients", Some(&a))).await).await;
        assert_eq!(json["total"], 1);
        let json = body_json(
            h.send(request("GET", "/api/patients?limit=1&offset=0", Some(&admin)))
                .await,
        )
        .await;
        assert_eq!(json["total"], 2);
        assert_eq!(json["patients"].as_array().unwrap().len(), 1);
        assert_eq!(json["limit"], 1);
    }

    #[tokio::test]
    async fn gender_accepts_form_casing() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let body = serde_json::json!({
            "name": "Lea Brunner",
            "date_of_birth": "1984-09-30",
            "gender": "female",
            "phone": "+41795550101"
        });
        let response = h
            .send(json_request("POST", "/api/patients", Some(&token), body))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["gender"], "Female");

        let uri = format!("/api/patients/{}", json["id"].as_str().unwrap());
        let response = h
            .send(json_request("PUT", &uri, Some(&token), serde_json::json!({"gender": "MALE"})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["gender"], "Male");
    }

    #[tokio::test]
    async fn duplicate_phone_is_409() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        h.create_patient(&token, "+41791234567").await;
        let body = serde_json::json!({
            "name": "Other Person",
            "date_of_birth": "1990-01-01",
            "gender": "Female",
            "phone": "+41791234567",
            "address": null,
            "emergency_contact": null,
            "blood_type": null,
            "allergies": null,
            "notes": null
        });
        let response = h
            .send(json_request("POST", "/api/patients", Some(&token), body))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn patient_update_and_empty_patch() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        let uri = format!("/api/patients/{patient_id}");

        let response = h
            .send(json_request("PUT", &uri, Some(&token), serde_json::json!({"notes": "COPD"})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["notes"], "COPD");

        let response = h
            .send(json_request("PUT", &uri, Some(&token), serde_json::json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn comment_patch_and_list_by_patient() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        let json = body_json(h.upload(&token, &patient_id, "chest.jpg.png").await).await;
        let test_id = json["test_id"].as_str().unwrap().to_string();

        let response = h
            .send(json_request(
                "PATCH",
                &format!("/api/tests/{test_id}"),
                Some(&token),
                serde_json::json!({"comment": "Follow up in 6 weeks"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["comment"], "Follow up in 6 weeks");
        assert_eq!(json["top_label"], "Normal");

        // Results are not client-editable.
        let response = h
            .send(json_request(
                "PATCH",
                &format!("/api/tests/{test_id}"),
                Some(&token),
                serde_json::json!({"top_label": "COVID"}),
            ))
            .await;
        assert!(response.status().is_client_error());

        let response = h
            .send(request(
                "GET",
                &format!("/api/tests/patient/{patient_id}"),
                Some(&token),
            ))
            .await;
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["comment"], "Follow up in 6 weeks");
    }

    #[tokio::test]
    async fn report_download_is_a_pdf_attachment() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        let json = body_json(h.upload(&token, &patient_id, "chest.png").await).await;
        let test_id = json["test_id"].as_str().unwrap().to_string();

        let response = h
            .send(request(
                "GET",
                &format!("/api/report/download/{test_id}"),
                Some(&token),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/pdf"
        );
        assert_eq!(
            response.headers().get("Content-Disposition").unwrap().to_str().unwrap(),
            format!("attachment; filename=report_{test_id}.pdf")
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn report_with_missing_image_is_404() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        let json = body_json(h.upload(&token, &patient_id, "chest.png").await).await;
        let test_id = json["test_id"].as_str().unwrap().to_string();

        for entry in std::fs::read_dir(h.core.processor().images().root()).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }
        let response = h
            .send(request(
                "GET",
                &format!("/api/report/download/{test_id}"),
                Some(&token),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn report_export_records_path() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        let json = body_json(h.upload(&token, &patient_id, "chest.png").await).await;
        let test_id = json["test_id"].as_str().unwrap().to_string();

        let response = h
            .send(request(
                "POST",
                &format!("/api/report/export/{test_id}"),
                Some(&token),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let path = body_json(response).await["report_path"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(path.ends_with(&format!("report_{test_id}.pdf")));
        assert!(std::path::Path::new(&path).is_file());

        let json = body_json(
            h.send(request("GET", &format!("/api/tests/{test_id}"), Some(&token)))
                .await,
        )
        .await;
        assert_eq!(json["has_report"], true);
        assert!(json.get("report_path").is_none());
        assert!(json.get("image_path").is_none());
    }

    #[tokio::test]
    async fn deleting_patient_removes_tests_and_images() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        h.upload(&token, &patient_id, "one.png").await;
        h.upload(&token, &patient_id, "two.png").await;
        assert_eq!(stored_images(&h.core), 2);

        let response = h
            .send(request("DELETE", &format!("/api/patients/{patient_id}"), Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["images_removed"], 2);
        assert_eq!(stored_images(&h.core), 0);

        let response = h
            .send(request("GET", &format!("/api/patients/{patient_id}"), Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_test_removes_its_image() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let patient_id = h.create_patient(&token, "+41791234567").await;
        let json = body_json(h.upload(&token, &patient_id, "chest.png").await).await;
        let test_id = json["test_id"].as_str().unwrap().to_string();

        let response = h
            .send(request("DELETE", &format!("/api/tests/{test_id}"), Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(stored_images(&h.core), 0);
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let response = h.send(request("POST", "/api/logout", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = h.send(request("GET", "/api/operators/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_ids_read_as_not_found() {
        let h = Harness::new();
        let token = h.login("mhansen", false).await;
        let response = h.send(request("GET", "/api/tests/not-a-uuid", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
