use std::convert::Infallible;
use std::sync::Arc;

use greetcard_core::site::{Site, LANDING_PAGE};
use warp::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType};
use warp::reply::{json, with_status};
use warp::{Filter, Rejection, Reply};

use crate::api::{self, MessageReply, UpdateRequest};

const MAX_BODY: u64 = 64 * 1024;

const HOMEPAGE_MISSING: &str = "Homepage not found. Please ensure index.html exists in the pages directory.";

pub fn routes(site: Arc<Site>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let root_dir = site.pages().root().to_path_buf();

    let update = warp::path!("api" / "update-page")
        .and(warp::post())
        .and(with_site(site.clone()))
        .and(update_body())
        .and_then(api::update_page);

    let content = warp::path!("api" / "get-content")
        .and(warp::get())
        .and(with_site(site.clone()))
        .and(warp::query::<api::ContentQuery>())
        .and_then(api::get_content);

    let all_pages = warp::path!("api" / "get-all-pages")
        .or(warp::path!("api" / "get-all-content"))
        .unify()
        .and(warp::get())
        .and(with_site(site))
        .and_then(api::get_all_pages);

    let landing = warp::path::end()
        .and(warp::get())
        .and(warp::fs::file(root_dir.join(LANDING_PAGE)))
        .map(|file: warp::fs::File| file.into_response())
        .or(warp::path::end()
            .and(warp::get())
            .map(|| with_status(HOMEPAGE_MISSING, StatusCode::NOT_FOUND).into_response()))
        .unify();

    let files = warp::get().and(warp::fs::dir(root_dir));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_header("content-type");

    update
        .or(content)
        .or(all_pages)
        .or(landing)
        .or(files)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("greetcard::http"))
}

fn with_site(site: Arc<Site>) -> impl Filter<Extract = (Arc<Site>,), Error = Infallible> + Clone {
    warp::any().map(move || site.clone())
}

/// JSON, or the urlencoded body a plain HTML form would post.
fn update_body() -> impl Filter<Extract = (UpdateRequest,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY).and(warp::body::json().or(warp::body::form()).unify())
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Malformed request body: {}", e))
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Malformed query: {}", e))
    } else if err.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported content type".to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };
    Ok(with_status(json(&MessageReply::failure(message)), status))
}

#[cfg(test)]
mod tests {
    use greetcard_core::config::SiteArgs;
    use greetcard_core::page::{Greeting, PageSummary};
    use greetcard_core::render::{render_form, render_greeting};
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use warp::test::request;

    use super::*;

    fn test_site(count: usize) -> (TempDir, Arc<Site>) {
        let dir = tempdir().unwrap();
        let args = SiteArgs { pages_dir: dir.path().join("pages"), database: dir.path().join("pages.db") };
        let site = Site::open(&args).unwrap();
        site.provision(count).unwrap();
        (dir, Arc::new(site))
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn page_file(site: &Site, index: i64) -> String {
        let page = site.all_pages().unwrap().into_iter().find(|x| x.page_index == index).unwrap();
        std::fs::read_to_string(site.pages().path_for(&page.filename).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_update_then_get_content() {
        let (_dir, site) = test_site(3);
        let filter = routes(site.clone());
        let response = request()
            .method("POST")
            .path("/api/update-page")
            .json(&json!({"pageIndex": 2, "sender": "Ann", "receiver": "Bo", "content": "Merry Christmas"}))
            .reply(&filter)
            .await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(json!({"success": true, "message": "Page content updated successfully"}), body_json(response.body()));

        let response = request().path("/api/get-content?pageIndex=2").reply(&filter).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            json!({"success": true, "content": {
                "pageIndex": 2, "sender": "Ann", "receiver": "Bo", "content": "Merry Christmas", "status": true
            }}),
            body_json(response.body())
        );
        assert_eq!(render_greeting(2, &Greeting::new("Ann", "Bo", "Merry Christmas")), page_file(&site, 2));
    }

    #[tokio::test]
    async fn test_update_from_form_post() {
        let (_dir, site) = test_site(1);
        let filter = routes(site.clone());
        let response = request()
            .method("POST")
            .path("/api/update-page")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("pageIndex=1&sender=Ann&receiver=Bo&content=hi+there&image=x.png")
            .reply(&filter)
            .await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!("hi there", site.page_content(1).unwrap().content);
    }

    #[tokio::test]
    async fn test_update_missing_fields() {
        let (_dir, site) = test_site(1);
        let filter = routes(site.clone());
        for body in [
            json!({"pageIndex": 1, "receiver": "Bo", "content": "hi"}),
            json!({"pageIndex": 1, "sender": "Ann", "receiver": "", "content": "hi"}),
            json!({"sender": "Ann", "receiver": "Bo", "content": "hi"}),
        ] {
            let response = request().method("POST").path("/api/update-page").json(&body).reply(&filter).await;
            assert_eq!(StatusCode::BAD_REQUEST, response.status());
            assert_eq!(
                json!({"success": false, "message": api::MISSING_FIELDS}),
                body_json(response.body())
            );
        }
        assert!(!site.page_content(1).unwrap().status);
        assert_eq!(render_form(1), page_file(&site, 1));
    }

    #[tokio::test]
    async fn test_update_unknown_page() {
        let (_dir, site) = test_site(2);
        let filter = routes(site.clone());
        let response = request()
            .method("POST")
            .path("/api/update-page")
            .json(&json!({"pageIndex": "9", "sender": "Ann", "receiver": "Bo", "content": "hi"}))
            .reply(&filter)
            .await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        assert_eq!(json!({"success": false, "message": "Page does not exist"}), body_json(response.body()));
        assert!(site.all_pages().unwrap().iter().all(|x| !x.status));
    }

    #[tokio::test]
    async fn test_update_malformed_body() {
        let (_dir, site) = test_site(1);
        let filter = routes(site);
        let response = request()
            .method("POST")
            .path("/api/update-page")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&filter)
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(Value::Bool(false), body_json(response.body())["success"]);
    }

    #[tokio::test]
    async fn test_get_content_errors() {
        let (_dir, site) = test_site(2);
        let filter = routes(site);

        let response = request().path("/api/get-content").reply(&filter).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(json!({"success": false, "message": "Missing pageIndex parameter"}), body_json(response.body()));

        let response = request().path("/api/get-content?pageIndex=abc").reply(&filter).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        for index in ["0", "3", "-1"] {
            let response = request().path(&format!("/api/get-content?pageIndex={}", index)).reply(&filter).await;
            assert_eq!(StatusCode::NOT_FOUND, response.status());
            assert_eq!(
                json!({"success": false, "message": "Content not found for this page index"}),
                body_json(response.body())
            );
        }

        let response = request().path("/api/get-content?pageIndex=1").reply(&filter).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(Value::Bool(false), body_json(response.body())["content"]["status"]);
    }

    #[tokio::test]
    async fn test_get_all_pages() {
        let (_dir, site) = test_site(4);
        site.update_page(3, &Greeting::new("a", "b", "c")).unwrap();
        let filter = routes(site.clone());
        for path in ["/api/get-all-pages", "/api/get-all-content"] {
            let response = request().path(path).reply(&filter).await;
            assert_eq!(StatusCode::OK, response.status());
            let body = body_json(response.body());
            assert_eq!(Value::Bool(true), body["success"]);
            let pages: Vec<PageSummary> = serde_json::from_value(body["pages"].clone()).unwrap();
            assert_eq!(site.all_pages().unwrap(), pages);
            assert_eq!(4, pages.len());
            assert_eq!(vec![false, false, true, false], pages.iter().map(|x| x.status).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_landing_page() {
        let (dir, site) = test_site(0);
        let filter = routes(site);
        let response = request().path("/").reply(&filter).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        assert_eq!(HOMEPAGE_MISSING.as_bytes(), response.body().as_ref());

        std::fs::write(dir.path().join("pages").join(LANDING_PAGE), "<h1>hello</h1>").unwrap();
        let response = request().path("/").reply(&filter).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(b"<h1>hello</h1>", response.body().as_ref());
    }

    #[tokio::test]
    async fn test_serves_page_files() {
        let (_dir, site) = test_site(2);
        let filter = routes(site.clone());
        let filename = site.all_pages().unwrap()[1].filename.clone();
        let response = request().path(&format!("/{}", filename)).reply(&filter).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(render_form(2).as_bytes(), response.body().as_ref());

        let response = request().path("/missing.html").reply(&filter).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        assert_eq!(json!({"success": false, "message": "Not found"}), body_json(response.body()));
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let (_dir, site) = test_site(1);
        let filter = routes(site);
        let response = request().method("DELETE").path("/api/get-all-pages").reply(&filter).await;
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let (_dir, site) = test_site(1);
        let filter = routes(site);
        let response = request()
            .method("OPTIONS")
            .path("/api/update-page")
            .header("origin", "https://example.com")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .reply(&filter)
            .await;
        assert_eq!(StatusCode::OK, response.status());
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
