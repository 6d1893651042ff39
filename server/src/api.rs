use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use greetcard_core::page::{parse_page_index, Greeting, PageIndex, PageStatus, PageSummary};
use greetcard_core::site::Site;
use greetcard_core::{PageError, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::{json, with_status, Json, WithStatus};

pub const MISSING_FIELDS: &str = "Missing required fields: pageIndex, sender, receiver, content";

/// Body of `POST /api/update-page`. Unknown fields such as `image` are ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub page_index: Option<IndexParam>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub content: Option<String>,
}

/// Browsers send the index as a number, form posts send it as text.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum IndexParam {
    Number(PageIndex),
    Text(String),
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    pub page_index: Option<String>,
}

#[derive(Serialize)]
pub struct MessageReply {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct ContentReply {
    pub success: bool,
    pub content: PageStatus,
}

#[derive(Serialize)]
pub struct PagesReply {
    pub success: bool,
    pub pages: Vec<PageSummary>,
}

impl MessageReply {
    pub fn failure(message: impl Into<String>) -> Self {
        MessageReply { success: false, message: message.into() }
    }
}

impl IndexParam {
    fn is_blank(&self) -> bool {
        matches!(self, IndexParam::Text(x) if x.trim().is_empty())
    }

    pub fn parse(&self) -> Result<PageIndex> {
        match self {
            IndexParam::Number(x) => Ok(*x),
            IndexParam::Text(x) => parse_page_index(x),
        }
    }
}

impl UpdateRequest {
    pub fn validate(self) -> Result<(PageIndex, Greeting)> {
        let present = |x: Option<String>| x.filter(|x| !x.is_empty());
        match (
            self.page_index.filter(|x| !x.is_blank()),
            present(self.sender),
            present(self.receiver),
            present(self.content),
        ) {
            (Some(index), Some(sender), Some(receiver), Some(content)) => {
                Ok((index.parse()?, Greeting { sender, receiver, content }))
            }
            _ => Err(PageError::Validation(MISSING_FIELDS.to_string())),
        }
    }
}

async fn run<T, F>(site: Arc<Site>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: Send + 'static + FnOnce(&Site) -> Result<T>,
{
    tokio::task::spawn_blocking(move || f(site.as_ref()))
        .await
        .map_err(|e| PageError::Io(io::Error::new(io::ErrorKind::Other, e)))?
}

fn respond<T: Serialize>(result: Result<T>) -> WithStatus<Json> {
    match result {
        Ok(body) => with_status(json(&body), StatusCode::OK),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                error!("Request failed: {}", e);
            } else {
                warn!("Request rejected: {}", e);
            }
            with_status(json(&MessageReply::failure(e.public_message())), status)
        }
    }
}

pub async fn update_page(site: Arc<Site>, request: UpdateRequest) -> std::result::Result<WithStatus<Json>, Infallible> {
    let result = match request.validate() {
        Ok((index, greeting)) => run(site, move |site| {
            site.update_page(index, &greeting).map_err(|e| match e {
                PageError::NotFound(_) => PageError::NotFound("Page does not exist".to_string()),
                e => e,
            })
        })
        .await
        .map(|_| MessageReply { success: true, message: "Page content updated successfully".to_string() }),
        Err(e) => Err(e),
    };
    Ok(respond(result))
}

pub async fn get_content(site: Arc<Site>, query: ContentQuery) -> std::result::Result<WithStatus<Json>, Infallible> {
    let index = match query.page_index.as_deref().map(str::trim).filter(|x| !x.is_empty()) {
        Some(x) => parse_page_index(x),
        None => Err(PageError::Validation("Missing pageIndex parameter".to_string())),
    };
    let result = match index {
        Ok(index) => run(site, move |site| site.page_content(index))
            .await
            .map_err(|e| match e {
                PageError::NotFound(_) => PageError::NotFound("Content not found for this page index".to_string()),
                e => e,
            })
            .map(|content| ContentReply { success: true, content }),
        Err(e) => Err(e),
    };
    Ok(respond(result))
}

pub async fn get_all_pages(site: Arc<Site>) -> std::result::Result<WithStatus<Json>, Infallible> {
    let result = run(site, |site| site.all_pages()).await.map(|pages| PagesReply { success: true, pages });
    Ok(respond(result))
}

#[test]
fn test_validate() {
    let request: UpdateRequest =
        serde_json::from_str(r#"{"pageIndex": 3, "sender": "a", "receiver": "b", "content": "c", "image": null}"#).unwrap();
    assert_eq!((3, Greeting::new("a", "b", "c")), request.validate().unwrap());

    let request: UpdateRequest =
        serde_json::from_str(r#"{"pageIndex": "4", "sender": "a", "receiver": "b", "content": "c"}"#).unwrap();
    assert_eq!(4, request.validate().unwrap().0);

    for body in [
        r#"{"sender": "a", "receiver": "b", "content": "c"}"#,
        r#"{"pageIndex": "", "sender": "a", "receiver": "b", "content": "c"}"#,
        r#"{"pageIndex": 1, "sender": "", "receiver": "b", "content": "c"}"#,
        r#"{"pageIndex": 1, "sender": "a", "content": "c"}"#,
        r#"{"pageIndex": 1, "sender": "a", "receiver": "b", "content": null}"#,
    ] {
        let request: UpdateRequest = serde_json::from_str(body).unwrap();
        match request.validate() {
            Err(PageError::Validation(message)) => assert_eq!(MISSING_FIELDS, message),
            x => panic!("{} accepted: {:?}", body, x),
        }
    }

    let request: UpdateRequest =
        serde_json::from_str(r#"{"pageIndex": "one", "sender": "a", "receiver": "b", "content": "c"}"#).unwrap();
    assert!(matches!(request.validate(), Err(PageError::Validation(_))));
}
