use serde::{Deserialize, Serialize};

use crate::PageError;

pub type PageIndex = i64;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page_index: PageIndex,
    pub filename: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStatus {
    pub page_index: PageIndex,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub status: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page_index: PageIndex,
    pub filename: String,
    pub status: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

impl Greeting {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, content: impl Into<String>) -> Self {
        Greeting { sender: sender.into(), receiver: receiver.into(), content: content.into() }
    }
}

impl PageStatus {
    pub fn greeting(&self) -> Greeting {
        Greeting::new(self.sender.clone(), self.receiver.clone(), self.content.clone())
    }
}

pub fn parse_page_index(text: &str) -> Result<PageIndex, PageError> {
    text.trim()
        .parse()
        .map_err(|_| PageError::Validation(format!("Invalid pageIndex {:?}", text)))
}

#[test]
fn test_parse_page_index() {
    assert_eq!(7, parse_page_index("7").unwrap());
    assert_eq!(12, parse_page_index(" 12 ").unwrap());
    assert_eq!(0, parse_page_index("0").unwrap());
    assert!(matches!(parse_page_index("seven"), Err(PageError::Validation(_))));
    assert!(matches!(parse_page_index("1.5"), Err(PageError::Validation(_))));
}

#[test]
fn test_json_field_names() {
    let summary = PageSummary { page_index: 3, filename: "a1b2.html".into(), status: true };
    assert_eq!(
        r#"{"pageIndex":3,"filename":"a1b2.html","status":true}"#,
        serde_json::to_string(&summary).unwrap()
    );
}
