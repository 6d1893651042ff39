use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid page filename {0:?}")]
    InvalidFilename(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PageError {
    pub fn status_code(&self) -> u16 {
        match self {
            PageError::Validation(_) => 400,
            PageError::NotFound(_) => 404,
            PageError::AlreadyExists(_) => 409,
            PageError::InvalidFilename(_) | PageError::Store(_) | PageError::Io(_) => 500,
        }
    }

    /// Message safe to hand back to a client. Internal failures are not described.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[test]
fn test_status_codes() {
    assert_eq!(400, PageError::Validation("Missing pageIndex parameter".into()).status_code());
    assert_eq!(404, PageError::NotFound("Page does not exist".into()).status_code());
    assert_eq!(500, PageError::InvalidFilename("../x".into()).status_code());
    let e = PageError::from(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
    assert_eq!(500, e.status_code());
    assert_eq!("Internal server error", e.public_message());
    assert_eq!("Page does not exist", PageError::NotFound("Page does not exist".into()).public_message());
}
