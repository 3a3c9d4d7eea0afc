use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATUS_OK: u16 = 200;

/// Response envelope shared by every endpoint. `status == 200` is business
/// success; anything else is a business failure described by `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
}

/// A non-200 envelope, surfaced to the client as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("business error {status}: {message}")]
pub struct BusinessError {
    pub status: u16,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: STATUS_OK,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// 200 unwraps `data`; any other status becomes a `BusinessError`.
    ///
    /// A 200 without data only makes sense for unit payloads, so it is
    /// reported as a malformed response rather than silently accepted.
    pub fn into_result(self) -> Result<T, BusinessError> {
        match (self.status, self.data) {
            (STATUS_OK, Some(data)) => Ok(data),
            (STATUS_OK, None) => Err(BusinessError {
                status: STATUS_OK,
                message: "success response carried no data".to_string(),
            }),
            (status, _) => Err(BusinessError {
                status,
                message: self.message,
            }),
        }
    }
}
