//! Transport boundary: request/response shapes and the `{status, message, data}`
//! envelope. No HTTP here; a transport maps routes onto `BookingApi`.

pub mod dto;
pub mod envelope;
pub mod handlers;
