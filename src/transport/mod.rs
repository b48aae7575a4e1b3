//! HTTP transport shared by network backends.

mod http;

pub use http::{HttpTransport, TransportError};
