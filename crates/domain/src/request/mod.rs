//! Outgoing API request types

mod api_request;
mod method;

pub use api_request::{ApiRequest, AuthMode, AUTHORIZATION_HEADER};
pub use method::HttpMethod;
