//! Sans-IO HTTP/1.1 for the host's pairing and info endpoints

pub mod codec;
pub mod headers;
pub mod request;
pub mod response;


pub use codec::{HttpCodec, HttpCodecError, decode_request};
pub use headers::Headers;
pub use request::{HttpRequest, HttpRequestBuilder, percent_decode, percent_encode};
pub use response::{HttpResponse, StatusCode};
