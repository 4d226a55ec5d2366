#![forbid(unsafe_code)]

mod body;
mod client;
mod error;
mod types;
mod util;

pub use client::{ClientOptions, HttpClient};
pub use error::{Error, HttpTransportErrorKind, Result};
pub use types::{HttpRequest, HttpResponse};
