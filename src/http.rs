use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::MycoError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub fn build_client(mut headers: HeaderMap, timeout: Duration) -> Result<Client, MycoError> {
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("mycocosm-etl/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| MycoError::InvalidConfig(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| MycoError::Http(err.to_string()))
}

pub fn send_with_retries<F>(mut make_req: F) -> Result<Response, MycoError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    tracing::debug!(status, attempt, "retrying request");
                    thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    tracing::debug!(error = %err, attempt, "retrying request");
                    thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                    attempt += 1;
                    continue;
                }
                return Err(MycoError::Http(err.to_string()));
            }
        }
    }
}

/// Reads the body as text, turning a non-success status into
/// [`MycoError::Status`].
pub fn text_or_status(response: Response) -> Result<String, MycoError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        return Err(MycoError::Status { status, message });
    }
    response
        .text()
        .map_err(|err| MycoError::Http(err.to_string()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
