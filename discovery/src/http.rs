//! Shared HTTP helpers.
//!
//! One `reqwest::Client` serves both the ResourceManager and every JobManager.
//! Log bodies are exposed as a line stream so a scan can stop before the body ends.
//! Log requests are bounded per read instead of by the client-wide timeout, so a
//! long log is not cut off while it is still arriving.

use std::io;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::error::{SdError, SdResult};

/// Line-oriented log body
pub type LogLines = BoxStream<'static, io::Result<String>>;

/// Upper bound for a whole log download
pub const LOG_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Build the shared client.
pub fn build_client(timeout: Duration) -> SdResult<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()?;
    Ok(client)
}

/// `GET` a JSON document.
///
/// Non-success statuses and undecodable bodies are reported separately so
/// callers can log which one happened.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> SdResult<T> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SdError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|source| SdError::Decode {
        url: url.to_string(),
        source,
    })
}

/// `GET` a text body and stream it line by line.
///
/// Invalid UTF-8 is replaced rather than ending the stream. A read that sees no
/// data for `read_timeout` yields a `TimedOut` error and ends the stream.
pub async fn get_lines(client: &Client, url: &str, read_timeout: Duration) -> SdResult<LogLines> {
    let response = client
        .get(url)
        .timeout(LOG_REQUEST_TIMEOUT.max(read_timeout))
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SdError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = Box::pin(
        response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    );
    let reader = StreamReader::new(body);

    let lines = stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let mut buf = Vec::new();
        match tokio::time::timeout(read_timeout, reader.read_until(b'\n', &mut buf)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(&['\r', '\n'][..])
                    .to_string();
                Some((Ok(line), Some(reader)))
            }
            Ok(Err(e)) => Some((Err(e), None)),
            Err(_) => Some((
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no log data within {read_timeout:?}"),
                )),
                None,
            )),
        }
    });

    Ok(lines.boxed())
}
