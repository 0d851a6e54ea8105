use crate::bytecode::decode_hex;
use bytes::Bytes;
use mismatch::Mismatch;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("file not found: {0}")]
    NotFound(Url),
    #[error("request to {url} failed with status {status}")]
    Http { url: Url, status: StatusCode },
    #[error("couldn't fetch the file: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cannot parse release manifest {url}: {source}")]
    Manifest {
        url: Url,
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("invalid build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("hashsum of fetched file mismatch: {0}")]
    HashMismatch(#[from] Mismatch<String>),
    #[error("can't parse hashsum: {0}")]
    HashParse(String),
    #[error("invalid artifact filename: {0:?}")]
    InvalidFilename(String),
    #[error("couldn't create file: {0}")]
    File(#[from] std::io::Error),
    #[error("cannot unpack archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("tokio sheduling error: {0}")]
    Schedule(#[from] tokio::task::JoinError),
}

/// Downloads the whole body of `url`.
///
/// 404 is reported as [`FetchError::NotFound`] so callers can tell a missing
/// file from a broken network.
#[instrument(skip(client), level = "debug")]
pub async fn fetch_bytes(client: &reqwest::Client, url: &Url) -> Result<Bytes, FetchError> {
    let response = client.get(url.clone()).send().await?;
    match response.status() {
        StatusCode::NOT_FOUND => Err(FetchError::NotFound(url.clone())),
        status if !status.is_success() => Err(FetchError::Http {
            url: url.clone(),
            status,
        }),
        _ => Ok(response.bytes().await?),
    }
}

#[instrument(skip(bytes), level = "debug")]
pub fn validate_checksum(bytes: &[u8], expected: &str) -> Result<(), FetchError> {
    let expected =
        decode_hex(expected).map_err(|err| FetchError::HashParse(format!("{expected}: {err}")))?;
    let found = Sha256::digest(bytes);
    if expected.as_slice() != found.as_slice() {
        return Err(Mismatch::new(hex::encode(expected), hex::encode(found)).into());
    }
    Ok(())
}
