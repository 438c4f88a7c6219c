//! Log Service
//!
//! Persisted pod log reads and live log tails, plus the UTF-8 chunker used
//! wherever raw log bytes are turned into text.

use sqlx::PgPool;

use crate::cluster::{ClusterApi, ClusterError, LogStream};
use crate::repository::log_repository;

/// Get the harvested log of a pod, if any
pub async fn get_persisted_log(pool: &PgPool, pod_name: &str) -> Result<Option<String>, sqlx::Error> {
    log_repository::find_by_pod(pool, pod_name).await
}

/// Follow a pod's log while it is running
pub async fn tail(cluster: &dyn ClusterApi, pod_name: &str) -> Result<LogStream, ClusterError> {
    tracing::debug!(pod = pod_name, "Opening live log tail");
    cluster.stream_pod_logs(pod_name, true).await
}

/// Decodes a byte stream into text chunks without splitting multi-byte
/// characters across chunk boundaries.
///
/// Incomplete trailing sequences are carried into the next push; invalid
/// sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning all text that is complete so far
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix decodes
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush whatever is left; a dangling partial sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}
