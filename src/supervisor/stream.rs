//! Output stream draining.

use std::fmt;
use std::io::ErrorKind;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::launcher::BoxedReader;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamSource::Stdout => "stdout",
            StreamSource::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read `reader` to EOF, forwarding every chunk to the log as it arrives.
///
/// Bytes are kept raw and decoded once at the end so multi-byte characters
/// split across chunk boundaries survive. A read error or `stop` ends the
/// stream with whatever was collected up to that point.
pub async fn drain(mut reader: BoxedReader, source: StreamSource, stop: CancellationToken) -> Vec<u8> {
    let mut collected = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            read = reader.read(&mut chunk) => read,
            _ = stop.cancelled() => {
                debug!(stream = %source, bytes = collected.len(), "stream still open; stopped draining");
                break;
            }
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                collected.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&chunk[..n]);
                info!(stream = %source, "{}", text.trim_end());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = %source, error = %e, "failed reading child output");
                break;
            }
        }
    }
    collected
}

pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
