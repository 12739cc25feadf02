// Server-sent events line buffer
//
// Vendors deliver SSE over arbitrary byte chunk boundaries. Bytes are
// accumulated until a newline arrives, then `data:` payloads are handed out.

use crate::error::ProviderError;

/// Marker OpenAI-compatible APIs send as the final data payload
pub const DONE_MARKER: &str = "[DONE]";

/// Error for a body that closed before the vendor's end-of-stream event
pub fn truncated(provider: &str) -> ProviderError {
    ProviderError::Network {
        provider: provider.to_string(),
        message: "stream ended before the completion marker".into(),
    }
}

#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the network
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete `data:` payload, skipping `event:`, comments and blank lines
    pub fn next_data(&mut self) -> Option<String> {
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(data) = line.strip_prefix("data:") {
                return Some(data.trim().to_string());
            }
        }
        None
    }
}
