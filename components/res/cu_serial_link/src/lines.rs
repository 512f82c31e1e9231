/// Longest unterminated run kept before it is handed out as a line.
pub const MAX_LINE: usize = 1024;

/// Reassembles newline-terminated text from arbitrarily chunked reads.
///
/// The firmware prints status lines at its own pace; a single read may hold
/// half a line or several. Carriage returns are stripped. A device that
/// never sends a newline gets its output cut every `max_line` bytes.
#[derive(Debug)]
pub struct LineAssembler {
    pending: Vec<u8>,
    max_line: usize,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE)
    }
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line: max_line.max(1),
        }
    }

    /// Append raw bytes and return every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            lines.push(text(&raw[..raw.len() - 1]));
        }
        while self.pending.len() >= self.max_line {
            let raw: Vec<u8> = self.pending.drain(..self.max_line).collect();
            lines.push(text(&raw));
        }
        lines
    }

    /// Bytes received after the last newline.
    pub fn partial(&self) -> &[u8] {
        &self.pending
    }
}

fn text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end_matches('\r').to_string()
}
