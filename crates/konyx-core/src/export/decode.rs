//! Lossy UTF-8 decoding of the progress byte stream.
//!
//! The SSE parser stalls for good on the first invalid byte, so chunks are
//! decoded here first. Invalid sequences become U+FFFD and the event holding
//! them fails JSON parsing instead of ending the stream. A multi-byte
//! character split across chunks is held back until its tail arrives.

#[derive(Debug, Default)]
pub(crate) struct LossyUtf8 {
    pending: Vec<u8>,
}

impl LossyUtf8 {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut offset = 0;
        while offset < self.pending.len() {
            let rest = &self.pending[offset..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    offset = self.pending.len();
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            offset += valid_up_to + invalid;
                        }
                        // incomplete sequence at the end of the chunk
                        None => {
                            offset += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..offset);
        out
    }
}
