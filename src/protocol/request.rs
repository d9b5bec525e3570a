use std::fmt::Display;

use super::{PACKET_DELIMITER, TOKEN_DELIMITER, escape::escape_into};

/// Growable writer for a batch frame.
///
/// Structural bytes and numbers are written raw, payload values go through
/// [`escape_into`]. Several requests can be appended one after another and the
/// whole buffer is handed to the transport as a single write.
#[derive(Debug, Default, Clone)]
pub struct RequestBuffer {
    inner: Vec<u8>,
}

impl RequestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    pub fn put_byte(&mut self, b: u8) -> &mut Self {
        self.inner.push(b);
        self
    }

    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.extend_from_slice(bytes);
        self
    }

    pub fn put_escaped(&mut self, bytes: &[u8]) -> &mut Self {
        escape_into(bytes, &mut self.inner);
        self
    }

    /// Write a decimal number (or any other unescaped token) using its `Display` form.
    pub fn put_number<N: Display>(&mut self, n: N) -> &mut Self {
        self.inner.extend_from_slice(n.to_string().as_bytes());
        self
    }

    pub fn token(&mut self) -> &mut Self {
        self.put_byte(TOKEN_DELIMITER)
    }

    /// Write `values` escaped, separated by the raw `delimiter`.
    pub fn put_list<V: AsRef<[u8]>>(&mut self, values: &[V], delimiter: u8) -> &mut Self {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.inner.push(delimiter);
            }
            escape_into(value.as_ref(), &mut self.inner);
        }
        self
    }

    pub fn end_packet(&mut self) -> &mut Self {
        self.put_byte(PACKET_DELIMITER)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_tokens_and_escaped_values() {
        let mut buf = RequestBuffer::new();
        buf.put_number(12)
            .token()
            .put_byte(b'+')
            .token()
            .put_list(&["a\tb", "c"], TOKEN_DELIMITER)
            .end_packet();

        assert_eq!(buf.as_bytes(), b"12\t+\ta\x01\x49b\tc\n");
    }

    #[test]
    fn empty_list_writes_nothing() {
        let mut buf = RequestBuffer::new();
        buf.put_list::<&str>(&[], b',');
        assert!(buf.is_empty());
    }
}
