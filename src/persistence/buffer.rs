use std::io::{self, Write};

/// Fixed-capacity serialization target.
///
/// A write that does not fit is refused whole and flagged, so a serializer
/// fails with an error instead of leaving a truncated document behind.
pub struct BoundedBuffer {
    data: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl BoundedBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Write for BoundedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.data.len() + buf.len() > self.capacity {
            self.overflowed = true;
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "serialization buffer full",
            ));
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_overflow() {
        let mut buf = BoundedBuffer::with_capacity(4);
        buf.write_all(b"abc").unwrap();
        assert!(buf.write_all(b"de").is_err());
        assert!(buf.overflowed());
        assert_eq!(buf.into_inner(), b"abc");
    }

    #[test]
    fn json_overflow_is_an_error() {
        let mut buf = BoundedBuffer::with_capacity(8);
        let result = serde_json::to_writer(&mut buf, &vec!["a long string"; 4]);
        assert!(result.is_err());
        assert!(buf.overflowed());
    }
}
