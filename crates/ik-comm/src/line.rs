//! Terminator-delimited reads over byte streams

use std::io::Read;
use std::time::Duration;

use tracing::trace;

use crate::error::CommError;

/// Read one message from a byte stream
///
/// With `size = None`, bytes are consumed one at a time until `terminator`
/// has been seen; the terminator is not part of the result. With
/// `Some(n)`, at most `n` bytes are read. Stream timeouts become
/// [`CommError::Timeout`] carrying `timeout`.
pub fn read_message<R: Read + ?Sized>(
    reader: &mut R,
    terminator: &str,
    size: Option<usize>,
    timeout: Duration,
) -> Result<String, CommError> {
    let term = terminator.as_bytes();
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        if let Some(limit) = size {
            if buf.len() >= limit {
                break;
            }
        }
        match reader.read(&mut byte) {
            Ok(0) => {
                if buf.is_empty() {
                    return Err(CommError::Closed);
                }
                break;
            }
            Ok(_) => buf.push(byte[0]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CommError::from_io(e, timeout)),
        }
        if size.is_none() && !term.is_empty() && buf.ends_with(term) {
            buf.truncate(buf.len() - term.len());
            break;
        }
    }

    let msg = String::from_utf8_lossy(&buf).into_owned();
    trace!("<< {:?}", msg);
    Ok(msg)
}
