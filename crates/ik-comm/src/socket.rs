//! Raw TCP socket communicator

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{info, trace, warn};

use crate::error::CommError;
use crate::line::read_message;
use crate::{Address, Communicator};

/// Default read timeout for socket links
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Communicator over a plain TCP connection
///
/// Used for instruments with a bare socket interface and for
/// Ethernet-to-serial bridges.
pub struct SocketCommunicator {
    host: String,
    port: u16,
    stream: Option<BufReader<TcpStream>>,
    terminator: String,
    timeout: Duration,
}

impl SocketCommunicator {
    /// Connect to `host:port`
    pub fn open(host: &str, port: u16) -> Result<Self, CommError> {
        Self::open_with_timeout(host, port, DEFAULT_TIMEOUT)
    }

    /// Connect with an explicit read timeout (also used as connect timeout)
    pub fn open_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self, CommError> {
        let open_err = |reason: String| CommError::Open {
            address: format!("{host}:{port}"),
            reason,
        };
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| open_err(e.to_string()))?
            .next()
            .ok_or_else(|| open_err("no address resolved".to_string()))?;
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| open_err(e.to_string()))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        info!("Opened socket {}:{}", host, port);
        Ok(Self {
            host: host.to_string(),
            port,
            stream: Some(BufReader::new(stream)),
            terminator: "\n".to_string(),
            timeout,
        })
    }

    fn stream(&mut self) -> Result<&mut BufReader<TcpStream>, CommError> {
        self.stream.as_mut().ok_or(CommError::Closed)
    }
}

impl Communicator for SocketCommunicator {
    fn address(&self) -> Address {
        Address::Socket {
            host: self.host.clone(),
            port: self.port,
        }
    }

    fn terminator(&self) -> &str {
        &self.terminator
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), CommError> {
        self.stream()?.get_ref().set_read_timeout(Some(timeout))?;
        self.timeout = timeout;
        Ok(())
    }

    fn read(&mut self, size: Option<usize>) -> Result<String, CommError> {
        let terminator = self.terminator.clone();
        let timeout = self.timeout;
        read_message(self.stream()?, &terminator, size, timeout)
    }

    fn write(&mut self, msg: &str) -> Result<(), CommError> {
        trace!(">> {:?}", msg);
        let stream = self.stream()?.get_mut();
        stream.write_all(msg.as_bytes())?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.get_ref().shutdown(Shutdown::Both) {
                warn!("Error shutting down socket {}:{}: {}", self.host, self.port, e);
            }
            info!("Closed socket {}:{}", self.host, self.port);
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for SocketCommunicator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader as StdBufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_query_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = StdBufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "FIRM?\n");
            let mut out = stream;
            out.write_all(b"v2.010\n").unwrap();
        });

        let mut comm = SocketCommunicator::open("127.0.0.1", port).unwrap();
        assert_eq!(comm.query("FIRM?", None).unwrap(), "v2.010");
        server.join().unwrap();

        comm.close();
        assert!(comm.is_closed());
        assert!(matches!(comm.write("x"), Err(CommError::Closed)));
        // second close is a no-op
        comm.close();
    }

    #[test]
    fn test_random_access_not_supported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut comm = SocketCommunicator::open("127.0.0.1", port).unwrap();
        assert!(matches!(
            comm.seek(0),
            Err(CommError::NotSupported { operation: "seek" })
        ));
        assert!(matches!(
            comm.tell(),
            Err(CommError::NotSupported { operation: "tell" })
        ));
        assert!(matches!(
            comm.flush(),
            Err(CommError::NotSupported { operation: "flush" })
        ));
    }
}
