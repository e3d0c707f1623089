//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured host (names like `localhost` included)
//! - Bind a non-blocking std listener ready to be handed to the runtime

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Host did not resolve to any address.
    Resolve(String, std::io::Error),
    /// Failed to bind to address.
    Bind(SocketAddr, std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Resolve(host, e) => write!(f, "Failed to resolve {}: {}", host, e),
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Resolve(_, e) | ListenerError::Bind(_, e) => Some(e),
        }
    }
}

/// Bind `host:port`, trying every resolved address until one succeeds.
pub fn bind(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| ListenerError::Resolve(host.to_string(), e))?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr) {
            Ok(listener) => {
                listener
                    .set_nonblocking(true)
                    .map_err(|e| ListenerError::Bind(addr, e))?;

                tracing::debug!(address = %addr, "Listener bound");
                return Ok(listener);
            }
            Err(e) => last_error = Some(ListenerError::Bind(addr, e)),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ListenerError::Resolve(
            host.to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn reports_taken_port() {
        let first = bind("127.0.0.1", 0).unwrap();
        let port = first.local_addr().unwrap().port();

        let err = bind("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, ListenerError::Bind(_, _)));
        assert!(err.to_string().starts_with("Failed to bind"));
    }
}
