use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::command::server::error::Error;

pub mod insecure;
pub mod tls;

async fn build_listener(binding_address: SocketAddr) -> Result<TcpListener, Error> {
    match TcpListener::bind(binding_address).await {
        Ok(listener) => Ok(listener),
        Err(err) => {
            let msg = format!("Failed to bind to {binding_address}: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), Error> {
    match listener.accept().await {
        Ok((stream, remote_address)) => {
            debug!("Accepted connection from {remote_address}");
            Ok((stream, remote_address))
        }
        Err(err) => {
            let msg = format!("Failed to accept incoming connection: {err}");
            Err(Error::Execution(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn test_build_listener_with_port_zero() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = build_listener(addr).await.unwrap();

        let local_addr = listener.local_addr().unwrap();
        assert_eq!(local_addr.ip(), addr.ip());
        assert_ne!(local_addr.port(), 0);
    }

    #[tokio::test]
    async fn test_build_listener_port_in_use() {
        let listener = build_listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let actual_addr = listener.local_addr().unwrap();

        match build_listener(actual_addr).await {
            Err(Error::Initialization(msg)) => assert!(msg.contains("Failed to bind to")),
            _ => panic!("Expected Initialization error"),
        }
    }

    #[tokio::test]
    async fn test_accept_with_connection() {
        let listener = build_listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let local_addr = listener.local_addr().unwrap();

        let connect_handle = tokio::spawn(async move {
            let mut stream = TcpStream::connect(local_addr).await.unwrap();
            stream.write_all(b"test").await.unwrap();
        });

        let (_, remote_addr) = accept(&listener).await.unwrap();
        assert!(remote_addr.port() > 0);

        connect_handle.await.unwrap();
    }
}
