use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tracing::{debug, info};

use crate::authentication::ConnectionInfo;
use crate::command::server::error::Error;
use crate::command::server::listeners::{accept, build_listener};
use crate::command::server::{serve_request, ServerContext};
use crate::configuration::ServerConfig;

pub struct InsecureListener {
    binding_address: SocketAddr,
    context: Arc<ServerContext>,
    timeouts: Arc<[Duration; 2]>,
}

impl InsecureListener {
    pub fn new(config: &ServerConfig, context: ServerContext) -> Self {
        let binding_address = SocketAddr::new(config.bind_address, config.port);

        let timeouts = [
            Duration::from_secs(config.query_timeout),
            Duration::from_secs(config.query_timeout_grace_period),
        ];

        Self {
            binding_address,
            context: Arc::new(context),
            timeouts: Arc::new(timeouts),
        }
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {} (non-TLS)", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            debug!("Waiting for incoming connection");
            let (tcp, remote_address) = accept(&listener).await?;

            let connection = ConnectionInfo {
                remote_address,
                secure: false,
            };

            tokio::spawn(Box::pin(serve_request(
                TokioIo::new(tcp),
                Arc::clone(&self.context),
                connection,
                None,
                Arc::clone(&self.timeouts),
            )));
        }
    }
}
