use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::authentication::ConnectionInfo;
use crate::command::server::client_verifier::RequestClientCertificate;
use crate::command::server::error::Error;
use crate::command::server::listeners::{accept, build_listener};
use crate::command::server::{serve_request, ServerContext};
use crate::configuration::{ServerConfig, ServerTlsConfig};

pub struct TlsListener {
    binding_address: SocketAddr,
    tls_acceptor: TlsAcceptor,
    context: Arc<ServerContext>,
    timeouts: Arc<[Duration; 2]>,
}

impl TlsListener {
    pub fn new(
        config: &ServerConfig,
        tls: &ServerTlsConfig,
        context: ServerContext,
    ) -> Result<Self, Error> {
        let binding_address = SocketAddr::new(config.bind_address, config.port);
        let tls_acceptor = Self::build_tls_acceptor(tls)?;
        let timeouts = [
            Duration::from_secs(config.query_timeout),
            Duration::from_secs(config.query_timeout_grace_period),
        ];

        Ok(Self {
            binding_address,
            tls_acceptor,
            context: Arc::new(context),
            timeouts: Arc::new(timeouts),
        })
    }

    fn build_tls_acceptor(tls_config: &ServerTlsConfig) -> Result<TlsAcceptor, Error> {
        debug!("Detected TLS configuration");
        let server_certs = CertificateDer::pem_file_iter(&tls_config.server_certificate_bundle)
            .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
            .map_err(|error| {
                Error::Initialization(format!(
                    "Unable to read server certificate bundle '{}': {error}",
                    tls_config.server_certificate_bundle
                ))
            })?;
        let server_key =
            PrivateKeyDer::from_pem_file(&tls_config.server_private_key).map_err(|error| {
                Error::Initialization(format!(
                    "Unable to read server private key '{}': {error}",
                    tls_config.server_private_key
                ))
            })?;

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = rustls::ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|error| Error::Initialization(format!("Unsupported TLS versions: {error}")))?;

        let builder = if tls_config.request_client_certificate {
            debug!("Client certificates will be requested during the handshake");
            builder.with_client_cert_verifier(Arc::new(RequestClientCertificate::new(&provider)))
        } else {
            debug!("Client certificates will not be requested");
            builder.with_no_client_auth()
        };

        let server_config = builder
            .with_single_cert(server_certs, server_key)
            .map_err(|error| {
                Error::Initialization(format!("Invalid server certificate or key: {error}"))
            })?;

        Ok(TlsAcceptor::from(Arc::new(server_config)))
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {} (TLS)", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            let (tcp, remote_address) = accept(&listener).await?;

            let tls_acceptor = self.tls_acceptor.clone();
            let context = Arc::clone(&self.context);
            let timeouts = Arc::clone(&self.timeouts);

            tokio::spawn(async move {
                let tls = match tls_acceptor.accept(tcp).await {
                    Ok(tls) => tls,
                    Err(error) => {
                        warn!("TLS handshake with {remote_address} failed: {error}");
                        return;
                    }
                };

                let (_, session) = tls.get_ref();
                let peer_certificate = session
                    .peer_certificates()
                    .and_then(|certs| certs.first())
                    .map(|cert| cert.to_vec());

                let connection = ConnectionInfo {
                    remote_address,
                    secure: true,
                };

                Box::pin(serve_request(
                    TokioIo::new(tls),
                    context,
                    connection,
                    peer_certificate,
                    timeouts,
                ))
                .await;
            });
        }
    }
}
