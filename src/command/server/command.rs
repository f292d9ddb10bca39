use argh::FromArgs;

use super::listeners::insecure::InsecureListener;
use super::listeners::tls::TlsListener;
use super::ServerContext;
use crate::command::server::error::Error;
use crate::configuration::Configuration;

pub enum ServiceListener {
    Insecure(InsecureListener),
    Secure(TlsListener),
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "server",
    description = "Run the authenticating HTTP listener"
)]
pub struct Options {}

pub struct Command {
    listener: ServiceListener,
}

impl Command {
    pub fn new(config: &Configuration) -> Result<Command, Error> {
        let context = ServerContext::new(config)?;

        let listener = match &config.server.tls {
            Some(tls) => ServiceListener::Secure(TlsListener::new(&config.server, tls, context)?),
            None => ServiceListener::Insecure(InsecureListener::new(&config.server, context)),
        };

        Ok(Command { listener })
    }

    pub async fn run(&self) -> Result<(), Error> {
        match &self.listener {
            ServiceListener::Insecure(listener) => listener.serve().await?,
            ServiceListener::Secure(listener) => listener.serve().await?,
        }

        Ok(())
    }
}
