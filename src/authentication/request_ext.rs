use std::net::SocketAddr;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::{AsHeaderName, AUTHORIZATION};
use hyper::http::request::Parts;

use crate::authentication::certificate::PeerCertificate;
use crate::authentication::ConnectionInfo;

static BASIC_PREFIX: &str = "Basic ";

pub trait HeaderExt {
    fn get_header<K: AsHeaderName>(&self, header: K) -> Option<String>;
    fn basic_auth(&self) -> Option<(String, String)>;
    fn peer_certificate(&self) -> Option<&PeerCertificate>;
    fn remote_address(&self) -> Option<SocketAddr>;
    fn is_secure(&self) -> bool;
}

impl HeaderExt for Parts {
    fn get_header<K>(&self, header: K) -> Option<String>
    where
        K: AsHeaderName,
    {
        self.headers
            .get(header)
            .and_then(|header| header.to_str().ok())
            .map(ToString::to_string)
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        let authorization = self.get_header(AUTHORIZATION)?;

        let value = authorization.strip_prefix(BASIC_PREFIX)?;
        let value = BASE64_STANDARD.decode(value.trim()).ok()?;
        let value = String::from_utf8(value).ok()?;

        let (username, password) = value.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }

    fn peer_certificate(&self) -> Option<&PeerCertificate> {
        self.extensions.get::<PeerCertificate>()
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.extensions
            .get::<ConnectionInfo>()
            .map(|info| info.remote_address)
    }

    /// Only the listener decides; the request line is client controlled.
    fn is_secure(&self) -> bool {
        self.extensions
            .get::<ConnectionInfo>()
            .is_some_and(|info| info.secure)
    }
}
