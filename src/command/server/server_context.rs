use hyper::http::request;
use hyper::Response;
use tracing::instrument;

use crate::authentication::{AuthenticationPipeline, Ticket};
use crate::command::server::error::Error;
use crate::command::server::response_body::ResponseBody;
use crate::configuration::Configuration;

pub struct ServerContext {
    pipeline: AuthenticationPipeline,
}

impl ServerContext {
    pub fn new(config: &Configuration) -> Result<Self, Error> {
        let cache = config.cache.to_backend();
        let pipeline = config.auth.build_pipeline(&cache)?;

        Ok(Self::with_pipeline(pipeline))
    }

    pub fn with_pipeline(pipeline: AuthenticationPipeline) -> Self {
        Self { pipeline }
    }

    #[instrument(skip(self, parts))]
    pub async fn authenticate(&self, parts: &mut request::Parts) -> Result<Option<Ticket>, Error> {
        Ok(self.pipeline.authenticate(parts).await?)
    }

    pub fn challenge(&self, parts: &request::Parts) -> Result<Response<ResponseBody>, Error> {
        let (mut response, ()) = Response::new(()).into_parts();
        self.pipeline.challenge(parts, &mut response)?;
        Ok(Response::from_parts(response, ResponseBody::empty()))
    }
}
