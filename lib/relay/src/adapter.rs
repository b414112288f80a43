//! Default adapter: sends the wire request through an [`HttpClient`].

use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use relay_core::{Adapter, Config, ErrorKind, HttpClient};

use crate::{HyperClient, Response, Result};

/// Shared transport used when neither the request nor the instance sets one.
pub fn default_client() -> Arc<dyn HttpClient> {
    static CLIENT: OnceLock<Arc<dyn HttpClient>> = OnceLock::new();
    Arc::clone(CLIENT.get_or_init(|| Arc::new(HyperClient::new())))
}

/// Sends `config.request` with `config.client`, or the shared [`HyperClient`].
///
/// The instance drives the call under the request context, so deadlines and
/// cancellation apply to any adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdapter;

impl Adapter for DefaultAdapter {
    fn call<'a>(&'a self, config: &'a mut Config) -> BoxFuture<'a, Result<Response>> {
        let request = config.request.clone();
        let client = config.client.clone().unwrap_or_else(default_client);
        Box::pin(async move {
            let request = request
                .ok_or_else(|| ErrorKind::InvalidRequest("wire request was not built".to_string()))?;
            client.execute(request).await
        })
    }
}
