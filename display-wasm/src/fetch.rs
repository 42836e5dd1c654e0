use async_trait::async_trait;
use display_rpc::embed::{FetchError, HttpResponse, OEmbedClient};
use url::Url;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::dom::WebHost;

fn transport_error(error: JsValue) -> FetchError {
    FetchError::Transport(format!("{error:?}"))
}

#[async_trait(?Send)]
impl OEmbedClient for WebHost {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        let window =
            web_sys::window().ok_or_else(|| FetchError::Transport("no window".to_string()))?;

        let response = JsFuture::from(window.fetch_with_str(url.as_str()))
            .await
            .map_err(transport_error)?;
        let response: Response = response.dyn_into().map_err(transport_error)?;

        let body = JsFuture::from(response.text().map_err(transport_error)?)
            .await
            .map_err(transport_error)?;

        Ok(HttpResponse {
            status: response.status(),
            body: body.as_string().unwrap_or_default(),
        })
    }
}
