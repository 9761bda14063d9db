//! HTTP transport seam for token endpoint calls.
//!
//! [`TokenHttpClient`] hands out [`AsyncHttpClient`] handles that report the status code
//! and `Retry-After` hint of each response into a [`ResponseMetadataSlot`]. The token
//! endpoint client reads the slot after `oauth2` resolves so failures can be classified
//! with the HTTP context that produced them.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// HTTP stack used by the token endpoint client.
///
/// Handles must own their state so the request futures stay `Send` while the endpoint
/// boxes them.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request [`AsyncHttpClient`] bound to a metadata slot.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records response metadata in `slot`.
	///
	/// Implementations clear the slot with [`ResponseMetadataSlot::take`] before sending
	/// and call [`ResponseMetadataSlot::store`] as soon as a status line is available.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and retry hint of the last token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// `Retry-After` converted to a relative duration.
	pub retry_after: Option<Duration>,
}

/// Shared cell carrying [`ResponseMetadata`] from the transport to error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Records metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the recorded metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest-backed [`TokenHttpClient`].
///
/// Token endpoints answer directly, so custom clients passed to
/// [`ReqwestHttpClient::with_client`] should have redirect following disabled.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle { client: self.0.clone(), slot }
	}
}

/// Handle returned by [`ReqwestHttpClient`]; records metadata for every call.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct InstrumentedHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.client.clone();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers, OffsetDateTime::now_utc()),
			});

			let mut converted = HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}

	let delta = OffsetDateTime::parse(raw, &Rfc2822).ok()? - now;

	delta.is_positive().then_some(delta)
}
