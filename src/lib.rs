//! OAuth 2.0 access-token lifecycle management: cached client-credentials tokens,
//! session-backed user tokens with coalesced refresh, and a reqwest middleware that
//! attaches tokens and retries once on `401`.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod manager;
#[cfg(feature = "reqwest")] pub mod middleware;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod session;
pub mod store;
pub mod sync;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(feature = "reqwest")] pub use reqwest_middleware;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
