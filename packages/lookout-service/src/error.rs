pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Upstream unavailable: {message}")]
	UpstreamUnavailable { message: String },
	#[error("Upstream partially failed: {message}")]
	UpstreamPartial { message: String },
	#[error("Catalog cache is empty and could not be refreshed.")]
	CacheEmpty,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Config error: {message}")]
	Config { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<lookout_storage::Error> for Error {
	fn from(err: lookout_storage::Error) -> Self {
		match err {
			lookout_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			lookout_storage::Error::InvalidArgument(message) => Self::Storage { message },
		}
	}
}

impl From<lookout_providers::Error> for Error {
	fn from(err: lookout_providers::Error) -> Self {
		match err {
			lookout_providers::Error::InvalidConfig { message } => Self::Config { message },
			other => Self::UpstreamUnavailable { message: other.to_string() },
		}
	}
}

impl From<lookout_config::Error> for Error {
	fn from(err: lookout_config::Error) -> Self {
		Self::Config { message: err.to_string() }
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Storage { message: format!("Invalid stored payload: {err}") }
	}
}
