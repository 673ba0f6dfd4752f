pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] lookout_config::Error),
	#[error(transparent)]
	Service(#[from] lookout_service::Error),
	#[error("{0}")]
	Incomplete(String),
}
