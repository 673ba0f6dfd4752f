pub mod error;
pub mod looker;

pub use error::{Error, Result};
pub use looker::{
	DashboardSummary, LookerClient, LookmlExplore, LookmlField, LookmlModel, ModelExplore,
};
