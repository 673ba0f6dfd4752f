mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, DomainBucket, Domains, Looker, Postgres, Resolver, Scoring, Service, Storage,
	default_vocabulary,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	validate_looker(cfg)?;

	if let Some(postgres) = cfg.storage.postgres.as_ref() {
		if postgres.dsn.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.postgres.dsn must be non-empty.".to_string(),
			});
		}
		if postgres.pool_max_conns == 0 {
			return Err(Error::Validation {
				message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
			});
		}
	}

	validate_cache(cfg)?;
	validate_resolver(cfg)?;
	validate_scoring(cfg)?;
	validate_domains(cfg)?;

	for (term, synonyms) in &cfg.vocabulary {
		if term.trim().is_empty() {
			return Err(Error::Validation {
				message: "vocabulary keys must be non-empty.".to_string(),
			});
		}
		if synonyms.iter().any(|synonym| synonym.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!("vocabulary.{term} must not contain empty synonyms."),
			});
		}
	}

	Ok(())
}

fn validate_looker(cfg: &Config) -> Result<()> {
	let looker = &cfg.looker;

	for (label, value) in [
		("looker.base_url", &looker.base_url),
		("looker.client_id", &looker.client_id),
		("looker.client_secret", &looker.client_secret),
		("looker.api_version", &looker.api_version),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if !(looker.base_url.starts_with("https://") || looker.base_url.starts_with("http://")) {
		return Err(Error::Validation {
			message: "looker.base_url must start with http:// or https://.".to_string(),
		});
	}
	if looker.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "looker.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if looker.page_size == 0 {
		return Err(Error::Validation {
			message: "looker.page_size must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_cache(cfg: &Config) -> Result<()> {
	let cache = &cfg.cache;

	if cache.ttl_hours <= 0 {
		return Err(Error::Validation {
			message: "cache.ttl_hours must be greater than zero.".to_string(),
		});
	}
	if cache.interactive_budget == 0 {
		return Err(Error::Validation {
			message: "cache.interactive_budget must be greater than zero.".to_string(),
		});
	}
	if cache.interactive_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "cache.interactive_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cache.schedule_interval_hours == 0 {
		return Err(Error::Validation {
			message: "cache.schedule_interval_hours must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_resolver(cfg: &Config) -> Result<()> {
	let resolver = &cfg.resolver;

	if resolver.max_candidates == 0 {
		return Err(Error::Validation {
			message: "resolver.max_candidates must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("resolver.high_threshold", resolver.high_threshold),
		("resolver.medium_threshold", resolver.medium_threshold),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=100.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0-100."),
			});
		}
	}

	if resolver.medium_threshold > resolver.high_threshold {
		return Err(Error::Validation {
			message: "resolver.medium_threshold must be less than or equal to resolver.high_threshold."
				.to_string(),
		});
	}

	for pattern in &resolver.dashboard_intent_patterns {
		if let Err(err) = regex::Regex::new(pattern) {
			return Err(Error::Validation {
				message: format!(
					"resolver.dashboard_intent_patterns contains an invalid pattern {pattern:?}: {err}."
				),
			});
		}
	}

	if resolver.exact_name_markers.iter().any(|marker| marker.trim().is_empty()) {
		return Err(Error::Validation {
			message: "resolver.exact_name_markers must not contain empty markers.".to_string(),
		});
	}

	Ok(())
}

fn validate_scoring(cfg: &Config) -> Result<()> {
	let scoring = &cfg.scoring;

	for (label, value) in [
		("scoring.exact_name", scoring.exact_name),
		("scoring.name_token", scoring.name_token),
		("scoring.measure_name", scoring.measure_name),
		("scoring.dimension_name", scoring.dimension_name),
		("scoring.field_label", scoring.field_label),
		("scoring.tag", scoring.tag),
		("scoring.explore_name", scoring.explore_name),
		("scoring.description", scoring.description),
		("scoring.field_description", scoring.field_description),
		("scoring.temporal_compound", scoring.temporal_compound),
		("scoring.title_token", scoring.title_token),
		("scoring.dashboard_description", scoring.dashboard_description),
		("scoring.domain_boost", scoring.domain_boost),
		("scoring.exclusive_penalty", scoring.exclusive_penalty),
		("scoring.folder_boost", scoring.folder_boost),
		("scoring.folder_boost_with_description", scoring.folder_boost_with_description),
		("scoring.coverage_bonus", scoring.coverage_bonus),
		("scoring.fuzzy_ceiling", scoring.fuzzy_ceiling),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	for (label, value) in [
		("scoring.mapped_explore_weight", scoring.mapped_explore_weight),
		("scoring.fuzzy_token_similarity", scoring.fuzzy_token_similarity),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if scoring.fuzzy_ceiling >= scoring.exact_name {
		return Err(Error::Validation {
			message: "scoring.fuzzy_ceiling must be less than scoring.exact_name.".to_string(),
		});
	}

	Ok(())
}

fn validate_domains(cfg: &Config) -> Result<()> {
	let mut names = HashSet::new();

	for bucket in &cfg.domains.buckets {
		if bucket.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "domains.buckets.name must be non-empty.".to_string(),
			});
		}
		if !names.insert(bucket.name.as_str()) {
			return Err(Error::Validation {
				message: format!("domains.buckets contains duplicate bucket {}.", bucket.name),
			});
		}
		if bucket.keywords.is_empty() {
			return Err(Error::Validation {
				message: format!("domains.buckets.{} must have at least one keyword.", bucket.name),
			});
		}
	}

	for [left, right] in &cfg.domains.exclusive {
		for name in [left, right] {
			if !names.contains(name.as_str()) {
				return Err(Error::Validation {
					message: format!("domains.exclusive references unknown bucket {name}."),
				});
			}
		}

		if left == right {
			return Err(Error::Validation {
				message: format!("domains.exclusive pairs bucket {left} with itself."),
			});
		}
	}

	if cfg.domains.temporal_terms.iter().any(|term| term.split_whitespace().count() < 2) {
		return Err(Error::Validation {
			message: "domains.temporal_terms must be phrases of two or more words.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	while cfg.looker.base_url.ends_with('/') {
		cfg.looker.base_url.pop();
	}

	cfg.resolver.extra_stopwords = cfg
		.resolver
		.extra_stopwords
		.iter()
		.map(|word| word.trim().to_lowercase())
		.filter(|word| !word.is_empty())
		.collect();
	cfg.resolver.exact_name_markers =
		cfg.resolver.exact_name_markers.iter().map(|marker| marker.trim().to_lowercase()).collect();
	cfg.domains.temporal_terms =
		cfg.domains.temporal_terms.iter().map(|term| term.trim().to_lowercase()).collect();

	for bucket in &mut cfg.domains.buckets {
		bucket.keywords = bucket
			.keywords
			.iter()
			.map(|keyword| keyword.trim().to_lowercase())
			.filter(|keyword| !keyword.is_empty())
			.collect();
	}
}
