use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
	Model,
	Explore,
	Dashboard,
}
impl Variant {
	/// Refresh order. Explores depend on models being present.
	pub const ALL: [Self; 3] = [Self::Model, Self::Explore, Self::Dashboard];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Model => "model",
			Self::Explore => "explore",
			Self::Dashboard => "dashboard",
		}
	}
}
impl fmt::Display for Variant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Variant {
	type Err = ParseVariantError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"model" | "models" => Ok(Self::Model),
			"explore" | "explores" => Ok(Self::Explore),
			"dashboard" | "dashboards" => Ok(Self::Dashboard),
			_ => Err(ParseVariantError(s.to_string())),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseVariantError(pub String);
impl fmt::Display for ParseVariantError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown catalog variant {:?}.", self.0)
	}
}
impl std::error::Error for ParseVariantError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
	Dimension,
	Measure,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
	pub name: String,
	pub kind: FieldKind,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}
impl Field {
	pub fn dimension(name: impl Into<String>) -> Self {
		Self { name: name.into(), kind: FieldKind::Dimension, label: None, description: None }
	}

	pub fn measure(name: impl Into<String>) -> Self {
		Self { name: name.into(), kind: FieldKind::Measure, label: None, description: None }
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());

		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());

		self
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum EntityKind {
	Model {
		#[serde(default)]
		project: Option<String>,
		#[serde(default)]
		explore_names: Vec<String>,
	},
	Explore {
		model: String,
		#[serde(default)]
		fields: Vec<Field>,
	},
	Dashboard {
		#[serde(default)]
		folder: Option<String>,
		#[serde(default)]
		view_count: u64,
	},
}
impl EntityKind {
	pub fn variant(&self) -> Variant {
		match self {
			Self::Model { .. } => Variant::Model,
			Self::Explore { .. } => Variant::Explore,
			Self::Dashboard { .. } => Variant::Dashboard,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub tags: Vec<String>,
	pub url: String,
	#[serde(with = "time::serde::rfc3339")]
	pub fetched_at: OffsetDateTime,
	pub kind: EntityKind,
}
impl CatalogEntity {
	pub fn model(name: impl Into<String>, url: impl Into<String>, fetched_at: OffsetDateTime) -> Self {
		let name = name.into();

		Self {
			id: name.clone(),
			name,
			label: None,
			description: None,
			tags: Vec::new(),
			url: url.into(),
			fetched_at,
			kind: EntityKind::Model { project: None, explore_names: Vec::new() },
		}
	}

	pub fn explore(
		model: impl Into<String>,
		name: impl Into<String>,
		url: impl Into<String>,
		fetched_at: OffsetDateTime,
	) -> Self {
		let model = model.into();
		let name = name.into();

		Self {
			id: explore_id(&model, &name),
			name,
			label: None,
			description: None,
			tags: Vec::new(),
			url: url.into(),
			fetched_at,
			kind: EntityKind::Explore { model, fields: Vec::new() },
		}
	}

	pub fn dashboard(
		id: impl Into<String>,
		title: impl Into<String>,
		url: impl Into<String>,
		fetched_at: OffsetDateTime,
	) -> Self {
		Self {
			id: id.into(),
			name: title.into(),
			label: None,
			description: None,
			tags: Vec::new(),
			url: url.into(),
			fetched_at,
			kind: EntityKind::Dashboard { folder: None, view_count: 0 },
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = non_blank(label.into());

		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = non_blank(description.into());

		self
	}

	pub fn with_tags<I, S>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tags = dedup_tags(tags.into_iter().map(Into::into));

		self
	}

	/// Sets the folder of a dashboard. Other variants are left untouched.
	pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
		if let EntityKind::Dashboard { folder: slot, .. } = &mut self.kind {
			*slot = non_blank(folder.into());
		}

		self
	}

	/// Sets the fields of an explore. Other variants are left untouched.
	pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
		if let EntityKind::Explore { fields: slot, .. } = &mut self.kind {
			*slot = fields;
		}

		self
	}

	/// Sets the explore names of a model. Other variants are left untouched.
	pub fn with_explore_names<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		if let EntityKind::Model { explore_names, .. } = &mut self.kind {
			*explore_names = names.into_iter().map(Into::into).collect();
		}

		self
	}

	pub fn variant(&self) -> Variant {
		self.kind.variant()
	}

	/// Label when present, otherwise the name.
	pub fn display_name(&self) -> &str {
		self.label.as_deref().unwrap_or(&self.name)
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref().filter(|description| !description.trim().is_empty())
	}

	pub fn folder(&self) -> Option<&str> {
		match &self.kind {
			EntityKind::Dashboard { folder, .. } => folder.as_deref(),
			_ => None,
		}
	}

	pub fn fields(&self) -> &[Field] {
		match &self.kind {
			EntityKind::Explore { fields, .. } => fields,
			_ => &[],
		}
	}

	pub fn explore_names(&self) -> &[String] {
		match &self.kind {
			EntityKind::Model { explore_names, .. } => explore_names,
			_ => &[],
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardExploreMapping {
	pub dashboard_id: String,
	pub explore_id: String,
	pub business_context: f32,
	pub usage_count: u32,
	#[serde(with = "time::serde::rfc3339")]
	pub fetched_at: OffsetDateTime,
}

pub fn explore_id(model: &str, explore: &str) -> String {
	format!("{model}.{explore}")
}

/// How much business context a dashboard carries, used to order the explores attached to it.
///
/// One point each for a title and a description, half a point for a folder, and up to two points
/// for popularity on a log10 scale of the view count.
pub fn business_context(
	title: &str,
	description: Option<&str>,
	folder: Option<&str>,
	view_count: u64,
) -> f32 {
	let mut score = 0.0;

	if !title.trim().is_empty() {
		score += 1.0;
	}
	if description.map(|description| !description.trim().is_empty()).unwrap_or(false) {
		score += 1.0;
	}
	if folder.map(|folder| !folder.trim().is_empty()).unwrap_or(false) {
		score += 0.5;
	}

	let popularity = ((view_count as f64) + 1.0).log10().min(2.0);

	score + popularity as f32
}

fn dedup_tags(tags: impl Iterator<Item = String>) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for tag in tags {
		let tag = tag.trim();

		if tag.is_empty() || out.iter().any(|existing| existing.eq_ignore_ascii_case(tag)) {
			continue;
		}

		out.push(tag.to_string());
	}

	out
}

fn non_blank(value: String) -> Option<String> {
	if value.trim().is_empty() { None } else { Some(value) }
}
