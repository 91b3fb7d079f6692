//! Configuration loader for multi-file currency tables.
//!
//! A main file may pull currencies from other files through `include`. Every
//! currency code must be defined exactly once across all files.

use crate::{Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Track loaded files to prevent circular includes
	loaded_files: HashSet<PathBuf>,
	/// Track which file defined each currency for error reporting
	currency_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a new ConfigLoader with the given base path.
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			currency_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let main_content = self.load_file(&config_path).await?;
		let mut main_toml: toml::Value = toml::from_str(&main_content)?;

		let includes = self.extract_includes(&main_toml)?;
		if includes.is_empty() {
			return main_content.parse();
		}

		if let Some(table) = main_toml.as_table_mut() {
			table.remove("include");
		}
		let mut currencies = take_currencies(&mut main_toml)?;
		for code in currencies.keys() {
			self.currency_sources
				.insert(code.clone(), config_path.clone());
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_content = self.load_file(&resolved_path).await?;
			let mut include_toml: toml::Value = toml::from_str(&include_content)?;

			for (code, section) in take_currencies(&mut include_toml)? {
				if let Some(existing_source) = self.currency_sources.get(&code) {
					return Err(ConfigError::Validation(format!(
						"Duplicate currency '{}' found in {} and {}. \
						Each currency must be defined in exactly one configuration file.",
						code,
						existing_source.display(),
						resolved_path.display()
					)));
				}
				self.currency_sources
					.insert(code.clone(), resolved_path.clone());
				currencies.insert(code, section);
			}
		}

		if let Some(table) = main_toml.as_table_mut() {
			table.insert("currencies".to_string(), toml::Value::Table(currencies));
		}

		let config_str = toml::to_string(&main_toml).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		config_str.parse()
	}

	/// Reads a file, refusing to read the same file twice.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		Ok(tokio::fs::read_to_string(path).await?)
	}

	/// Extracts include directives from the configuration.
	fn extract_includes(&self, toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		let mut includes = Vec::new();

		if let Some(include_value) = toml.get("include") {
			if let Some(include_array) = include_value.as_array() {
				for item in include_array {
					if let Some(path_str) = item.as_str() {
						includes.push(PathBuf::from(path_str));
					} else {
						return Err(ConfigError::Validation(
							"Include array must contain only strings".into(),
						));
					}
				}
			} else if let Some(path_str) = include_value.as_str() {
				includes.push(PathBuf::from(path_str));
			} else {
				return Err(ConfigError::Validation(
					"Include must be a string or array of strings".into(),
				));
			}
		}

		Ok(includes)
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// Removes and returns the `currencies` table of a parsed file.
fn take_currencies(toml: &mut toml::Value) -> Result<toml::map::Map<String, toml::Value>, ConfigError> {
	let Some(table) = toml.as_table_mut() else {
		return Ok(toml::map::Map::new());
	};

	match table.remove("currencies") {
		None => Ok(toml::map::Map::new()),
		Some(toml::Value::Table(currencies)) => Ok(currencies),
		Some(_) => Err(ConfigError::Validation(
			"'currencies' must be a table".into(),
		)),
	}
}
