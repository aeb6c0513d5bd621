//! Configuration validation rules

use crate::config::error::ConfigError;
use crate::config::settings::{
    CacheConfig, FileSettings, LoggerSettings, ServiceSettings, Settings,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ServiceSettings {
    /// # Validation Rules
    /// - Name and identity field must not be empty
    /// - `page_size` must be between 1 and `max_page_size`
    /// - `max_limit`, when set, must be greater than 0
    /// - Field lists must not contain empty paths
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(
                "service.name",
                "Service name is required; it prefixes every action name.",
            ));
        }

        if self.id_field.trim().is_empty() {
            return Err(ConfigError::validation(
                "service.id_field",
                "Identity field name cannot be empty.",
            ));
        }

        if self.max_page_size == 0 {
            return Err(ConfigError::validation(
                "service.max_page_size",
                "Max page size must be greater than 0.",
            ));
        }

        if self.page_size == 0 || self.page_size > self.max_page_size {
            return Err(ConfigError::validation(
                "service.page_size",
                format!(
                    "Page size ({}) must be between 1 and max_page_size ({}).",
                    self.page_size, self.max_page_size
                ),
            ));
        }

        if self.max_limit == Some(0) {
            return Err(ConfigError::validation(
                "service.max_limit",
                "Max limit must be greater than 0; omit it for no limit.",
            ));
        }

        let field_lists = [
            ("service.fields", self.fields.as_deref().unwrap_or_default()),
            ("service.exclude_fields", self.exclude_fields.as_slice()),
        ];
        for (field, paths) in field_lists {
            if paths.iter().any(|path| !is_valid_path(path)) {
                return Err(ConfigError::validation(
                    field,
                    "Field paths must be non-empty dotted paths such as `author.name`.",
                ));
            }
        }

        for (name, rule) in &self.populates {
            if rule.action().trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("service.populates.{}", name),
                    "Relation rule needs an action name.",
                ));
            }
        }

        Ok(())
    }
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(|segment| !segment.is_empty())
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// # Validation Rules
    /// - Every level in the directive list is one of: trace, debug, info, warn, error
    /// - Console or file output is enabled
    /// - File path and format are valid when file logging is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = self
            .level
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .map(|directive| directive.rsplit('=').next().unwrap_or(directive))
            .find(|level| !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()));

        if let Some(level) = invalid {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.memory.max_size == 0 {
            return Err(ConfigError::validation(
                "cache.memory.max_size",
                "Cache size must be greater than 0 when caching is enabled.",
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Validate every section, returning the first error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.service.validate()?;
        self.logger.validate()?;
        self.cache.validate()?;

        if self.connection.name.trim().is_empty() {
            return Err(ConfigError::validation(
                "connection.name",
                "Connection name cannot be empty.",
            ));
        }
        Ok(())
    }
}
