use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub cache_path: String,
    pub grid_width: u32,
    pub grid_height: u32,
    pub quantize_num: i32,
    pub quantize_den: i32,
    pub match_pass_percent: u32,
    pub poll_interval_ms: u64,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            cache_path: "pixel_duper_cache.json".to_string(),
            grid_width: 3,
            grid_height: 3,
            quantize_num: 1,
            quantize_den: 32,
            match_pass_percent: 90,
            poll_interval_ms: 100,
            workers: 8,
            queue_capacity: 111,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Number of agreeing grid cells a candidate needs to count as a duplicate.
    pub fn match_threshold(&self) -> usize {
        let cells = u64::from(self.grid_width) * u64::from(self.grid_height);
        (cells * u64::from(self.match_pass_percent) / 100) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::Message("grid dimensions must be non-zero".into()));
        }
        if self.quantize_den <= 0 || self.quantize_num <= 0 {
            return Err(ConfigError::Message("quantization ratio must be positive".into()));
        }
        if self.match_pass_percent == 0 || self.match_pass_percent > 100 {
            return Err(ConfigError::Message(
                "match_pass_percent must be between 1 and 100".into(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Message("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Message("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("PIXEL_DUPER").try_parsing(true))
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        let mut should_add = true;
        let result_clone = result.clone();

        for res_dir in &result_clone {
            let res_dir_path = Path::new(res_dir);

            if dir_path.starts_with(res_dir_path) {
                should_add = false;
                break;
            }

            if res_dir_path.starts_with(dir_path) {
                result.retain(|x| x != res_dir);
                break;
            }
        }

        if should_add {
            result.push(dir);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_tunables() {
        let config = AppConfig::default();
        assert_eq!((config.grid_width, config.grid_height), (3, 3));
        assert_eq!((config.quantize_num, config.quantize_den), (1, 32));
        assert_eq!(config.workers, 8);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_match_threshold_truncates() {
        let config = AppConfig::default();
        // 9 cells at 90% is 8.1, truncated to 8
        assert_eq!(config.match_threshold(), 8);

        let config = AppConfig {
            grid_width: 4,
            grid_height: 4,
            ..AppConfig::default()
        };
        assert_eq!(config.match_threshold(), 14);
    }

    #[test]
    fn test_match_threshold_large_grid_does_not_overflow() {
        let config = AppConfig {
            grid_width: 100_000,
            grid_height: 100_000,
            ..AppConfig::default()
        };
        assert_eq!(config.match_threshold(), 9_000_000_000);
    }

    #[test]
    fn test_validate_rejects_pass_percent_out_of_range() {
        for pct in [0, 101, 500] {
            let config = AppConfig {
                match_pass_percent: pct,
                ..AppConfig::default()
            };
            assert!(config.validate().is_err(), "{pct}% accepted");
        }
        let config = AppConfig {
            match_pass_percent: 100,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_grid() {
        let config = AppConfig {
            grid_width: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_overlapping_no_overlap() {
        let dirs = vec![
            "/home/user/photos".to_string(),
            "/home/user/docs".to_string(),
            "/var/data".to_string(),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 3);
        assert!(result.contains(&"/home/user/photos".to_string()));
        assert!(result.contains(&"/home/user/docs".to_string()));
        assert!(result.contains(&"/var/data".to_string()));
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            "/home/user".to_string(),
            "/home/user/photos".to_string(),
            "/var/data".to_string(),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&"/home/user".to_string()));
        assert!(result.contains(&"/var/data".to_string()));
        assert!(!result.contains(&"/home/user/photos".to_string()));
    }
}
