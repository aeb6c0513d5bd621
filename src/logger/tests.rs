//! Tests for the logger module

use std::path::PathBuf;

use crate::logger::config::*;
use crate::logger::{build_layers, open_log_file};

fn console_only() -> LoggerConfig {
    LoggerConfig {
        console: ConsoleConfig {
            enabled: true,
            colored: false,
        },
        file: FileConfig {
            enabled: false,
            path: PathBuf::from("test.log"),
            append: true,
            format: LogFormat::Full,
        },
        level: "info".to_string(),
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggerConfig::default();
        assert!(config.console.enabled);
        assert!(config.console.colored);
        assert!(!config.file.enabled);
        assert_eq!(config.file.format, LogFormat::Json);
        assert_eq!(config.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_both_outputs_disabled_fails() {
        let mut config = console_only();
        assert!(config.validate().is_ok());

        config.console.enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_directive_levels() {
        let mut config = console_only();

        config.level = "warn,fusion_db=debug".to_string();
        assert_eq!(config.parse_level().unwrap(), tracing::Level::WARN);

        config.level = "fusion_db::populate=trace".to_string();
        assert_eq!(config.parse_level().unwrap(), tracing::Level::INFO);

        config.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::Full.as_str(), "full");
        assert!("xml".parse::<LogFormat>().is_err());
    }
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn property_valid_configs_validate(
            console_enabled in any::<bool>(),
            file_enabled in any::<bool>(),
            colored in any::<bool>(),
            append in any::<bool>(),
            level_idx in 0usize..5usize,
        ) {
            prop_assume!(console_enabled || file_enabled);
            let levels = ["trace", "debug", "info", "warn", "error"];

            let config = LoggerConfig {
                console: ConsoleConfig::new(console_enabled, colored),
                file: FileConfig {
                    enabled: file_enabled,
                    path: PathBuf::from("test.log"),
                    append,
                    format: LogFormat::Compact,
                },
                level: levels[level_idx].to_string(),
            };

            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn property_invalid_levels_fail(
            invalid_level in "[a-z]{1,10}[A-Z0-9]{1,5}"
        ) {
            let mut config = LoggerConfig::default();
            config.level = invalid_level;
            prop_assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_empty_path_fails_when_enabled() {
        let config = FileConfig {
            enabled: true,
            path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(FileConfig::new(false, PathBuf::new(), true, LogFormat::Full).is_ok());
    }
}

mod file_output_tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use tracing_subscriber::layer::SubscriberExt;

    fn file_config(path: PathBuf, append: bool, format: LogFormat) -> FileConfig {
        FileConfig {
            enabled: true,
            path,
            append,
            format,
        }
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/logs/service.log");

        open_log_file(&file_config(path.clone(), true, LogFormat::Full)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_append_and_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("service.log");
        fs::write(&path, "previous\n").unwrap();

        let mut file = open_log_file(&file_config(path.clone(), true, LogFormat::Full)).unwrap();
        writeln!(file, "next").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous\nnext\n");

        let mut file = open_log_file(&file_config(path.clone(), false, LogFormat::Full)).unwrap();
        writeln!(file, "fresh").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_json_file_layer_writes_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("service.log");

        let mut config = console_only();
        config.console.enabled = false;
        config.file = file_config(path.clone(), true, LogFormat::Json);

        let layers = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 1);

        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(connection = "tenant-a", "Connection registered");
        });

        let content = fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"]["message"], "Connection registered");
        assert_eq!(line["fields"]["connection"], "tenant-a");
        assert_eq!(line["level"], "INFO");
    }

    #[test]
    fn test_both_outputs_build_two_layers() {
        let dir = tempdir().unwrap();
        let mut config = console_only();
        config.file = file_config(dir.path().join("a.log"), true, LogFormat::Full);
        assert_eq!(build_layers(&config).unwrap().len(), 2);
    }
}
