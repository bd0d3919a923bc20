use super::validation::validate_config;
use super::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn create_test_config(night_start: &str, night_end: &str, transition: &str) -> Config {
    Config {
        backend: Some(Backend::DryRun),
        night_temp: Some(2800),
        day_temp: Some(6500),
        night_start: Some(night_start.to_string()),
        night_end: Some(night_end.to_string()),
        transition: Some(transition.to_string()),
        invert_at_night: Some(false),
        exclude_apps: None,
    }
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    crate::common::logger::Log::set_enabled(false);
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("duskshift").join("duskshift.toml");

    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    }

    let result = Config::load();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    let config = result.unwrap();
    assert!(config_path.exists());
    assert_eq!(config.backend, Some(Backend::Auto));
    assert_eq!(config.night_temp(), DEFAULT_NIGHT_TEMP);
    assert_eq!(config.night_start(), DEFAULT_NIGHT_START);
    assert_eq!(config.transition(), DEFAULT_TRANSITION);
}

#[test]
fn test_default_config_file_round_trips() {
    crate::common::logger::Log::set_enabled(false);
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("duskshift.toml");

    create_default_config(&config_path).unwrap();
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("night_start"));
    assert!(content.contains("exclude_apps"));

    let config = load_from_path(&config_path).unwrap();
    assert_eq!(config.exclude_apps(), &[] as &[String]);
    assert_eq!(config.invert_at_night(), DEFAULT_INVERT_AT_NIGHT);
}

#[test]
fn test_config_validation_basic() {
    assert!(validate_config(&create_test_config("21:00", "07:00", "1h")).is_ok());
    assert!(validate_config(&create_test_config("21:00:30", "07:15", "90m")).is_ok());
    assert!(validate_config(&Config::default()).is_ok());
}

#[test]
fn test_config_validation_temperatures() {
    let mut config = create_test_config("21:00", "07:00", "1h");
    config.night_temp = Some(999);
    assert!(validate_config(&config).is_err());

    config.night_temp = Some(1000);
    config.day_temp = Some(10001);
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("day_temp"));

    config.day_temp = Some(10000);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_config_validation_transition_limits() {
    assert!(validate_config(&create_test_config("21:00", "07:00", "4h")).is_ok());
    assert!(validate_config(&create_test_config("21:00", "07:00", "4h1s")).is_err());
    assert!(validate_config(&create_test_config("21:00", "07:00", "0")).is_err());
    assert!(validate_config(&create_test_config("21:00", "07:00", "soon")).is_err());
}

#[test]
fn test_config_validation_overlapping_windows() {
    assert!(validate_config(&create_test_config("21:00", "21:30", "4h")).is_err());
    assert!(validate_config(&create_test_config("23:00", "01:00", "2h")).is_err());
    assert!(validate_config(&create_test_config("23:00", "01:01", "2h")).is_ok());
}

#[test]
fn test_config_validation_invalid_time_formats() {
    let err = validate_config(&create_test_config("9pm", "07:00", "1h")).unwrap_err();
    assert!(format!("{err:#}").contains("night_start"));
    assert!(validate_config(&create_test_config("21:00", "24:10", "1h")).is_err());
}

#[test]
fn test_config_validation_empty_exclusion() {
    let mut config = create_test_config("21:00", "07:00", "1h");
    config.exclude_apps = Some(vec!["mpv".into(), " ".into()]);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_toml_parsing() {
    let config_content = r#"
backend = "dry-run"
night_temp = 3300
day_temp = 6000
night_start = "22:00"
night_end = "06:30"
transition = "1h30m"
invert_at_night = true
exclude_apps = ["mpv", "steam"]
"#;

    let config: Config = toml::from_str(config_content).unwrap();
    assert_eq!(config.backend, Some(Backend::DryRun));
    assert_eq!(config.night_temp, Some(3300));
    assert_eq!(config.night_end(), "06:30");
    assert!(config.invert_at_night());
    assert_eq!(config.exclude_apps(), ["mpv".to_string(), "steam".to_string()]);
}

#[test]
fn test_config_malformed_toml() {
    let malformed_content = r#"
night_start = "21:00"
night_temp = "not_a_number"
"#;

    let result: Result<Config, _> = toml::from_str(malformed_content);
    assert!(result.is_err());
}

#[test]
fn test_unknown_backend_is_rejected() {
    let result: Result<Config, _> = toml::from_str("backend = \"hyprland\"");
    assert!(result.is_err());
}

#[test]
fn test_load_from_missing_path_fails() {
    let temp_dir = tempdir().unwrap();
    assert!(load_from_path(&temp_dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_start_options_carry_config() {
    let mut config = create_test_config("22:00", "06:00", "2h");
    config.invert_at_night = Some(true);
    config.exclude_apps = Some(vec!["mpv".into()]);

    let options = config.start_options(None);
    assert_eq!(options.night_start, "22:00");
    assert_eq!(options.transition, "2h");
    assert!(options.invert_at_night);
    assert_eq!(options.day_temp, 6500);
}
