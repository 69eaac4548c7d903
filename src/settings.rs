use crate::error::AppError;
use crate::model::AppSettings;
use crate::redate::validate_template;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.json";

pub fn settings_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE_NAME)
}

/// Load saved defaults. A missing file is not an error; it yields the
/// stock configuration.
pub fn load_settings(config_dir: &Path) -> Result<AppSettings, AppError> {
    let path = settings_file_path(config_dir);
    if !path.exists() {
        return Ok(AppSettings::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| AppError::Settings(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| AppError::Settings(e.to_string()))
}

pub fn save_settings(config_dir: &Path, settings: &AppSettings) -> Result<(), AppError> {
    validate_settings(settings)?;
    let path = settings_file_path(config_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::Settings(e.to_string()))?;
    }
    let body =
        serde_json::to_string_pretty(settings).map_err(|e| AppError::Settings(e.to_string()))?;
    fs::write(path, body).map_err(|e| AppError::Settings(e.to_string()))
}

fn validate_settings(settings: &AppSettings) -> Result<(), AppError> {
    settings
        .adjustment
        .validate()
        .map_err(AppError::Settings)?;
    if settings.apply_rename && !settings.rename_template.trim().is_empty() {
        validate_template(&settings.rename_template).map_err(|error| match error {
            AppError::InvalidRequest(message) => AppError::Settings(message),
            other => other,
        })?;
    }
    Ok(())
}
