//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\altscript\
//!   macOS:   ~/Library/Application Support/altscript/
//!   Linux:   ~/.config/altscript/
//!
//! Data dir (transcription store):
//!   Windows: %LOCALAPPDATA%\altscript\
//!   macOS:   ~/Library/Application Support/altscript/
//!   Linux:   ~/.local/share/altscript/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for the transcription store.
    pub data_dir: PathBuf,
    /// Full path to `transcriptions.json`.
    pub store_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "altscript";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let store_file = data_dir.join("transcriptions.json");

        Self {
            config_dir,
            settings_file,
            data_dir,
            store_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
