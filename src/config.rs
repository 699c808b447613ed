use crate::language::Language;
use crate::model::ServiceType;
use crate::providers::openai::{OpenAISettings, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{info, warn};

type Sections = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Clone)]
pub struct Config {
    pub source_language: String,
    pub target_language: String,
    pub enabled_services: Vec<ServiceType>,
    pub auto_query_services: Vec<ServiceType>, // Services triggered by selection/shortcut queries
    pub show_dictionary: bool,
    pub openai: OpenAISettings,
    pub save_translation_history: bool,
    pub history_file: String,
    pub service_prompt_color: String, // Color for "[Google Translate]: " prompts
    pub error_prompt_color: String,   // Color for error lines
}

impl Default for Config {
    fn default() -> Self {
        // Try to get the config directory for the history file, fallback to current directory
        let default_history = if let Some(config_dir) = dirs::config_dir() {
            let history_path = config_dir.join("Querydeck").join("query_history.txt");
            history_path.to_string_lossy().to_string()
        } else {
            "query_history.txt".to_string()
        };

        Self {
            source_language: "Auto".to_string(),
            target_language: "Simplified Chinese".to_string(),
            enabled_services: vec![ServiceType::Google, ServiceType::OpenAI],
            auto_query_services: vec![ServiceType::Google],
            show_dictionary: true,
            openai: OpenAISettings::default(),
            save_translation_history: false,
            history_file: default_history,
            service_prompt_color: "BrightYellow".to_string(),
            error_prompt_color: "BrightRed".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().to_lowercase() == "true"
}

/// Parse a comma separated service list, skipping unknown names
fn parse_services(value: &str) -> Vec<ServiceType> {
    let mut services = Vec::new();
    for name in value.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        match ServiceType::from_name(name) {
            Some(service) if !services.contains(&service) => services.push(service),
            Some(_) => {}
            None => warn!(service = name, "ignoring unknown service in configuration"),
        }
    }
    services
}

fn format_services(services: &[ServiceType]) -> String {
    services
        .iter()
        .map(|s| s.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Config {
    /// Build a configuration from parsed INI sections, falling back to defaults
    fn from_sections(sections: &Sections) -> Self {
        let defaults = Config::default();
        let get = |section: &str, key: &str| -> Option<String> {
            sections
                .get(section)
                .and_then(|values| values.get(key))
                .cloned()
        };

        let openai = OpenAISettings {
            api_key: get("OpenAI", "ApiKey").filter(|key| !key.trim().is_empty()),
            endpoint: get("OpenAI", "Endpoint")
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: get("OpenAI", "Model")
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            free_quota: get("OpenAI", "FreeQuota")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.openai.free_quota),
        };

        Self {
            source_language: get("Query", "SourceLanguage").unwrap_or(defaults.source_language),
            target_language: get("Query", "TargetLanguage").unwrap_or(defaults.target_language),
            enabled_services: get("Services", "Enabled")
                .map(|v| parse_services(&v))
                .unwrap_or(defaults.enabled_services),
            auto_query_services: get("Services", "AutoQuery")
                .map(|v| parse_services(&v))
                .unwrap_or(defaults.auto_query_services),
            show_dictionary: get("Query", "ShowDictionary")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.show_dictionary),
            openai,
            save_translation_history: get("History", "SaveHistory")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.save_translation_history),
            history_file: get("History", "HistoryFile").unwrap_or(defaults.history_file),
            service_prompt_color: get("Colors", "ServicePromptColor")
                .unwrap_or(defaults.service_prompt_color),
            error_prompt_color: get("Colors", "ErrorPromptColor")
                .unwrap_or(defaults.error_prompt_color),
        }
    }

    /// Resolve configured language names, treating unknown names as Auto / default target
    pub fn languages(&self) -> (Language, Language) {
        let source = Language::from_name(&self.source_language).unwrap_or_else(|| {
            warn!(language = %self.source_language, "unknown source language, using Auto");
            Language::Auto
        });
        let target = Language::from_name(&self.target_language)
            .filter(|language| !language.is_auto())
            .unwrap_or_else(|| {
                warn!(
                    language = %self.target_language,
                    "unknown target language, using Simplified Chinese"
                );
                Language::SimplifiedChinese
            });
        (source, target)
    }
}

pub struct ConfigManager {
    config_path: String,
    config: Arc<Mutex<Config>>,
    last_modified: Arc<Mutex<Option<SystemTime>>>,
}

impl ConfigManager {
    /// Get default configuration file path in <config dir>/Querydeck
    pub fn get_default_config_path() -> Result<PathBuf, Box<dyn Error>> {
        let config_dir = dirs::config_dir()
            .ok_or("Failed to get config directory")?
            .join("Querydeck");

        // Create directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(config_dir.join("querydeck.conf"))
    }

    pub fn new(config_path: &str) -> Result<Self, Box<dyn Error>> {
        let manager = Self {
            config_path: config_path.to_string(),
            config: Arc::new(Mutex::new(Config::default())),
            last_modified: Arc::new(Mutex::new(None)),
        };

        // Load or create config file
        manager.load_or_create_config()?;

        Ok(manager)
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    /// Load configuration from file or create default if not exists
    fn load_or_create_config(&self) -> Result<(), Box<dyn Error>> {
        if Path::new(&self.config_path).exists() {
            self.load_config()?;
        } else {
            self.create_default_config()?;
        }
        Ok(())
    }

    /// Create default configuration file
    fn create_default_config(&self) -> Result<(), Box<dyn Error>> {
        let default_config = Config::default();
        let ini_content = Self::create_ini_content(&default_config);

        fs::write(&self.config_path, ini_content)?;
        info!(path = %self.config_path, "created default configuration file");

        self.update_last_modified_time()?;

        Ok(())
    }

    /// Create INI format content
    fn create_ini_content(config: &Config) -> String {
        format!(
            r#"; Querydeck Configuration File
; Every enabled service is queried at the same time and results are
; printed as soon as each service produces them.
;
; Configuration changes take effect on the next query (no restart required)

[Query]
; Source language: Auto, English, Simplified Chinese, Traditional Chinese,
; Japanese, Korean, French, Spanish, German, Russian, ...
; Use "Auto" for automatic language detection
SourceLanguage = {}

; Target language
TargetLanguage = {}

; Show dictionary entries for single words when a service provides them
ShowDictionary = {}

[Services]
; Services queried for every request, comma separated
; Supported values: google, openai
Enabled = {}

; Services also triggered by selection and shortcut queries
AutoQuery = {}

[OpenAI]
; Your own API key. Without it the service stops once the free quota is used up
ApiKey = {}

; Any OpenAI-compatible chat completions endpoint
Endpoint = {}

Model = {}

; Free characters before an API key is required
FreeQuota = {}

[Colors]
; Supported values: Black, Red, Green, Yellow, Blue, Magenta, Cyan, White,
; BrightBlack, BrightRed, BrightGreen, BrightYellow, BrightBlue, BrightMagenta, BrightCyan, BrightWhite
; Use "None" to disable color
ServicePromptColor = {}
ErrorPromptColor = {}

[History]
; Save every finished result with a timestamp
SaveHistory = {}
HistoryFile = {}
"#,
            config.source_language,
            config.target_language,
            config.show_dictionary,
            format_services(&config.enabled_services),
            format_services(&config.auto_query_services),
            config.openai.api_key.as_deref().unwrap_or(""),
            config.openai.endpoint,
            config.openai.model,
            config.openai.free_quota,
            config.service_prompt_color,
            config.error_prompt_color,
            config.save_translation_history,
            config.history_file,
        )
    }

    /// Load configuration from INI file
    fn load_config(&self) -> Result<(), Box<dyn Error>> {
        let content = fs::read_to_string(&self.config_path)?;
        let new_config = Config::from_sections(&Self::parse_ini(&content));

        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }

        self.update_last_modified_time()?;

        Ok(())
    }

    /// Parse INI format content
    fn parse_ini(content: &str) -> Sections {
        let mut sections: Sections = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header
            if line.starts_with('[') && line.ends_with(']') {
                let section_name = line[1..line.len() - 1].to_string();
                current_section = Some(section_name.clone());
                sections.entry(section_name).or_default();
            }
            // Key-value pair
            else if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim().to_string();
                let value = line[eq_pos + 1..].trim().to_string();

                if let Some(section_name) = &current_section {
                    if let Some(section) = sections.get_mut(section_name) {
                        section.insert(key, value);
                    }
                }
            }
        }

        sections
    }

    /// Get current configuration
    pub fn get_config(&self) -> Config {
        self.config
            .lock()
            .map(|config| config.clone())
            .unwrap_or_default()
    }

    /// Check if config file was modified and reload if necessary
    pub fn check_and_reload(&self) -> Result<bool, Box<dyn Error>> {
        if !Path::new(&self.config_path).exists() {
            return Ok(false);
        }

        let metadata = fs::metadata(&self.config_path)?;
        let current_modified = metadata.modified()?;

        let should_reload = match self.last_modified.lock() {
            Ok(last_modified) => match *last_modified {
                Some(last) => current_modified > last,
                None => true,
            },
            Err(_) => true,
        };

        if should_reload {
            self.load_config()?;
            info!(path = %self.config_path, "configuration reloaded");
            return Ok(true);
        }

        Ok(false)
    }

    /// Update last modified time
    fn update_last_modified_time(&self) -> Result<(), Box<dyn Error>> {
        if Path::new(&self.config_path).exists() {
            let metadata = fs::metadata(&self.config_path)?;
            let modified = metadata.modified()?;

            if let Ok(mut last_modified) = self.last_modified.lock() {
                *last_modified = Some(modified);
            }
        }
        Ok(())
    }

    /// Display current configuration
    pub fn display_config(&self) -> Result<(), Box<dyn Error>> {
        self.check_and_reload()?;
        let config = self.get_config();
        let (source, target) = config.languages();

        println!();
        println!("=== Current Configuration ===");
        println!("Source Language: {} ({})", config.source_language, source);
        println!("Target Language: {} ({})", config.target_language, target);
        println!(
            "Show Dictionary: {}",
            if config.show_dictionary { "Enabled" } else { "Disabled" }
        );
        println!();
        println!("Enabled Services: {}", format_services(&config.enabled_services));
        println!("Auto Query Services: {}", format_services(&config.auto_query_services));
        println!(
            "OpenAI: model {} at {} (API key {})",
            config.openai.model,
            config.openai.endpoint,
            if config.openai.api_key.is_some() { "set" } else { "not set" }
        );
        println!("OpenAI Free Quota: {} characters", config.openai.free_quota);
        println!();
        println!(
            "Save History: {}",
            if config.save_translation_history { "Enabled" } else { "Disabled" }
        );
        println!("History File: {}", config.history_file);
        println!();
        println!("Config file: {}", self.config_path);
        println!("============================");
        println!();

        Ok(())
    }

    /// Parse color name to colored::Color enum
    /// Returns None for "None" or empty string (no color)
    pub fn parse_color(color_name: &str) -> Option<colored::Color> {
        let color_lower = color_name.trim().to_lowercase();

        if color_lower.is_empty() || color_lower == "none" {
            return None;
        }

        match color_lower.as_str() {
            "black" => Some(colored::Color::Black),
            "red" => Some(colored::Color::Red),
            "green" => Some(colored::Color::Green),
            "yellow" => Some(colored::Color::Yellow),
            "blue" => Some(colored::Color::Blue),
            "magenta" => Some(colored::Color::Magenta),
            "cyan" => Some(colored::Color::Cyan),
            "white" => Some(colored::Color::White),
            "brightblack" | "bright_black" => Some(colored::Color::BrightBlack),
            "brightred" | "bright_red" => Some(colored::Color::BrightRed),
            "brightgreen" | "bright_green" => Some(colored::Color::BrightGreen),
            "brightyellow" | "bright_yellow" => Some(colored::Color::BrightYellow),
            "brightblue" | "bright_blue" => Some(colored::Color::BrightBlue),
            "brightmagenta" | "bright_magenta" => Some(colored::Color::BrightMagenta),
            "brightcyan" | "bright_cyan" => Some(colored::Color::BrightCyan),
            "brightwhite" | "bright_white" => Some(colored::Color::BrightWhite),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir().join(format!("querydeck-{}.conf", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_parse_sections() {
        let content = "; comment\n[Query]\nSourceLanguage = English\nTargetLanguage=German\n\n[Services]\nEnabled = openai, google, nope, google\n";
        let config = Config::from_sections(&ConfigManager::parse_ini(content));
        assert_eq!(config.languages(), (Language::English, Language::German));
        assert_eq!(
            config.enabled_services,
            vec![ServiceType::OpenAI, ServiceType::Google]
        );
        // Missing sections fall back to defaults
        assert_eq!(config.auto_query_services, vec![ServiceType::Google]);
        assert_eq!(config.openai.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_openai_section() {
        let content = "[OpenAI]\nApiKey = sk-test\nModel = local-model\nFreeQuota = 42\nEndpoint =\n";
        let config = Config::from_sections(&ConfigManager::parse_ini(content));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai.model, "local-model");
        assert_eq!(config.openai.free_quota, 42);
        assert_eq!(config.openai.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_unknown_languages_fall_back() {
        let config = Config {
            source_language: "Elvish".to_string(),
            target_language: "Auto".to_string(),
            ..Config::default()
        };
        assert_eq!(config.languages(), (Language::Auto, Language::SimplifiedChinese));
    }

    #[test]
    fn test_default_file_round_trip() {
        let path = temp_config_path();
        let manager = ConfigManager::new(path.to_str().unwrap()).unwrap();
        assert!(path.exists());

        let config = manager.get_config();
        let defaults = Config::default();
        assert_eq!(config.enabled_services, defaults.enabled_services);
        assert_eq!(config.target_language, defaults.target_language);
        assert!(config.openai.api_key.is_none());

        // Unchanged file is not reloaded
        assert!(!manager.check_and_reload().unwrap());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(ConfigManager::parse_color("BrightYellow"), Some(colored::Color::BrightYellow));
        assert_eq!(ConfigManager::parse_color("none"), None);
        assert_eq!(ConfigManager::parse_color("plaid"), None);
    }
}
