use chrono::{DateTime, Utc};
use clap::Parser;
use colored::Colorize;
use futures::StreamExt;
use querydeck::config::{Config, ConfigManager};
use querydeck::providers::create_provider;
use querydeck::{
    dispatch_all, ActionKind, Language, QueryModel, QueryResult, QuotaLedger, ResultView,
    ServiceHooks, ServiceId, ServiceInstance, ServiceType, UsageLedger,
};
use std::collections::HashMap;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "querydeck",
    version,
    about = "Query several translation services at once and print each result as it arrives"
)]
pub struct Args {
    /// Text to translate. Starts interactive mode when omitted
    pub text: Vec<String>,

    /// Source language name, e.g. "English" or "Auto"
    #[arg(short, long)]
    pub from: Option<String>,

    /// Target language name, e.g. "Simplified Chinese"
    #[arg(short, long)]
    pub to: Option<String>,

    /// Comma separated services to query instead of the configured list
    #[arg(short, long, value_delimiter = ',')]
    pub services: Vec<String>,

    /// Show current configuration and exit
    #[arg(short, long)]
    pub config: bool,

    /// Print final results as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Print the pronunciation URL of the text instead of translating it
    #[arg(long)]
    pub speak: bool,

    /// Start interactive mode
    #[arg(short, long)]
    pub interactive: bool,
}

/// Per-invocation overrides on top of the configuration file
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub from: Option<Language>,
    pub to: Option<Language>,
    pub services: Vec<ServiceType>,
    pub json: bool,
}

impl QueryOptions {
    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error>> {
        let parse_language = |name: &Option<String>| -> Result<Option<Language>, Box<dyn Error>> {
            match name {
                Some(name) => Language::from_name(name)
                    .map(Some)
                    .ok_or_else(|| format!("Unknown language: {}", name).into()),
                None => Ok(None),
            }
        };

        let mut services = Vec::new();
        for name in &args.services {
            let service = ServiceType::from_name(name)
                .ok_or_else(|| format!("Unknown service: {}", name))?;
            if !services.contains(&service) {
                services.push(service);
            }
        }

        Ok(Self {
            from: parse_language(&args.from)?,
            to: parse_language(&args.to)?,
            services,
            json: args.json,
        })
    }
}

pub struct CliHandler {
    config_manager: Arc<ConfigManager>,
    ledger: Arc<UsageLedger>,
}

impl CliHandler {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let config_path = ConfigManager::get_default_config_path()?;
        let config_manager = Arc::new(ConfigManager::new(config_path.to_string_lossy().as_ref())?);

        Ok(Self {
            config_manager,
            ledger: Arc::new(UsageLedger::new()),
        })
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    /// Show current configuration
    pub fn show_config(&self) -> Result<(), Box<dyn Error>> {
        self.config_manager.display_config()
    }

    /// Load the latest configuration, keeping the previous one on reload errors
    fn current_config(&self) -> Config {
        if let Err(e) = self.config_manager.check_and_reload() {
            warn!(error = %e, "config reload failed, using previous settings");
        }
        self.config_manager.get_config()
    }

    /// Create one service instance per requested provider
    fn build_services(&self, config: &Config, options: &QueryOptions) -> Vec<Arc<ServiceInstance>> {
        let requested = if options.services.is_empty() {
            &config.enabled_services
        } else {
            &options.services
        };

        self.ledger
            .set_private_api_key(ServiceType::OpenAI, config.openai.api_key.is_some());
        let quota: Arc<dyn QuotaLedger> = self.ledger.clone();

        let mut services = Vec::new();
        for service_type in requested {
            match create_provider(*service_type, config) {
                Ok(provider) => {
                    self.ledger
                        .set_free_limit(*service_type, provider.total_free_query_character_count());
                    let mut instance = ServiceInstance::new(provider, quota.clone());
                    instance.enabled_auto_query = config.auto_query_services.contains(service_type);
                    services.push(Arc::new(instance));
                }
                Err(e) => println!("{}", format!("Skipping {}: {}", service_type, e).dimmed()),
            }
        }
        services
    }

    /// Translate `text` with every selected service, printing results as they finish
    pub async fn translate_text(
        &self,
        text: &str,
        options: &QueryOptions,
        action: ActionKind,
    ) -> Result<(), Box<dyn Error>> {
        let config = self.current_config();
        let (source, target) = config.languages();
        let from = options.from.unwrap_or(source);
        let to = options.to.unwrap_or(target);

        let services = self.build_services(&config, options);
        if services.is_empty() {
            println!("No services enabled. Check the [Services] section of the config file.");
            return Ok(());
        }

        let names: HashMap<ServiceId, String> = services
            .iter()
            .map(|service| (service.id(), service.name().to_string()))
            .collect();

        let model = QueryModel::new(text, from, to).with_action(action);
        info!(from = %from, to = %to, services = services.len(), "dispatching query");
        let mut results = dispatch_all(&services, &model);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    model.stop_all();
                    println!("{}", "Query cancelled".dimmed());
                    break;
                }
                next = results.next() => {
                    let Some((id, result)) = next else {
                        break;
                    };
                    if result.is_loading && result.error.is_none() {
                        debug!(service = %id, "partial result");
                        continue;
                    }
                    let name = names.get(&id).map(|n| n.as_str()).unwrap_or("Unknown");
                    self.show_result(name, &result, &config, options.json)?;

                    if result.error.is_none() {
                        if let Some(translated) = result.translated_text() {
                            let saved = save_translation_history(
                                text,
                                &translated,
                                from,
                                to,
                                name,
                                &config,
                            );
                            if let Err(e) = saved {
                                println!("History save error: {}", e);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn show_result(
        &self,
        name: &str,
        result: &QueryResult,
        config: &Config,
        json: bool,
    ) -> Result<(), Box<dyn Error>> {
        if json {
            println!("{}", serde_json::to_string(&ResultView::from(result))?);
            return Ok(());
        }

        let prompt = format!("[{}]:", name);
        let prompt = match ConfigManager::parse_color(&config.service_prompt_color) {
            Some(color) => prompt.color(color).to_string(),
            None => prompt,
        };

        let lines = format_result(result, config.show_dictionary);
        if result.error.is_some() {
            let body = lines.join("\n");
            match ConfigManager::parse_color(&config.error_prompt_color) {
                Some(color) => println!("{} {}", prompt, body.color(color)),
                None => println!("{} {}", prompt, body),
            }
        } else {
            println!("{} {}", prompt, lines.join("\n"));
        }
        Ok(())
    }

    /// Print a pronunciation URL for `text` from the first service that offers one
    pub async fn speak_text(
        &self,
        text: &str,
        options: &QueryOptions,
    ) -> Result<(), Box<dyn Error>> {
        if text.trim().is_empty() {
            eprintln!("Error: Empty text provided");
            eprintln!("Usage: querydeck --speak \"text to speak\"");
            return Ok(());
        }

        let config = self.current_config();
        let (source, _) = config.languages();
        let from = options.from.unwrap_or(source);

        let mut last_error = None;
        for service in self.build_services(&config, options) {
            let language = if from.is_auto() {
                match service.detect(text).await {
                    Ok(language) => language,
                    Err(e) => {
                        debug!(
                            service = %service.id(),
                            error = %e,
                            "detect failed, speaking as English"
                        );
                        Language::English
                    }
                }
            } else {
                from
            };

            match service.text_to_audio(text, language).await {
                Ok(url) => {
                    println!("{}", url);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(Box::new(e)),
            None => {
                println!("No services enabled.");
                Ok(())
            }
        }
    }
}

/// Render a final result as display lines without colors
pub fn format_result(result: &QueryResult, show_dictionary: bool) -> Vec<String> {
    if let Some(error) = &result.error {
        let mut lines = vec![format!("Error: {}", error)];
        if let Some(url) = &error.prompt_url {
            lines.push(format!("  Set up: {}", url));
        }
        return lines;
    }

    let mut lines = Vec::new();
    if let Some(segments) = result.segments() {
        lines.extend(segments);
    }

    if show_dictionary {
        if let Some(word) = &result.dictionary_entry {
            for phonetic in &word.phonetics {
                lines.push(format!("  [{}] /{}/", phonetic.name, phonetic.value));
            }
            for part in &word.parts {
                lines.push(format!("  {}: {}", part.part, part.means.join(", ")));
            }
            for exchange in &word.exchanges {
                lines.push(format!("  {}: {}", exchange.name, exchange.words.join(", ")));
            }
            if !word.simple_words.is_empty() {
                lines.push(format!("  see also: {}", word.simple_words.join(", ")));
            }
        }
    }

    if lines.is_empty() {
        lines.push("(no result)".to_string());
    }
    lines
}

fn history_entry(
    timestamp: DateTime<Utc>,
    original: &str,
    translated: &str,
    from: Language,
    to: Language,
    service: &str,
) -> String {
    format!(
        "[{}] {} -> {} ({})\nIN:  {}\nOUT: {}\n---\n\n",
        timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        from,
        to,
        service,
        original,
        translated
    )
}

/// Save translation history to file
fn save_translation_history(
    original: &str,
    translated: &str,
    from: Language,
    to: Language,
    service: &str,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    if !config.save_translation_history {
        return Ok(());
    }

    let entry = history_entry(Utc::now(), original, translated, from, to, service);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.history_file)?;

    file.write_all(entry.as_bytes())?;
    file.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use querydeck::result::{PartOfSpeech, Phonetic, WordResult};
    use querydeck::QueryError;

    #[test]
    fn test_format_translation_with_dictionary() {
        let mut result = QueryResult::for_query(
            ServiceType::Google,
            "good",
            Language::English,
            Language::SimplifiedChinese,
        );
        result.set_segments(Some(vec!["好".to_string()]));
        result.dictionary_entry = Some(WordResult {
            phonetics: vec![Phonetic {
                name: "us".to_string(),
                value: "ɡo͝od".to_string(),
                speak_url: None,
            }],
            parts: vec![PartOfSpeech {
                part: "adjective".to_string(),
                means: vec!["好".to_string(), "良好".to_string()],
            }],
            ..WordResult::default()
        });

        let lines = format_result(&result, true);
        assert_eq!(lines, vec!["好", "  [us] /ɡo͝od/", "  adjective: 好, 良好"]);
        assert_eq!(format_result(&result, false), vec!["好"]);
    }

    #[test]
    fn test_format_error_with_prompt() {
        let url = url::Url::parse("https://example.com/keys").ok();
        let result = QueryResult::new(ServiceType::OpenAI)
            .with_error(QueryError::api("Free quota used up").prompt(url));
        let lines = format_result(&result, true);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Error: "));
        assert_eq!(lines[1], "  Set up: https://example.com/keys");
    }

    #[test]
    fn test_history_entry_format() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let entry = history_entry(
            timestamp,
            "hello",
            "Hallo",
            Language::English,
            Language::German,
            "Google Translate",
        );
        assert_eq!(
            entry,
            "[2024-03-01 12:30:00 UTC] English -> German (Google Translate)\nIN:  hello\nOUT: Hallo\n---\n\n"
        );
    }

    #[test]
    fn test_options_from_args() {
        let args = Args::parse_from([
            "querydeck",
            "--from",
            "english",
            "-s",
            "google,openai,google",
            "hi",
        ]);
        let options = QueryOptions::from_args(&args).unwrap();
        assert_eq!(options.from, Some(Language::English));
        assert_eq!(options.to, None);
        assert_eq!(options.services, vec![ServiceType::Google, ServiceType::OpenAI]);

        let bad = Args::parse_from(["querydeck", "--to", "klingon", "hi"]);
        assert!(QueryOptions::from_args(&bad).is_err());
    }
}
