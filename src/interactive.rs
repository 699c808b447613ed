use crate::cli::{CliHandler, QueryOptions};
use querydeck::ActionKind;
use std::error::Error;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Commands understood by the prompt, everything else is translated
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Skip,
    Help,
    Config,
    Clear,
    Quit,
    Translate(&'a str),
}

fn parse_command(input: &str) -> Command<'_> {
    let text = input.trim();
    match text {
        "" => Command::Skip,
        "/help" | "/?" => Command::Help,
        "/config" => Command::Config,
        "/clear" | "/cls" => Command::Clear,
        "/quit" | "/exit" | "/q" => Command::Quit,
        _ => Command::Translate(text),
    }
}

pub struct InteractiveMode {
    handler: CliHandler,
    options: QueryOptions,
}

impl InteractiveMode {
    pub fn new(handler: CliHandler, options: QueryOptions) -> Self {
        Self { handler, options }
    }

    /// Read lines until /quit, end of input or Ctrl-C at the prompt
    pub async fn start(&self) -> Result<(), Box<dyn Error>> {
        println!("=== Querydeck v{} ===", env!("CARGO_PKG_VERSION"));
        println!("Type text to translate, or /help for commands");
        println!();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let config = self.handler.config_manager().get_config();
            let (source, target) = config.languages();
            print!(
                "[{} -> {}]: ",
                self.options.from.unwrap_or(source),
                self.options.to.unwrap_or(target)
            );
            std::io::stdout().flush()?;

            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    None
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                println!("Goodbye!");
                break;
            };

            match parse_command(&line) {
                Command::Skip => continue,
                Command::Help => Self::show_help(),
                Command::Config => {
                    if let Err(e) = self.handler.show_config() {
                        println!("Config error: {}", e);
                    }
                }
                Command::Clear => {
                    print!("\x1B[2J\x1B[1;1H");
                    std::io::stdout().flush()?;
                }
                Command::Quit => {
                    println!("Goodbye!");
                    break;
                }
                Command::Translate(text) => {
                    if let Err(e) = self
                        .handler
                        .translate_text(text, &self.options, ActionKind::InputQuery)
                        .await
                    {
                        println!("Translation error: {}", e);
                    }
                    println!();
                }
            }
        }

        Ok(())
    }

    fn show_help() {
        println!();
        println!("=== Interactive Mode Help ===");
        println!();
        println!("Type text and press Enter to query every enabled service.");
        println!("Results are printed as each service finishes.");
        println!("Press Ctrl-C while a query runs to stop it.");
        println!();
        println!("Commands:");
        println!("  /help, /?             - Show this help");
        println!("  /config               - Show current configuration");
        println!("  /clear, /cls          - Clear screen");
        println!("  /quit, /exit, /q      - Exit program");
        println!();
        println!("Configuration changes take effect on the next query.");
        println!("=============================");
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("   "), Command::Skip);
        assert_eq!(parse_command("/help\n"), Command::Help);
        assert_eq!(parse_command("/config"), Command::Config);
        assert_eq!(parse_command("/q"), Command::Quit);
        assert_eq!(parse_command("  good morning \n"), Command::Translate("good morning"));
        // Unknown slash commands are plain text
        assert_eq!(parse_command("/usr/bin"), Command::Translate("/usr/bin"));
    }
}
