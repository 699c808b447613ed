mod cli;
mod interactive;

use clap::Parser;
use cli::{Args, CliHandler, QueryOptions};
use interactive::InteractiveMode;
use querydeck::ActionKind;
use std::error::Error;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("QUERYDECK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let args = Args::parse();
    let handler = CliHandler::new()?;

    if args.config {
        return handler.show_config();
    }

    let options = QueryOptions::from_args(&args)?;
    let text = args.text.join(" ");

    if args.interactive || (text.trim().is_empty() && !args.speak) {
        return InteractiveMode::new(handler, options).start().await;
    }

    if args.speak {
        handler.speak_text(&text, &options).await
    } else {
        handler
            .translate_text(&text, &options, ActionKind::InvokeQuery)
            .await
    }
}
