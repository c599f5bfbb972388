//! Fixture Query Agent - CLI Entry Point
//!
//! Starts the interactive loop that translates questions into fixture queries.

use std::io::{BufRead, Write};

use chrono::Utc;
use fixture_query_agent::agent::response::Response;
use fixture_query_agent::agent::QueryAgent;
use fixture_query_agent::config::Config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fixture_query_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.default_model);

    let agent = QueryAgent::new(config);

    println!("Type 'exit' or 'quit' to end the session.");

    let stdin = std::io::stdin();
    loop {
        print!("Ask your question: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF on stdin ends the session like an explicit exit.
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        // A failed request is reported and the loop keeps accepting input.
        match agent.translate(input, Utc::now()).await {
            Ok(Response::Success(success)) => println!("{}", success.mongo_query),
            Ok(Response::InvalidRequest(invalid)) => {
                println!("Invalid request: {}", invalid.error_message)
            }
            Err(e) => error!("Request failed: {:#}", e),
        }
    }

    Ok(())
}
