//! Demonstrates streaming an `Agent` response token-by-token, printing text
//! deltas as they arrive instead of waiting for the whole turn.

use cloudllm::agent::Agent;
use cloudllm::backend::BackendSettings;
use futures_util::StreamExt;
use std::io::{self, Write};

#[tokio::main]
async fn main() {
    env_logger::init();
    cloudllm::clients::register_builtin_backends();

    println!("=== Streaming Example ===\n");

    let secret_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENAI_API_KEY environment variable not set");
            eprintln!("Please set it with: export OPENAI_API_KEY=your_api_key");
            std::process::exit(1);
        }
    };

    let mut settings = BackendSettings::default();
    settings.api_key = Some(secret_key);
    let agent = Agent::from_model_string("openai:gpt-4.1-nano", settings).expect("registered backend");

    let mut stream = Box::pin(agent.send_stream("Write a haiku about Rust programming.", None, None, None));

    print!("Assistant (streaming): ");
    io::stdout().flush().unwrap();

    let mut full_response = String::new();
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                if !event.output.is_empty() {
                    print!("{}", event.output);
                    io::stdout().flush().unwrap();
                    full_response.push_str(&event.output);
                }
                if !event.should_continue {
                    println!("\n[Finished: {:?}]", event.finish_reason);
                }
            }
            Err(e) => {
                eprintln!("\nError in stream: {e}");
                break;
            }
        }
    }

    println!("\nAccumulated response: {} chars", full_response.len());
    println!("\n=== Streaming Example Complete ===");
}
