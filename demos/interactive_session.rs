//! Minimal REPL built on `Agent`: keeps growing a conversation history
//! across turns and attaches the built-in calculator tool.

use std::env;
use std::io::{self, Write};

use cloudllm::agent::Agent;
use cloudllm::backend::BackendSettings;
use cloudllm::part::ChatMessage;
use cloudllm::tools::calculator_tool;

#[tokio::main]
async fn main() {
    env_logger::init();
    cloudllm::clients::register_builtin_backends();

    let secret_key = env::var("OPENAI_API_KEY").expect("Please set the OPENAI_API_KEY environment variable!");

    let mut settings = BackendSettings::default();
    settings.api_key = Some(secret_key);
    let agent = Agent::from_model_string("openai:gpt-4.1", settings)
        .expect("registered backend")
        .with_tools(vec![calculator_tool()]);

    let mut history: Vec<ChatMessage> = vec![ChatMessage::system_text(
        "You are a helpful assistant. Use the calculator tool for any arithmetic.",
    )];

    loop {
        print!("You: ");
        io::stdout().flush().unwrap();

        let mut user_input = String::new();
        io::stdin().read_line(&mut user_input).expect("failed to read line");
        let user_input = user_input.trim();
        if user_input.is_empty() {
            continue;
        }

        match agent.send(user_input, Some(history.clone()), None).await {
            Ok(result) => {
                println!("Assistant: {}", result.output);
                history.push(ChatMessage::user_text(user_input));
                history.extend(result.messages);
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}
