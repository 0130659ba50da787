use cfo_copilot::{Copilot, CopilotConfig, Conversation, Role, SAMPLE_QUESTIONS};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let config = args
        .next()
        .map(CopilotConfig::with_data_source)
        .unwrap_or_default();
    let mut questions: Vec<String> = args.collect();
    if questions.is_empty() {
        questions = SAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect();
    }

    let copilot = Copilot::new(config);
    let mut conversation = Conversation::new();
    for question in &questions {
        conversation.ask(&copilot, question);
    }

    for message in conversation.messages() {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => "Copilot",
        };
        println!("{}: {}", speaker, message.content);
        if let Some(chart) = &message.chart {
            println!("  [chart] {}", serde_json::to_string(chart)?);
        }
        println!();
    }

    Ok(())
}
