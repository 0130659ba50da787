use cfo_copilot::{Copilot, CopilotConfig};
use std::env;

/// Flags start with `--`; the first other argument is the data source.
fn parse_args(args: &[String]) -> (CopilotConfig, bool) {
    let as_json = args.iter().any(|arg| arg == "--json");
    let config = args
        .iter()
        .find(|arg| !arg.starts_with("--"))
        .map(CopilotConfig::with_data_source)
        .unwrap_or_default();
    (config, as_json)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config, as_json) = parse_args(&args);

    let report = Copilot::new(config).monthly_report()?;
    println!("{}", report.to_markdown());

    if as_json {
        println!("{}", report.to_json()?);
    }

    Ok(())
}
