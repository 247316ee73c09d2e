use chrono::Local;
use finance_qa_agents::{
    config::Settings, logging::init_tracing, search::DuckDuckGoSearch, supervisor::Supervisor,
    yahoo::YahooFinanceClient,
};
use std::sync::Arc;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = Settings::from_env()?;

    info!("Finance Q&A supervisor starting");

    let market = Arc::new(YahooFinanceClient::from_settings(&settings)?);
    let search = Arc::new(DuckDuckGoSearch::from_settings(&settings)?);
    let supervisor = Supervisor::new(market, search);

    let mut stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    let today = Local::now().date_naive();

    let report = supervisor
        .run_interactive(&mut stdin, &mut stdout, today)
        .await?;
    stdout.flush().await?;

    match report {
        Some(report) => {
            println!("\n=== FINAL OUTPUT ===");
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("====================");
        }
        None => println!("\nSupervisor did not produce an output."),
    }

    Ok(())
}
