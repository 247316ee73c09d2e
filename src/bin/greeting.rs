use finance_qa_agents::{agent::AgentCatalog, config::Settings, logging::init_tracing, repl};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = Settings::from_env()?;

    info!("Greeting agent starting");

    let catalog = AgentCatalog::from_settings(settings)?;
    let runner = catalog.greeting();

    repl::run_stdio(&runner).await?;

    info!("Greeting agent finished");
    Ok(())
}
