use finance_qa_agents::{agent::AgentCatalog, config::Settings, logging::init_tracing, repl};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = Settings::from_env()?;

    info!("Finance supervisor agent starting");

    let catalog = AgentCatalog::from_settings(settings)?;
    let runner = catalog.finance_supervisor();

    repl::run_stdio(&runner).await?;

    info!("Finance supervisor agent finished");
    Ok(())
}
