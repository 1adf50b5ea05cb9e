use anyhow::Result;
use segue_discover::{Clients, Config};

/// Ask the generative backend for a trivial reply.
pub async fn run_health(config: &Config) -> Result<()> {
    let clients = Clients::from_config(config)?;
    let engine = clients.engine()?;

    if engine.health_check().await {
        println!("✓ {} is answering", config.gemini_model);
        Ok(())
    } else {
        anyhow::bail!("{} did not answer the health check", config.gemini_model)
    }
}
