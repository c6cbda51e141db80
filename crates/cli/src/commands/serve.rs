//! `sentinel serve`: start the HTTP gateway.

use super::Context;

pub async fn run(ctx: &Context, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = ctx.load_config()?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let engine = ctx.engine(&config)?;

    println!("Sentinel Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Flows: {}", engine.flow_names().join(", "));

    sentinel_gateway::start(&config, engine)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
