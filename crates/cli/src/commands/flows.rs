//! `sentinel flows`: list registered flows and tools.

use super::Context;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;

    println!("Flows:");
    for flow in engine.flows() {
        let fields = flow.input_schema["properties"]
            .as_object()
            .map(|props| props.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        println!("  {:<26} {}", flow.name, flow.description);
        println!("  {:<26} input: {{{fields}}}", "");
    }

    println!("\nTools:");
    for tool in engine.tools().all_definitions() {
        println!("  {:<26} {}", tool.name, tool.description);
    }

    Ok(())
}
