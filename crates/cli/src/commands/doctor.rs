//! `sentinel doctor`: diagnose configuration and provider access.

use super::Context;

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    println!("Sentinel Doctor: System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = ctx.config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file at {}; using defaults (run `sentinel onboard`)", config_path.display());
        issues += 1;
    }

    let config = match ctx.load_config() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e:#}");
            println!("\n  ⚠️  Fix the config file and re-run doctor.");
            return Ok(());
        }
    };

    println!(
        "  •  Model: {} (speech: {}, voice: {})",
        config.model.default_model, config.model.tts_model, config.model.voice
    );
    println!(
        "  •  Farm: {:.4}, {:.4}",
        config.farm.latitude, config.farm.longitude
    );

    match sentinel_providers::build_from_config(&config) {
        Ok(provider) => {
            println!("  ✅ API key configured");
            match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(false) => {
                    println!("  ⚠️  Provider '{}' did not answer the health check", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match ctx.engine(&config) {
        Ok(engine) => println!(
            "  ✅ {} flows and {} tools registered",
            engine.flow_names().len(),
            engine.tools().len()
        ),
        Err(e) => {
            println!("  ❌ Flow registration failed: {e:#}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
