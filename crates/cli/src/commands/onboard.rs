//! `sentinel onboard`: first-time setup.

use super::Context;
use sentinel_config::AppConfig;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let config_path = ctx.config_path();

    println!("Sentinel: First-Time Setup");
    println!("==========================\n");

    if let Some(dir) = config_path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Add api_key to {} (or export GEMINI_API_KEY)", config_path.display());
    println!("   2. Set [farm] latitude/longitude to your farm");
    println!("   3. Run: sentinel doctor\n");

    Ok(())
}
