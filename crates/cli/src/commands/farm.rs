//! Farm flow shortcuts: `weather`, `briefing`, `birds`, `pest`, `ask`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use sentinel_core::media::Media;
use sentinel_tools::{FarmDataSource, StaticFarmData};
use serde_json::{Value, json};
use tracing::info;

use super::{Context, location, run_flow};

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

pub async fn weather(ctx: &Context, lat: Option<f64>, lon: Option<f64>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;
    let out = run_flow(&engine, "weatherSummaryFlow", location(&config, lat, lon)).await?;

    println!("{}\n", text(&out["summary"]));
    println!("{:<12} {:>6} {:>6} {:>8}  Condition", "Date", "High", "Low", "Rain mm");
    for day in out["forecast"].as_array().into_iter().flatten() {
        println!(
            "{:<12} {:>6.1} {:>6.1} {:>8.1}  {}",
            text(&day["date"]).get(..10).unwrap_or(text(&day["date"])),
            day["tempHigh"].as_f64().unwrap_or_default(),
            day["tempLow"].as_f64().unwrap_or_default(),
            day["precipitation"].as_f64().unwrap_or_default(),
            text(&day["condition"]),
        );
    }
    Ok(())
}

pub async fn briefing(ctx: &Context, lat: Option<f64>, lon: Option<f64>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;
    let input = json!({ "location": location(&config, lat, lon) });
    let out = run_flow(&engine, "dailyBriefingFlow", input).await?;

    println!("🌤  Weather:       {}", text(&out["weather"]["summary"]));
    println!("🐦 Bird activity: {}", text(&out["birdActivity"]["prediction"]));
    println!("📡 System status: {}", text(&out["systemStatus"]["summary"]));
    Ok(())
}

pub async fn birds(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;

    let samples = StaticFarmData::anchored_at(chrono::Utc::now())
        .detection_frequency()
        .await?;
    let input = json!({ "detectionFrequency": samples });
    let out = run_flow(&engine, "predictBirdActivityFlow", input).await?;

    println!("Predicted activity: {}", text(&out["activityLevel"]).to_uppercase());
    println!("{}", text(&out["reasoning"]));
    Ok(())
}

pub async fn pest(ctx: &Context, image: &Path, notes: Option<String>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;

    let photo = read_photo(image)?;
    info!(mime = %photo.mime_type, bytes = photo.len(), "Photo loaded");

    let mut input = json!({ "photoDataUri": photo.to_data_uri() });
    if let Some(notes) = notes {
        input["userNotes"] = Value::String(notes);
    }
    let out = run_flow(&engine, "identifyPestFlow", input).await?;

    if out["isPest"].as_bool() == Some(true) {
        println!("🐛 {}\n", text(&out["pestName"]));
        println!("{}\n", text(&out["description"]));
        println!("Impact: {}\n", text(&out["impact"]));
        println!("Recommendations: {}", text(&out["recommendations"]));
    } else {
        println!("✅ Not a pest: {}", text(&out["pestName"]));
        println!("{}", text(&out["description"]));
    }
    Ok(())
}

pub async fn ask(
    ctx: &Context,
    question: String,
    save_audio: Option<PathBuf>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;
    let input = json!({
        "question": question,
        "location": location(&config, lat, lon),
    });
    let out = run_flow(&engine, "askFarmAssistantFlow", input).await?;

    println!("{}", text(&out["answer"]));

    if let Some(path) = save_audio {
        let audio = Media::from_data_uri(text(&out["audioDataUri"])).context("Assistant returned unusable audio")?;
        std::fs::write(&path, &audio.data).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\n🔊 Saved {} bytes of audio to {}", audio.len(), path.display());
    }
    Ok(())
}

/// Load a photo and work out its mime type from the extension.
pub fn read_photo(path: &Path) -> anyhow::Result<Media> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        other => anyhow::bail!("Unsupported photo type '.{other}': use jpg, png, webp, gif or heic"),
    };
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    anyhow::ensure!(!data.is_empty(), "{} is empty", path.display());
    Ok(Media::new(mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aphid.JPG");
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF]).unwrap();

        let photo = read_photo(&path).unwrap();
        assert_eq!(photo.mime_type, "image/jpeg");
        assert_eq!(photo.to_data_uri(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn unsupported_photo_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(read_photo(&path).is_err());
    }

    #[test]
    fn empty_photo_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        std::fs::write(&path, b"").unwrap();
        assert!(read_photo(&path).is_err());
    }
}
