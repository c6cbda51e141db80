//! `sentinel run`: run any flow with JSON input, print the JSON output.

use std::path::PathBuf;

use anyhow::Context as _;
use serde_json::Value;

use super::{Context, print_json, run_flow};

pub async fn run(ctx: &Context, flow: &str, input: Option<String>, input_file: Option<PathBuf>) -> anyhow::Result<()> {
    let input = read_input(input, input_file)?;
    let config = ctx.load_config()?;
    let engine = ctx.engine(&config)?;

    let output = run_flow(&engine, flow, input).await?;
    print_json(&output)
}

fn read_input(input: Option<String>, input_file: Option<PathBuf>) -> anyhow::Result<Value> {
    let text = match (input, input_file) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        (None, None) => return Ok(Value::Object(Default::default())),
    };
    serde_json::from_str(&text).context("Flow input is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn inline_input() {
        let value = read_input(Some(r#"{"latitude": 1}"#.into()), None).unwrap();
        assert_eq!(value, json!({"latitude": 1}));
    }

    #[test]
    fn file_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"detectionFrequency": []}}"#).unwrap();
        let value = read_input(None, Some(file.path().to_path_buf())).unwrap();
        assert_eq!(value, json!({"detectionFrequency": []}));
    }

    #[test]
    fn no_input_is_empty_object() {
        assert_eq!(read_input(None, None).unwrap(), json!({}));
    }

    #[test]
    fn malformed_input_is_an_error() {
        let err = read_input(Some("{nope".into()), None).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
