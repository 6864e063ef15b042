//! JSON parsing helpers for model responses
//!
//! Models sometimes wrap the JSON payload in prose or code fences even when
//! a response schema is requested, so parsing looks for the outermost object.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Longest slice of raw output quoted in error messages
const RAW_PREVIEW: usize = 200;

fn preview(raw: &str) -> String {
    if raw.len() > RAW_PREVIEW {
        let mut end = RAW_PREVIEW;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &raw[..end])
    } else {
        raw.to_string()
    }
}

/// Parse the first `{` .. last `}` span of a response as `T`
pub fn extract_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid JSON from model: {} | Raw: {}",
                    e,
                    preview(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in model response | Raw: {}",
            preview(response)
        ))),
    }
}

/// Parse tool-call arguments, treating anything unparseable as `{}`
pub fn parse_arguments(arguments: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Headline {
        headline: String,
    }

    #[test]
    fn test_extract_json_plain_and_wrapped() {
        let plain: Headline = extract_json(r#"{"headline": "ok"}"#).unwrap();
        assert_eq!(plain.headline, "ok");

        let fenced: Headline =
            extract_json("Here you go:\n```json\n{\"headline\": \"fenced\"}\n```").unwrap();
        assert_eq!(fenced.headline, "fenced");
    }

    #[test]
    fn test_extract_json_errors() {
        assert!(extract_json::<Headline>("no json here").is_err());
        assert!(extract_json::<Headline>("{ not json }").is_err());
        assert!(extract_json::<Headline>(r#"{"other": 1}"#).is_err());
    }

    #[test]
    fn test_parse_arguments() {
        let args = parse_arguments(r#"{"period_days": 30}"#);
        assert_eq!(args["period_days"], 30);
        assert!(parse_arguments("not json").is_empty());
        assert!(parse_arguments("[1,2]").is_empty());
        assert!(parse_arguments("").is_empty());
    }
}
