// Structured reply parsing
//
// Every place that expects JSON back from a model goes through `extract_json`.
// Failures always carry the raw reply so the caller can show what the model
// actually said.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;

/// Parse the first JSON object in a model reply into `T`
///
/// Tries, in order: the whole reply (after stripping markdown fences), then
/// the first complete object embedded in surrounding prose.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let stripped = strip_markdown_fences(raw);

    // Whole reply is JSON
    match serde_json::from_str::<T>(stripped) {
        Ok(value) => return Ok(value),
        Err(e) if serde_json::from_str::<Value>(stripped).is_ok() => {
            return Err(shape_error(raw, e));
        }
        Err(_) => {}
    }

    // JSON object embedded in prose
    let object = first_object(stripped).ok_or_else(|| ParseError::NoJson {
        raw: raw.to_string(),
    })?;
    serde_json::from_value(object).map_err(|e| shape_error(raw, e))
}

/// First `{` that opens a complete JSON object, read up to its matching `}`
///
/// Braces in prose before or after the object are skipped.
fn first_object(s: &str) -> Option<Value> {
    s.match_indices('{').find_map(|(start, _)| {
        match serde_json::Deserializer::from_str(&s[start..])
            .into_iter::<Value>()
            .next()
        {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

fn shape_error(raw: &str, err: serde_json::Error) -> ParseError {
    ParseError::Shape {
        raw: raw.to_string(),
        detail: err.to_string(),
    }
}

/// Strip leading/trailing markdown code fences (```json ... ``` or ``` ... ```)
pub fn strip_markdown_fences(s: &str) -> &str {
    let s = s.trim();
    let s = if let Some(rest) = s.strip_prefix("```json") {
        rest
    } else if let Some(rest) = s.strip_prefix("```") {
        rest
    } else {
        s
    };
    if let Some(rest) = s.strip_suffix("```") {
        rest.trim()
    } else {
        s.trim()
    }
}

/// Accept either a JSON array of strings or a single delimited string
///
/// Models sometimes answer `"a, b"` where a list was asked for. Empty
/// entries are dropped and `null` becomes an empty list.
pub fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<serde_json::Value>),
        Text(String),
        Null(()),
    }

    let items = match ListOrString::deserialize(deserializer)? {
        ListOrString::List(values) => values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                other => Err(de::Error::custom(format!(
                    "expected a string list item, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        ListOrString::Text(text) => text
            .split(|c| c == ',' || c == ';' || c == '\n')
            .map(str::to_string)
            .collect(),
        ListOrString::Null(()) => Vec::new(),
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
