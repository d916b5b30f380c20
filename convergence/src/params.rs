//! Input grammars for deployment requests.
//!
//! Parameter overrides arrive as `key=value[,key=value...]` text with
//! quote-aware comma splitting, or as a `file:` URL pointing at a JSON
//! document of the same structured shape. Tags arrive as raw JSON; anything
//! that does not parse as a tag array means "no tags", not an error.
//!
//! The override grammar is reproduced exactly for compatibility with the
//! text accepted by existing pipelines:
//! - split on commas followed by an even number of quote characters (i.e.
//!   commas outside quoted segments),
//! - split each segment on the FIRST `=` so values may contain `=`,
//! - a repeated key appends to the previous value with a comma join,
//! - matching surrounding single or double quotes are stripped from the
//!   final value.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConvergeError;

/// A single template parameter override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub parameter_key: String,
    pub parameter_value: String,
}

/// A stack tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Split on commas that are not inside a quoted segment.
///
/// A comma is a split point iff an even number of quote characters (single
/// or double, counted together) remains after it.
fn split_outside_quotes(s: &str) -> Vec<&str> {
    let total_quotes = s.chars().filter(|c| *c == '"' || *c == '\'').count();
    let mut segments = Vec::new();
    let mut seen = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '"' | '\'' => seen += 1,
            ',' if (total_quotes - seen) % 2 == 0 => {
                segments.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&s[start..]);
    segments
}

fn strip_matching_quotes(v: &str) -> &str {
    if v.len() >= 2
        && ((v.starts_with('\'') && v.ends_with('\''))
            || (v.starts_with('"') && v.ends_with('"')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Parse parameter overrides from override text or a `file:` URL to a JSON
/// document of `[{"ParameterKey": ..., "ParameterValue": ...}]` shape.
pub fn parse_parameter_overrides(input: &str) -> Result<Vec<Parameter>, ConvergeError> {
    if let Ok(location) = Url::parse(input) {
        if location.scheme() != "file" {
            return Err(ConvergeError::Config(format!(
                "parameter override documents must use a file: URL, got {}",
                location.scheme()
            )));
        }
        let path = location.to_file_path().map_err(|_| {
            ConvergeError::Config(format!("invalid parameter override file URL: {input}"))
        })?;
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ConvergeError::Config(format!(
                "unable to read parameter override file {}: {e}",
                path.display()
            ))
        })?;
        return serde_json::from_str(&raw).map_err(|e| {
            ConvergeError::Config(format!(
                "invalid parameter override document {}: {e}",
                path.display()
            ))
        });
    }

    let mut parameters: Vec<(String, String)> = Vec::new();
    for segment in split_outside_quotes(input) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = match segment.split_once('=') {
            Some((key, value)) => (key, value),
            None => (segment, ""),
        };
        match parameters.iter_mut().find(|(k, _)| k == key) {
            // An empty previous value is replaced, not joined onto.
            Some((_, existing)) if existing.is_empty() => {
                *existing = strip_matching_quotes(value).to_string();
            }
            Some((_, existing)) => {
                let joined = format!("{existing},{value}");
                *existing = strip_matching_quotes(&joined).to_string();
            }
            None => {
                parameters.push((key.to_string(), strip_matching_quotes(value).to_string()));
            }
        }
    }

    Ok(parameters
        .into_iter()
        .map(|(parameter_key, parameter_value)| Parameter {
            parameter_key,
            parameter_value,
        })
        .collect())
}

/// Parse tags from raw JSON text. Anything that is not a tag array yields
/// no tags rather than an error.
pub fn parse_tags(s: &str) -> Option<Vec<Tag>> {
    serde_json::from_str(s).ok()
}

/// Split a comma-separated ARN list, trimming entries and dropping empties.
/// Empty input yields `None`.
pub fn parse_arn_list(s: &str) -> Option<Vec<String>> {
    if s.is_empty() {
        return None;
    }
    let arns: Vec<String> = s
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if arns.is_empty() {
        None
    } else {
        Some(arns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn params(input: &str) -> Vec<(String, String)> {
        parse_parameter_overrides(input)
            .unwrap()
            .into_iter()
            .map(|p| (p.parameter_key, p.parameter_value))
            .collect()
    }

    #[test]
    fn test_basic_pairs_with_quoted_value() {
        assert_eq!(
            params("Param1=Value1, Param2=\"Value2\""),
            vec![
                ("Param1".to_string(), "Value1".to_string()),
                ("Param2".to_string(), "Value2".to_string()),
            ]
        );
    }

    #[test]
    fn test_value_may_contain_equals() {
        assert_eq!(params("Key=a=b"), vec![("Key".to_string(), "a=b".to_string())]);
    }

    #[test]
    fn test_repeated_key_joins_values_with_comma() {
        assert_eq!(params("K=1,K=2"), vec![("K".to_string(), "1,2".to_string())]);
    }

    #[test]
    fn test_repeated_key_with_empty_previous_value_is_replaced() {
        assert_eq!(params("K=,K=2"), vec![("K".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_comma_inside_quotes_is_not_a_split_point() {
        assert_eq!(
            params("List=\"a,b\",Other=c"),
            vec![
                ("List".to_string(), "a,b".to_string()),
                ("Other".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_quotes_are_stripped_too() {
        assert_eq!(
            params("Name='hello world'"),
            vec![("Name".to_string(), "hello world".to_string())]
        );
    }

    #[test]
    fn test_mismatched_quotes_are_kept() {
        assert_eq!(
            params("Name=\"partial"),
            vec![("Name".to_string(), "\"partial".to_string())]
        );
    }

    #[test]
    fn test_key_without_value_yields_empty_value() {
        assert_eq!(params("Flag="), vec![("Flag".to_string(), String::new())]);
    }

    #[test]
    fn test_json_document_from_file_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"ParameterKey": "Env", "ParameterValue": "prod"}}]"#
        )
        .unwrap();
        let url = format!("file://{}", file.path().display());

        let parsed = parse_parameter_overrides(&url).unwrap();
        assert_eq!(
            parsed,
            vec![Parameter {
                parameter_key: "Env".to_string(),
                parameter_value: "prod".to_string(),
            }]
        );
    }

    #[test]
    fn test_non_file_url_document_is_rejected() {
        let err = parse_parameter_overrides("https://example.com/params.json").unwrap_err();
        assert!(err.to_string().contains("file:"), "{err}");
    }

    #[test]
    fn test_tags_object_shape_yields_none() {
        assert_eq!(parse_tags("{\"prop1\": \"val1\"}"), None);
    }

    #[test]
    fn test_tags_array_is_parsed() {
        let tags = parse_tags("[{\"Key\": \"team\", \"Value\": \"infra\"}]").unwrap();
        assert_eq!(
            tags,
            vec![Tag {
                key: "team".to_string(),
                value: "infra".to_string(),
            }]
        );
    }

    #[test]
    fn test_tags_non_json_yields_none() {
        assert_eq!(parse_tags("prop1=val1"), None);
    }

    #[test]
    fn test_arn_list_splits_and_trims() {
        assert_eq!(
            parse_arn_list("arn:aws:sns:us-east-1:1:a, arn:aws:sns:us-east-1:1:b"),
            Some(vec![
                "arn:aws:sns:us-east-1:1:a".to_string(),
                "arn:aws:sns:us-east-1:1:b".to_string(),
            ])
        );
    }

    #[test]
    fn test_arn_list_drops_trailing_empty_entry() {
        assert_eq!(
            parse_arn_list("arn:aws:sns:us-east-1:1:a,"),
            Some(vec!["arn:aws:sns:us-east-1:1:a".to_string()])
        );
    }

    #[test]
    fn test_arn_list_empty_input_is_none() {
        assert_eq!(parse_arn_list(""), None);
    }
}
