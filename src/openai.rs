use crate::error::SummarizeError;

pub fn responses_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/responses")
}

/// One text-generation call against the provider's Responses API. Status
/// codes map onto the error taxonomy; the retry policy lives in the
/// orchestrator, not here.
pub async fn responses_text(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    instructions: &str,
    input: &str,
    temperature: f32,
    max_output_tokens: u32,
) -> Result<String, SummarizeError> {
    let mut body = serde_json::json!({
        "model": model,
        "instructions": instructions,
        "input": input,
        "text": { "format": { "type": "text" } },
        "max_output_tokens": max_output_tokens,
        "store": false,
    });

    // NOTE: Some GPT-5 models reject sampling params like `temperature`.
    // Keep compatibility by omitting it for the GPT-5 family.
    if !model.starts_with("gpt-5")
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert("temperature".to_owned(), serde_json::json!(temperature));
    }

    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                SummarizeError::Timeout
            } else {
                SummarizeError::Transient(format!("POST {endpoint}: {err}"))
            }
        })?;

    let status = response.status();
    let raw = response
        .text()
        .await
        .map_err(|err| SummarizeError::Transient(format!("read response body: {err}")))?;

    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
        return Err(match status.as_u16() {
            401 | 403 => SummarizeError::ApiKeyInvalid,
            429 => SummarizeError::RateLimited,
            408 | 504 => SummarizeError::Timeout,
            _ => SummarizeError::Transient(format!("provider error ({status}): {message}")),
        });
    }

    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| SummarizeError::ParseFailure(format!("response is not JSON: {err}")))?;
    extract_output_text(&value)
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_output_text(value: &serde_json::Value) -> Result<String, SummarizeError> {
    let output = value
        .get("output")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            SummarizeError::ParseFailure("missing `output` array in response".to_owned())
        })?;

    let mut text = String::new();
    for item in output {
        if item.get("type").and_then(|v| v.as_str()) != Some("message") {
            continue;
        }
        let content = match item.get("content").and_then(|v| v.as_array()) {
            Some(content) => content,
            None => continue,
        };
        for part in content {
            if part.get("type").and_then(|v| v.as_str()) != Some("output_text") {
                continue;
            }
            let Some(part_text) = part.get("text").and_then(|v| v.as_str()) else {
                continue;
            };
            text.push_str(part_text);
        }
    }

    if text.trim().is_empty() {
        return Err(SummarizeError::ParseFailure(
            "provider output text is empty".to_owned(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(
            responses_endpoint("http://localhost:1234/v1/"),
            "http://localhost:1234/v1/responses"
        );
    }

    #[test]
    fn output_text_is_concatenated_across_parts() {
        let value = serde_json::json!({
            "output": [
                { "type": "reasoning" },
                {
                    "type": "message",
                    "content": [
                        { "type": "output_text", "text": "Hello " },
                        { "type": "output_text", "text": "world" },
                    ]
                }
            ]
        });
        assert_eq!(extract_output_text(&value).expect("text"), "Hello world");
    }

    #[test]
    fn empty_output_is_a_parse_failure() {
        let value = serde_json::json!({ "output": [] });
        assert!(matches!(
            extract_output_text(&value),
            Err(SummarizeError::ParseFailure(_))
        ));
    }
}
