use serde_json::Value;

use crate::error::ToolError;

/// Pull `choices[0].message.content` out of a chat completion.
pub fn completion_text(vendor: &'static str, body: &Value) -> Result<String, ToolError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::UnexpectedResponse {
            vendor,
            detail: "missing choices[0].message.content".to_string(),
        })
}

/// Source URLs attached to a completion.
///
/// Prefers the flat `citations` list and falls back to `search_results[].url`.
pub fn citations(body: &Value) -> Vec<String> {
    if let Some(list) = body.get("citations").and_then(Value::as_array) {
        return list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }

    body.get("search_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Append a numbered citation footer, keeping at most `max` entries.
pub fn with_citations(text: String, citations: &[String], max: Option<usize>) -> String {
    let take = max.unwrap_or(citations.len()).min(citations.len());
    if take == 0 {
        return text;
    }

    let mut out = text;
    out.push_str("\n\nCitations:");
    for (i, url) in citations.iter().take(take).enumerate() {
        out.push_str(&format!("\n[{}] {}", i + 1, url));
    }
    out
}

/// Remove `<think>...</think>` blocks emitted by reasoning models.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Render `/search` results as a numbered list.
pub fn search_results(query: &str, body: &Value) -> String {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if results.is_empty() {
        return format!("No results found for \"{}\".", query);
    }

    let mut out = format!("Found {} results for \"{}\":", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        let title = result
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)");
        let url = result.get("url").and_then(Value::as_str).unwrap_or("");

        out.push_str(&format!("\n\n{}. {}\n   {}", i + 1, title, url));
        if let Some(date) = result.get("date").and_then(Value::as_str) {
            out.push_str(&format!("\n   Published: {}", date));
        }
        if let Some(snippet) = result.get("snippet").and_then(Value::as_str) {
            let snippet = snippet.trim();
            if !snippet.is_empty() {
                out.push_str(&format!("\n   {}", snippet));
            }
        }
    }
    out
}
