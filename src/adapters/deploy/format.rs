//! Text projections of deployment-platform entities.
//!
//! Only the fields listed per entity are printed. Environment variable values are
//! never printed, even when the API returns them decrypted.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// First of `keys` present on `v`, rendered without JSON quoting.
fn field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.pointer(k))
        .find(|x| !x.is_null())
        .map(|x| match x {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        })
}

/// Milliseconds since the epoch as RFC 3339; other shapes are printed as-is.
fn timestamp(v: &Value, keys: &[&str]) -> Option<String> {
    let raw = keys.iter().filter_map(|k| v.pointer(k)).find(|x| !x.is_null())?;
    match raw.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(dt) => Some(dt.to_rfc3339()),
        None => field(v, keys),
    }
}

fn push_line(out: &mut String, label: &str, value: Option<String>) {
    if let Some(value) = value {
        out.push_str(&format!("\n  {}: {}", label, value));
    }
}

fn list<F>(items: &[Value], noun: &str, render: F) -> String
where
    F: Fn(&Value) -> String,
{
    if items.is_empty() {
        return format!("No {} found.", noun);
    }
    let blocks: Vec<String> = items.iter().map(render).collect();
    format!("Found {} {}:\n\n{}", items.len(), noun, blocks.join("\n\n"))
}

/// Array under `key`, or the body itself when it is already an array.
pub fn items<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn deployment(d: &Value) -> String {
    let id = field(d, &["/uid", "/id"]).unwrap_or_else(|| "(unknown id)".to_string());
    let mut out = format!("Deployment {}", id);
    push_line(&mut out, "Name", field(d, &["/name"]));
    push_line(
        &mut out,
        "URL",
        field(d, &["/url"]).map(|u| {
            if u.starts_with("http") {
                u
            } else {
                format!("https://{}", u)
            }
        }),
    );
    push_line(&mut out, "State", field(d, &["/state", "/readyState"]));
    push_line(&mut out, "Target", field(d, &["/target"]));
    push_line(&mut out, "Created", timestamp(d, &["/createdAt", "/created"]));
    push_line(&mut out, "Creator", field(d, &["/creator/username"]));
    push_line(&mut out, "Inspector", field(d, &["/inspectorUrl"]));
    out
}

pub fn deployments(body: &Value) -> String {
    list(items(body, "deployments"), "deployments", deployment)
}

pub fn project(p: &Value) -> String {
    let name = field(p, &["/name"]).unwrap_or_else(|| "(unnamed)".to_string());
    let mut out = format!("Project {}", name);
    push_line(&mut out, "ID", field(p, &["/id"]));
    push_line(&mut out, "Framework", field(p, &["/framework"]));
    push_line(&mut out, "Repository", field(p, &["/link/repo"]));
    push_line(&mut out, "Updated", timestamp(p, &["/updatedAt"]));
    out
}

pub fn projects(body: &Value) -> String {
    list(items(body, "projects"), "projects", project)
}

pub fn domain(d: &Value) -> String {
    let name = field(d, &["/name"]).unwrap_or_else(|| "(unnamed)".to_string());
    let mut out = format!("Domain {}", name);
    push_line(&mut out, "Verified", field(d, &["/verified"]));
    push_line(&mut out, "Redirect", field(d, &["/redirect"]));
    push_line(&mut out, "Git branch", field(d, &["/gitBranch"]));
    out
}

pub fn domains(body: &Value) -> String {
    list(items(body, "domains"), "domains", domain)
}

pub fn env_var(e: &Value) -> String {
    let key = field(e, &["/key"]).unwrap_or_else(|| "(unnamed)".to_string());
    let mut out = format!("Variable {}", key);
    push_line(&mut out, "ID", field(e, &["/id"]));
    push_line(&mut out, "Targets", field(e, &["/target"]));
    push_line(&mut out, "Type", field(e, &["/type"]));
    out
}

pub fn env_vars(body: &Value) -> String {
    list(items(body, "envs"), "environment variables", env_var)
}

pub fn team(t: &Value) -> String {
    let name = field(t, &["/name"]).unwrap_or_else(|| "(unnamed)".to_string());
    let mut out = format!("Team {}", name);
    push_line(&mut out, "ID", field(t, &["/id"]));
    push_line(&mut out, "Slug", field(t, &["/slug"]));
    out
}

pub fn teams(body: &Value) -> String {
    list(items(body, "teams"), "teams", team)
}

/// The record(s) a create-env call reports back. The API answers with either
/// `created: {..}`, `created: [..]` or the bare record.
pub fn created_env_vars(body: &Value) -> String {
    let created: Vec<Value> = match body.get("created") {
        Some(Value::Array(list)) => list.clone(),
        Some(single @ Value::Object(_)) => vec![single.clone()],
        _ => vec![body.clone()],
    };
    let blocks: Vec<String> = created.iter().map(env_var).collect();
    format!("Created environment variable:\n\n{}", blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_projection() {
        let text = deployment(&json!({
            "uid": "dpl_1",
            "name": "web",
            "url": "web-abc.vercel.app",
            "readyState": "READY",
            "target": "production",
            "createdAt": 1_700_000_000_000i64,
            "creator": { "username": "alice", "email": "alice@example.com" },
            "inspectorUrl": "https://vercel.com/inspect/1",
            "meta": { "secret": "ignored" }
        }));

        assert!(text.starts_with("Deployment dpl_1\n  Name: web"));
        assert!(text.contains("URL: https://web-abc.vercel.app"));
        assert!(text.contains("State: READY"));
        assert!(text.contains("Created: 2023-11-14T22:13:20+00:00"));
        assert!(text.contains("Creator: alice"));
        assert!(!text.contains("alice@example.com"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn test_env_var_value_never_printed() {
        let text = env_vars(&json!({ "envs": [{
            "id": "env_1",
            "key": "DATABASE_URL",
            "value": "postgres://user:hunter2@db",
            "target": ["production", "preview"],
            "type": "encrypted"
        }]}));

        assert!(text.starts_with("Found 1 environment variables:"));
        assert!(text.contains("Targets: production, preview"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(deployments(&json!({ "deployments": [] })), "No deployments found.");
        assert_eq!(teams(&json!({})), "No teams found.");
    }

    #[test]
    fn test_created_env_shapes() {
        let single = created_env_vars(&json!({ "created": { "id": "env_1", "key": "A", "value": "x" } }));
        assert!(single.contains("Variable A"));
        let many = created_env_vars(&json!({ "created": [{ "key": "A" }, { "key": "B" }] }));
        assert!(many.contains("Variable A") && many.contains("Variable B"));
    }

    #[test]
    fn test_project_and_domain_projection() {
        let text = projects(&json!({ "projects": [{
            "id": "prj_1", "name": "web", "framework": "nextjs",
            "link": { "repo": "acme/web" }, "updatedAt": 0
        }]}));
        assert!(text.contains("Project web\n  ID: prj_1\n  Framework: nextjs\n  Repository: acme/web"));
        assert!(text.contains("Updated: 1970-01-01T00:00:00+00:00"));

        let text = domain(&json!({ "name": "example.com", "verified": false, "redirect": null }));
        assert_eq!(text, "Domain example.com\n  Verified: false");
    }
}
