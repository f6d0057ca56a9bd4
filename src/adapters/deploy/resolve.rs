//! Human name to native id resolution.

use serde_json::Value;

use crate::context::ResolvedAuth;
use crate::error::ToolError;
use crate::vendor::{VendorApi, VendorRequest};

pub const PROJECT_ID_PREFIX: &str = "prj_";
pub const DEPLOYMENT_ID_PREFIX: &str = "dpl_";

pub fn looks_like_project_id(value: &str) -> bool {
    value.starts_with(PROJECT_ID_PREFIX) && value.len() > PROJECT_ID_PREFIX.len()
}

pub fn looks_like_deployment_id(value: &str) -> bool {
    value.starts_with(DEPLOYMENT_ID_PREFIX) && value.len() > DEPLOYMENT_ID_PREFIX.len()
}

/// Reject values that would escape their URL path segment.
pub fn path_segment<'a>(field: &str, value: &'a str) -> Result<&'a str, ToolError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ToolError::validation(format!(
            "field `{}` must not be empty",
            field
        )));
    }
    if value
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(ToolError::validation(format!(
            "field `{}` contains characters not allowed in an identifier",
            field
        )));
    }
    Ok(value)
}

/// Accept a deployment id or its URL (`https://x.vercel.app/` becomes `x.vercel.app`).
pub fn deployment_ref(value: &str) -> Result<&str, ToolError> {
    let trimmed = value.trim();
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    path_segment("deployment", host)
}

/// A deployment id proper, for operations that do not accept URLs.
pub fn deployment_id(value: &str) -> Result<&str, ToolError> {
    let id = path_segment("deployment", value)?;
    if !looks_like_deployment_id(id) {
        return Err(ToolError::validation(format!(
            "field `deployment` must be a deployment id starting with `{}` (got \"{}\")",
            DEPLOYMENT_ID_PREFIX, id
        )));
    }
    Ok(id)
}

/// A checked `project` argument, before any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// Validate a project name or id without touching the network.
pub fn project_ref(value: &str) -> Result<ProjectRef<'_>, ToolError> {
    let value = path_segment("project", value)?;
    if looks_like_project_id(value) {
        Ok(ProjectRef::Id(value))
    } else {
        Ok(ProjectRef::Name(value))
    }
}

/// Map a project reference to the native id.
///
/// Ids pass through untouched. Names cost one listing call; only entries whose
/// `name` matches exactly count.
pub async fn resolve_project(
    vendor: &dyn VendorApi,
    auth: &ResolvedAuth,
    project: ProjectRef<'_>,
) -> Result<String, ToolError> {
    let value = match project {
        ProjectRef::Id(id) => return Ok(id.to_string()),
        ProjectRef::Name(name) => name,
    };

    let request = super::scoped(VendorRequest::get("/v9/projects", auth), auth).query("search", value);
    let body = vendor.send(request).await?;

    let entries = body
        .get("projects")
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
        .ok_or_else(|| ToolError::UnexpectedResponse {
            vendor: vendor.name(),
            detail: "project listing has no `projects` array".to_string(),
        })?;

    let matches: Vec<&str> = entries
        .iter()
        .filter(|p| p.get("name").and_then(Value::as_str) == Some(value))
        .filter_map(|p| p.get("id").and_then(Value::as_str))
        .collect();

    match matches.as_slice() {
        [id] => {
            tracing::debug!(project = %value, id = %id, "Resolved project name");
            Ok(id.to_string())
        }
        [] => Err(ToolError::NotFound {
            kind: "Project",
            name: value.to_string(),
        }),
        many => Err(ToolError::Ambiguous {
            kind: "Project",
            name: value.to_string(),
            count: many.len(),
        }),
    }
}
