//! Deployment-platform adapter.
//!
//! Project-keyed tools accept either a native `prj_` id or the project's name;
//! names are looked up with one listing call before the real operation.

pub mod format;
pub mod resolve;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::{CredentialResolver, ResolvedAuth};
use crate::error::ToolError;
use crate::tools::{Arguments, ParamKind, ParamSpec, ToolDescriptor, ToolKind, Toolbox};
use crate::vendor::{Method, VendorApi, VendorRequest};

use resolve::{deployment_id, deployment_ref, path_segment, project_ref, resolve_project, ProjectRef};

const DEPLOYMENT_STATES: &[&str] = &["BUILDING", "ERROR", "INITIALIZING", "QUEUED", "READY", "CANCELED"];
const DEPLOYMENT_TARGETS: &[&str] = &["production", "preview"];
const ENV_TARGETS: &[&str] = &["production", "preview", "development"];
const ENV_TYPES: &[&str] = &["plain", "encrypted", "sensitive"];
const DEFAULT_LIMIT: i64 = 20;

/// Attach the resolved scope as `teamId`.
pub(crate) fn scoped(request: VendorRequest, auth: &ResolvedAuth) -> VendorRequest {
    request.query_opt("teamId", auth.scope.as_deref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployTool {
    ListDeployments,
    GetDeployment,
    CancelDeployment,
    DeleteDeployment,
    ListProjects,
    GetProject,
    CreateProject,
    DeleteProject,
    ListDomains,
    AddDomain,
    RemoveDomain,
    ListEnvVars,
    CreateEnvVar,
    DeleteEnvVar,
    ListTeams,
}

fn project_param() -> ParamSpec {
    ParamSpec::string("project", "Project id (prj_...) or exact project name").required()
}

fn deployment_param(description: &'static str) -> ParamSpec {
    ParamSpec::string("deployment", description).required()
}

fn limit_param(what: &'static str) -> ParamSpec {
    ParamSpec::integer("limit", what)
        .range(Some(1), Some(100))
        .default_value(json!(DEFAULT_LIMIT))
}

impl ToolKind for DeployTool {
    const ALL: &'static [Self] = &[
        DeployTool::ListDeployments,
        DeployTool::GetDeployment,
        DeployTool::CancelDeployment,
        DeployTool::DeleteDeployment,
        DeployTool::ListProjects,
        DeployTool::GetProject,
        DeployTool::CreateProject,
        DeployTool::DeleteProject,
        DeployTool::ListDomains,
        DeployTool::AddDomain,
        DeployTool::RemoveDomain,
        DeployTool::ListEnvVars,
        DeployTool::CreateEnvVar,
        DeployTool::DeleteEnvVar,
        DeployTool::ListTeams,
    ];

    fn name(self) -> &'static str {
        match self {
            DeployTool::ListDeployments => "list_deployments",
            DeployTool::GetDeployment => "get_deployment",
            DeployTool::CancelDeployment => "cancel_deployment",
            DeployTool::DeleteDeployment => "delete_deployment",
            DeployTool::ListProjects => "list_projects",
            DeployTool::GetProject => "get_project",
            DeployTool::CreateProject => "create_project",
            DeployTool::DeleteProject => "delete_project",
            DeployTool::ListDomains => "list_domains",
            DeployTool::AddDomain => "add_domain",
            DeployTool::RemoveDomain => "remove_domain",
            DeployTool::ListEnvVars => "list_env_vars",
            DeployTool::CreateEnvVar => "create_env_var",
            DeployTool::DeleteEnvVar => "delete_env_var",
            DeployTool::ListTeams => "list_teams",
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        let name = self.name();
        match self {
            DeployTool::ListDeployments => ToolDescriptor::new(
                name,
                "List recent deployments with their id, URL, state, target and creation time.",
                vec![
                    ParamSpec::string("project", "Only deployments of this project (id or name)"),
                    limit_param("Maximum number of deployments"),
                    ParamSpec::string("state", "Only deployments in this state").one_of(DEPLOYMENT_STATES),
                    ParamSpec::string("target", "Only deployments to this target").one_of(DEPLOYMENT_TARGETS),
                ],
            ),
            DeployTool::GetDeployment => ToolDescriptor::new(
                name,
                "Show one deployment's id, URL, state, target, creator and inspector link.",
                vec![deployment_param("Deployment id (dpl_...) or deployment URL")],
            ),
            DeployTool::CancelDeployment => ToolDescriptor::new(
                name,
                "Cancel a deployment that is still queued or building and report its new state.",
                vec![deployment_param("Deployment id (dpl_...)")],
            ),
            DeployTool::DeleteDeployment => ToolDescriptor::new(
                name,
                "Delete a deployment permanently.",
                vec![deployment_param("Deployment id (dpl_...)")],
            ),
            DeployTool::ListProjects => ToolDescriptor::new(
                name,
                "List projects with their id, framework and linked repository.",
                vec![
                    ParamSpec::string("search", "Only projects whose name contains this text"),
                    limit_param("Maximum number of projects"),
                ],
            ),
            DeployTool::GetProject => ToolDescriptor::new(
                name,
                "Show a project's id, framework, repository and last update.",
                vec![project_param()],
            ),
            DeployTool::CreateProject => ToolDescriptor::new(
                name,
                "Create a project, optionally linked to a GitHub repository.",
                vec![
                    ParamSpec::string("name", "Project name").required(),
                    ParamSpec::string("framework", "Framework preset (e.g. nextjs, vite)"),
                    ParamSpec::string("git_repository", "GitHub repository as owner/repo"),
                ],
            ),
            DeployTool::DeleteProject => ToolDescriptor::new(
                name,
                "Delete a project and all of its deployments.",
                vec![project_param()],
            ),
            DeployTool::ListDomains => ToolDescriptor::new(
                name,
                "List a project's domains with verification status.",
                vec![project_param()],
            ),
            DeployTool::AddDomain => ToolDescriptor::new(
                name,
                "Attach a domain to a project and report whether it is verified.",
                vec![
                    project_param(),
                    ParamSpec::string("domain", "Domain name, e.g. www.example.com").required(),
                ],
            ),
            DeployTool::RemoveDomain => ToolDescriptor::new(
                name,
                "Detach a domain from a project.",
                vec![
                    project_param(),
                    ParamSpec::string("domain", "Domain name to remove").required(),
                ],
            ),
            DeployTool::ListEnvVars => ToolDescriptor::new(
                name,
                "List a project's environment variables (keys, targets and types; never values).",
                vec![project_param()],
            ),
            DeployTool::CreateEnvVar => ToolDescriptor::new(
                name,
                "Create an environment variable on a project for the given targets.",
                vec![
                    project_param(),
                    ParamSpec::string("key", "Variable name").required(),
                    ParamSpec::string("value", "Variable value").required(),
                    ParamSpec::array(
                        "targets",
                        "Environments the variable applies to",
                        ParamKind::String { allowed: ENV_TARGETS },
                    )
                    .required(),
                    ParamSpec::string("type", "Storage type")
                        .one_of(ENV_TYPES)
                        .default_value(json!("encrypted")),
                ],
            ),
            DeployTool::DeleteEnvVar => ToolDescriptor::new(
                name,
                "Delete an environment variable from a project by its id.",
                vec![
                    project_param(),
                    ParamSpec::string("env_id", "Environment variable id").required(),
                ],
            ),
            DeployTool::ListTeams => ToolDescriptor::new(
                name,
                "List the teams the credential has access to, with id and slug.",
                vec![],
            ),
        }
    }
}

/// Executes [`DeployTool`] calls against the vendor.
pub struct DeployToolbox {
    vendor: Arc<dyn VendorApi>,
    credentials: CredentialResolver,
}

impl DeployToolbox {
    pub fn new(vendor: Arc<dyn VendorApi>, credentials: CredentialResolver) -> Self {
        Self {
            vendor,
            credentials,
        }
    }

    async fn send(&self, request: VendorRequest, auth: &ResolvedAuth) -> Result<Value, ToolError> {
        self.vendor.send(scoped(request, auth)).await
    }

    async fn project_id(&self, project: ProjectRef<'_>, auth: &ResolvedAuth) -> Result<String, ToolError> {
        resolve_project(self.vendor.as_ref(), auth, project).await
    }

    async fn list_deployments(&self, args: &Arguments) -> Result<String, ToolError> {
        let project = args
            .str("project")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(project_ref)
            .transpose()?;
        let auth = self.credentials.resolve()?;
        let project = match project {
            Some(p) => Some(self.project_id(p, &auth).await?),
            None => None,
        };

        let request = VendorRequest::get("/v6/deployments", &auth)
            .query("limit", args.integer("limit").unwrap_or(DEFAULT_LIMIT))
            .query_opt("projectId", project)
            .query_opt("state", args.str("state"))
            .query_opt("target", args.str("target"));
        let body = self.send(request, &auth).await?;
        Ok(format::deployments(&body))
    }

    async fn get_deployment(&self, args: &Arguments) -> Result<String, ToolError> {
        let reference = deployment_ref(args.require_str("deployment")?)?;
        let auth = self.credentials.resolve()?;
        let body = self
            .send(VendorRequest::get(format!("/v13/deployments/{}", reference), &auth), &auth)
            .await?;
        Ok(format::deployment(&body))
    }

    async fn cancel_deployment(&self, args: &Arguments) -> Result<String, ToolError> {
        let id = deployment_id(args.require_str("deployment")?)?;
        let auth = self.credentials.resolve()?;
        let request = VendorRequest::new(Method::PATCH, format!("/v12/deployments/{}/cancel", id), &auth);
        let body = self.send(request, &auth).await?;
        Ok(format!("Deployment canceled.\n\n{}", format::deployment(&body)))
    }

    async fn delete_deployment(&self, args: &Arguments) -> Result<String, ToolError> {
        let id = deployment_id(args.require_str("deployment")?)?;
        let auth = self.credentials.resolve()?;
        let body = self
            .send(VendorRequest::delete(format!("/v13/deployments/{}", id), &auth), &auth)
            .await?;
        let state = body.get("state").and_then(Value::as_str).unwrap_or("DELETED");
        Ok(format!("Deployment {} deleted (state: {}).", id, state))
    }

    async fn list_projects(&self, args: &Arguments) -> Result<String, ToolError> {
        let auth = self.credentials.resolve()?;
        let request = VendorRequest::get("/v9/projects", &auth)
            .query("limit", args.integer("limit").unwrap_or(DEFAULT_LIMIT))
            .query_opt("search", args.str("search").map(str::trim).filter(|s| !s.is_empty()));
        let body = self.send(request, &auth).await?;
        Ok(format::projects(&body))
    }

    async fn get_project(&self, args: &Arguments) -> Result<String, ToolError> {
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        let body = self
            .send(VendorRequest::get(format!("/v9/projects/{}", id), &auth), &auth)
            .await?;
        Ok(format::project(&body))
    }

    async fn create_project(&self, args: &Arguments) -> Result<String, ToolError> {
        let name = args.require_str("name")?;
        let mut payload = json!({ "name": name });
        if let Some(framework) = args.str("framework").filter(|f| !f.trim().is_empty()) {
            payload["framework"] = json!(framework.trim());
        }
        if let Some(repo) = args.str("git_repository").map(str::trim).filter(|r| !r.is_empty()) {
            let well_formed = matches!(
                repo.split('/').collect::<Vec<_>>().as_slice(),
                [owner, name] if !owner.is_empty() && !name.is_empty()
            );
            if !well_formed {
                return Err(ToolError::validation(format!(
                    "field `git_repository` must look like owner/repo (got \"{}\")",
                    repo
                )));
            }
            payload["gitRepository"] = json!({ "type": "github", "repo": repo });
        }

        let auth = self.credentials.resolve()?;
        let body = self
            .send(VendorRequest::post("/v10/projects", &auth, payload), &auth)
            .await?;
        Ok(format!("Project created.\n\n{}", format::project(&body)))
    }

    async fn delete_project(&self, args: &Arguments) -> Result<String, ToolError> {
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        self.send(VendorRequest::delete(format!("/v9/projects/{}", id), &auth), &auth)
            .await?;
        Ok(format!("Project {} deleted.", id))
    }

    async fn list_domains(&self, args: &Arguments) -> Result<String, ToolError> {
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        let body = self
            .send(VendorRequest::get(format!("/v9/projects/{}/domains", id), &auth), &auth)
            .await?;
        Ok(format::domains(&body))
    }

    async fn add_domain(&self, args: &Arguments) -> Result<String, ToolError> {
        let domain = path_segment("domain", args.require_str("domain")?)?;
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        let request = VendorRequest::post(
            format!("/v10/projects/{}/domains", id),
            &auth,
            json!({ "name": domain }),
        );
        let body = self.send(request, &auth).await?;
        Ok(format!("Domain added to project {}.\n\n{}", id, format::domain(&body)))
    }

    async fn remove_domain(&self, args: &Arguments) -> Result<String, ToolError> {
        let domain = path_segment("domain", args.require_str("domain")?)?;
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        self.send(
            VendorRequest::delete(format!("/v9/projects/{}/domains/{}", id, domain), &auth),
            &auth,
        )
        .await?;
        Ok(format!("Domain {} removed from project {}.", domain, id))
    }

    async fn list_env_vars(&self, args: &Arguments) -> Result<String, ToolError> {
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        let body = self
            .send(VendorRequest::get(format!("/v9/projects/{}/env", id), &auth), &auth)
            .await?;
        Ok(format::env_vars(&body))
    }

    async fn create_env_var(&self, args: &Arguments) -> Result<String, ToolError> {
        let key = args.require_str("key")?;
        let value = args
            .str("value")
            .ok_or_else(|| ToolError::validation("missing required field `value`"))?;
        let targets = args.string_list("targets");
        if targets.is_empty() {
            return Err(ToolError::validation(
                "field `targets` must list at least one environment",
            ));
        }
        let kind = args.str("type").unwrap_or("encrypted");

        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        let request = VendorRequest::post(
            format!("/v10/projects/{}/env", id),
            &auth,
            json!({ "key": key, "value": value, "target": targets, "type": kind }),
        );
        let body = self.send(request, &auth).await?;
        Ok(format::created_env_vars(&body))
    }

    async fn delete_env_var(&self, args: &Arguments) -> Result<String, ToolError> {
        let env_id = path_segment("env_id", args.require_str("env_id")?)?;
        let project = project_ref(args.require_str("project")?)?;
        let auth = self.credentials.resolve()?;
        let id = self.project_id(project, &auth).await?;
        self.send(
            VendorRequest::delete(format!("/v9/projects/{}/env/{}", id, env_id), &auth),
            &auth,
        )
        .await?;
        Ok(format!("Environment variable {} deleted from project {}.", env_id, id))
    }

    async fn list_teams(&self) -> Result<String, ToolError> {
        let auth = self.credentials.resolve()?;
        let body = self.send(VendorRequest::get("/v2/teams", &auth), &auth).await?;
        Ok(format::teams(&body))
    }
}

#[async_trait]
impl Toolbox for DeployToolbox {
    type Tool = DeployTool;

    async fn execute(&self, tool: DeployTool, args: Arguments) -> Result<String, ToolError> {
        match tool {
            DeployTool::ListDeployments => self.list_deployments(&args).await,
            DeployTool::GetDeployment => self.get_deployment(&args).await,
            DeployTool::CancelDeployment => self.cancel_deployment(&args).await,
            DeployTool::DeleteDeployment => self.delete_deployment(&args).await,
            DeployTool::ListProjects => self.list_projects(&args).await,
            DeployTool::GetProject => self.get_project(&args).await,
            DeployTool::CreateProject => self.create_project(&args).await,
            DeployTool::DeleteProject => self.delete_project(&args).await,
            DeployTool::ListDomains => self.list_domains(&args).await,
            DeployTool::AddDomain => self.add_domain(&args).await,
            DeployTool::RemoveDomain => self.remove_domain(&args).await,
            DeployTool::ListEnvVars => self.list_env_vars(&args).await,
            DeployTool::CreateEnvVar => self.create_env_var(&args).await,
            DeployTool::DeleteEnvVar => self.delete_env_var(&args).await,
            DeployTool::ListTeams => self.list_teams().await,
        }
    }
}
