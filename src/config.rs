use crate::context::{CredentialPolicy, Precedence};
use std::env;
use std::time::Duration;

/// Which vendor adapter this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Answer/search/reasoning service.
    Answer,
    /// Deployment platform.
    Deploy,
}

impl AdapterKind {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = env::var("MCP_ADAPTER").unwrap_or_else(|_| "answer".to_string());
        Self::parse(&raw).ok_or_else(|| {
            anyhow::anyhow!("Unknown MCP_ADAPTER '{}' (expected 'answer' or 'deploy')", raw)
        })
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "answer" | "search" | "perplexity" => Some(Self::Answer),
            "deploy" | "deployment" | "vercel" => Some(Self::Deploy),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Deploy => "deploy",
        }
    }

    /// Server name reported in the `initialize` handshake.
    pub fn server_name(self) -> &'static str {
        match self {
            Self::Answer => "answer-mcp-server",
            Self::Deploy => "deploy-mcp-server",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Answer => "https://api.perplexity.ai",
            Self::Deploy => "https://api.vercel.com",
        }
    }

    /// Credential precedence this adapter uses unless overridden.
    ///
    /// The answer adapter lets a startup key win over request headers; the deploy
    /// adapter requires per-request tokens on network transports and only uses the
    /// startup token for stdio.
    pub fn default_policy(self) -> CredentialPolicy {
        match self {
            Self::Answer => CredentialPolicy {
                precedence: Precedence::ProcessWide,
                network_fallback: true,
            },
            Self::Deploy => CredentialPolicy {
                precedence: Precedence::PerRequest,
                network_fallback: false,
            },
        }
    }

    pub fn headers(self) -> HeaderProfile {
        match self {
            Self::Answer => HeaderProfile {
                credential_headers: &["x-auth-token"],
                accept_bearer: false,
                scope_header: None,
            },
            Self::Deploy => HeaderProfile {
                credential_headers: &["x-api-token"],
                accept_bearer: true,
                scope_header: Some("x-team-id"),
            },
        }
    }

    fn credential_var(self) -> &'static str {
        match self {
            Self::Answer => "ANSWER_API_KEY",
            Self::Deploy => "DEPLOY_API_TOKEN",
        }
    }

    fn scope_var(self) -> Option<&'static str> {
        match self {
            Self::Answer => None,
            Self::Deploy => Some("DEPLOY_TEAM_ID"),
        }
    }
}

/// Which inbound headers carry the credential and scope for an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderProfile {
    /// Header names checked in order for the credential.
    pub credential_headers: &'static [&'static str],
    /// Also accept `Authorization: Bearer <token>`.
    pub accept_bearer: bool,
    /// Optional header carrying a scoping identifier (e.g. a team id).
    pub scope_header: Option<&'static str>,
}

/// How the server talks to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// HTTP listener serving `/mcp`, `/sse` and `/messages`.
    Http,
    /// Newline-delimited JSON-RPC over stdin/stdout.
    Stdio,
}

impl TransportMode {
    pub fn from_env() -> anyhow::Result<Self> {
        match env::var("MCP_TRANSPORT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "" | "http" | "sse" | "streamable-http" => Ok(Self::Http),
            "stdio" | "pipe" => Ok(Self::Stdio),
            other => Err(anyhow::anyhow!(
                "Unknown MCP_TRANSPORT '{}' (expected 'http' or 'stdio')",
                other
            )),
        }
    }
}

pub struct Config {
    pub adapter: AdapterKind,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Base URL of the vendor REST API.
    pub vendor_base_url: String,
    /// Per-request timeout for vendor calls.
    pub vendor_timeout: Duration,
    /// Startup-time credential used when a request carries none (subject to policy).
    pub fallback_credential: Option<String>,
    /// Startup-time scope paired with `fallback_credential`.
    pub fallback_scope: Option<String>,
    pub credential_policy: CredentialPolicy,
    /// Reply to streamable-HTTP calls with plain JSON instead of a one-event SSE body.
    pub json_response: bool,
    /// Bounded queue depth for each SSE session.
    pub sse_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// `MCP_ADAPTER` picks the adapter and with it the defaults for vendor URL,
    /// credential variable and credential policy. `CREDENTIAL_PRECEDENCE` and
    /// `CREDENTIAL_NETWORK_FALLBACK` override the policy.
    pub fn from_env() -> anyhow::Result<Self> {
        let adapter = AdapterKind::from_env()?;

        let mut credential_policy = adapter.default_policy();
        if let Ok(raw) = env::var("CREDENTIAL_PRECEDENCE") {
            credential_policy.precedence = match raw.to_lowercase().as_str() {
                "process" | "process-wide" | "env" => Precedence::ProcessWide,
                "request" | "per-request" | "header" => Precedence::PerRequest,
                other => anyhow::bail!(
                    "Unknown CREDENTIAL_PRECEDENCE '{}' (expected 'process' or 'request')",
                    other
                ),
            };
        }
        if let Ok(raw) = env::var("CREDENTIAL_NETWORK_FALLBACK") {
            credential_policy.network_fallback = parse_bool(&raw)?;
        }

        Ok(Self {
            adapter,
            transport: TransportMode::from_env()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            vendor_base_url: env::var("VENDOR_BASE_URL")
                .unwrap_or_else(|_| adapter.default_base_url().to_string()),
            vendor_timeout: Duration::from_secs(
                env::var("VENDOR_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
            ),
            fallback_credential: non_empty_var(adapter.credential_var()),
            fallback_scope: adapter.scope_var().and_then(non_empty_var),
            credential_policy,
            json_response: parse_bool(
                &env::var("MCP_JSON_RESPONSE").unwrap_or_else(|_| "true".to_string()),
            )?,
            sse_channel_capacity: env::var("SSE_CHANNEL_CAPACITY")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,
        })
    }

    /// Defaults for `adapter` without consulting the environment.
    pub fn for_adapter(adapter: AdapterKind) -> Self {
        Self {
            adapter,
            transport: TransportMode::Http,
            host: "127.0.0.1".to_string(),
            port: 5000,
            shutdown_timeout_secs: 5,
            vendor_base_url: adapter.default_base_url().to_string(),
            vendor_timeout: Duration::from_secs(120),
            fallback_credential: None,
            fallback_scope: None,
            credential_policy: adapter.default_policy(),
            json_response: true,
            sse_channel_capacity: 64,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("Expected a boolean, got '{}'", other)),
    }
}
