//! Request-scoped credential propagation.
//!
//! Each inbound call runs inside [`establish`], which binds a [`RequestContext`]
//! to the tokio task-local slot for the duration of that future. Code deep inside
//! a tool executor asks [`current`] for it instead of receiving it through every
//! signature. The binding follows the future across `.await` points and is never
//! visible to other tasks, so concurrent requests cannot observe each other's
//! credentials.

use std::future::Future;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::config::HeaderProfile;
use crate::error::ToolError;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Which transport style delivered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Sse,
    StreamableHttp,
}

impl TransportKind {
    pub fn is_network(self) -> bool {
        !matches!(self, TransportKind::Stdio)
    }
}

/// Per-request credential and optional scoping parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestContext {
    credential: Option<String>,
    scope: Option<String>,
    transport: TransportKind,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("has_credential", &self.credential.is_some())
            .field("scope", &self.scope)
            .field("transport", &self.transport)
            .finish()
    }
}

impl RequestContext {
    pub fn new(transport: TransportKind) -> Self {
        Self {
            credential: None,
            scope: None,
            transport,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = non_blank(credential.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = non_blank(scope.into());
        self
    }

    /// Build a context from inbound HTTP headers according to the adapter's header profile.
    pub fn from_headers(
        headers: &HeaderMap,
        profile: &HeaderProfile,
        transport: TransportKind,
    ) -> Self {
        let mut credential = profile
            .credential_headers
            .iter()
            .find_map(|name| header_value(headers, name));

        if credential.is_none() && profile.accept_bearer {
            credential = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| {
                    v.strip_prefix("Bearer ")
                        .or_else(|| v.strip_prefix("bearer "))
                })
                .and_then(|v| non_blank(v.to_string()));
        }

        let scope = profile
            .scope_header
            .and_then(|name| header_value(headers, name));

        Self {
            credential,
            scope,
            transport,
        }
    }

    /// Fill in whatever this context lacks from `base`, keeping the transport.
    ///
    /// Used for SSE, where each posted message may carry fresh headers but falls
    /// back to what was sent when the stream was opened.
    pub fn or_inherit(self, base: &RequestContext) -> Self {
        if self.credential.is_some() {
            return self;
        }
        Self {
            credential: base.credential.clone(),
            scope: self.scope.or_else(|| base.scope.clone()),
            transport: self.transport,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| non_blank(v.to_string()))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// Run `body` with `ctx` as the current context.
pub async fn establish<F>(ctx: RequestContext, body: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, body).await
}

/// The context of the calling task, or `None` outside any [`establish`] scope.
pub fn current() -> Option<RequestContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

/// Which credential wins when both a startup one and a per-request one exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    ProcessWide,
    PerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub precedence: Precedence,
    /// Whether network transports may fall back to the startup credential.
    /// Stdio may always use it.
    pub network_fallback: bool,
}

/// Credential and scope an outbound vendor call should use.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedAuth {
    pub token: String,
    pub scope: Option<String>,
}

impl std::fmt::Debug for ResolvedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAuth")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Applies an adapter's [`CredentialPolicy`] to the current context.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    policy: CredentialPolicy,
    fallback_credential: Option<String>,
    fallback_scope: Option<String>,
}

impl CredentialResolver {
    pub fn new(
        policy: CredentialPolicy,
        fallback_credential: Option<String>,
        fallback_scope: Option<String>,
    ) -> Self {
        Self {
            policy,
            fallback_credential: fallback_credential.and_then(non_blank),
            fallback_scope: fallback_scope.and_then(non_blank),
        }
    }

    /// Resolve against the calling task's context.
    pub fn resolve(&self) -> Result<ResolvedAuth, ToolError> {
        self.resolve_with(current().as_ref())
    }

    /// Resolve against an explicit context.
    pub fn resolve_with(&self, ctx: Option<&RequestContext>) -> Result<ResolvedAuth, ToolError> {
        let from_request = ctx.and_then(|c| {
            c.credential.as_ref().map(|token| ResolvedAuth {
                token: token.clone(),
                scope: c.scope.clone(),
            })
        });

        let fallback_allowed = match ctx {
            None => true,
            Some(c) => !c.transport.is_network() || self.policy.network_fallback,
        };
        let from_process = self
            .fallback_credential
            .as_ref()
            .filter(|_| fallback_allowed)
            .map(|token| ResolvedAuth {
                token: token.clone(),
                scope: self.fallback_scope.clone(),
            });

        let resolved = match self.policy.precedence {
            Precedence::ProcessWide => from_process.or(from_request),
            Precedence::PerRequest => from_request.or(from_process),
        };

        resolved.ok_or(ToolError::AuthMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    const PROCESS_FIRST: CredentialPolicy = CredentialPolicy {
        precedence: Precedence::ProcessWide,
        network_fallback: true,
    };

    const REQUEST_ONLY_ON_NETWORK: CredentialPolicy = CredentialPolicy {
        precedence: Precedence::PerRequest,
        network_fallback: false,
    };

    fn http_ctx(token: &str) -> RequestContext {
        RequestContext::new(TransportKind::StreamableHttp)
            .with_credential(token)
            .with_scope("team_req")
    }

    #[test]
    fn process_wide_wins_when_both_present() {
        let resolver = CredentialResolver::new(PROCESS_FIRST, Some("env-key".into()), None);
        let auth = resolver.resolve_with(Some(&http_ctx("hdr-key"))).unwrap();
        assert_eq!(auth.token, "env-key");
    }

    #[test]
    fn per_request_wins_when_both_present() {
        let resolver = CredentialResolver::new(
            CredentialPolicy {
                precedence: Precedence::PerRequest,
                network_fallback: true,
            },
            Some("env-key".into()),
            Some("team_env".into()),
        );
        let auth = resolver.resolve_with(Some(&http_ctx("hdr-key"))).unwrap();
        assert_eq!(auth.token, "hdr-key");
        assert_eq!(auth.scope.as_deref(), Some("team_req"));
    }

    #[test]
    fn network_request_without_header_is_rejected_when_fallback_disabled() {
        let resolver =
            CredentialResolver::new(REQUEST_ONLY_ON_NETWORK, Some("env-token".into()), None);
        let ctx = RequestContext::new(TransportKind::Sse);
        assert_eq!(resolver.resolve_with(Some(&ctx)), Err(ToolError::AuthMissing));
    }

    #[test]
    fn stdio_uses_fallback_even_when_network_fallback_disabled() {
        let resolver = CredentialResolver::new(
            REQUEST_ONLY_ON_NETWORK,
            Some("env-token".into()),
            Some("team_env".into()),
        );
        let ctx = RequestContext::new(TransportKind::Stdio);
        let auth = resolver.resolve_with(Some(&ctx)).unwrap();
        assert_eq!(auth.token, "env-token");
        assert_eq!(auth.scope.as_deref(), Some("team_env"));
    }

    #[test]
    fn no_context_falls_back_or_fails() {
        let with = CredentialResolver::new(REQUEST_ONLY_ON_NETWORK, Some("env".into()), None);
        let without = CredentialResolver::new(PROCESS_FIRST, None, None);

        assert_eq!(with.resolve_with(None).unwrap().token, "env");
        assert_eq!(without.resolve_with(None), Err(ToolError::AuthMissing));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let resolver = CredentialResolver::new(PROCESS_FIRST, Some("   ".into()), None);
        let ctx = RequestContext::new(TransportKind::StreamableHttp).with_credential("  ");
        assert_eq!(resolver.resolve_with(Some(&ctx)), Err(ToolError::AuthMissing));
    }

    #[test]
    fn headers_are_read_per_profile() {
        let profile = crate::config::AdapterKind::Deploy.headers();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok_123"));
        headers.insert("x-team-id", HeaderValue::from_static("team_abc"));

        let ctx = RequestContext::from_headers(&headers, &profile, TransportKind::StreamableHttp);
        assert_eq!(ctx.credential(), Some("tok_123"));
        assert_eq!(ctx.scope(), Some("team_abc"));

        headers.insert("x-api-token", HeaderValue::from_static("tok_header"));
        let ctx = RequestContext::from_headers(&headers, &profile, TransportKind::StreamableHttp);
        assert_eq!(ctx.credential(), Some("tok_header"));
    }

    #[test]
    fn bearer_ignored_when_profile_disallows_it() {
        let profile = crate::config::AdapterKind::Answer.headers();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer nope"));

        let ctx = RequestContext::from_headers(&headers, &profile, TransportKind::Sse);
        assert_eq!(ctx.credential(), None);
    }

    #[test]
    fn inherit_only_fills_missing_credential() {
        let base = RequestContext::new(TransportKind::Sse)
            .with_credential("opened-with")
            .with_scope("team_open");

        let fresh = RequestContext::new(TransportKind::Sse).with_credential("rotated");
        assert_eq!(fresh.or_inherit(&base).credential(), Some("rotated"));

        let bare = RequestContext::new(TransportKind::Sse);
        let merged = bare.or_inherit(&base);
        assert_eq!(merged.credential(), Some("opened-with"));
        assert_eq!(merged.scope(), Some("team_open"));
    }

    #[tokio::test]
    async fn context_survives_await_and_stays_local() {
        assert!(current().is_none());

        let a = establish(http_ctx("a"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            current().and_then(|c| c.credential().map(str::to_string))
        });
        let b = establish(http_ctx("b"), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            current().and_then(|c| c.credential().map(str::to_string))
        });

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.as_deref(), Some("a"));
        assert_eq!(b.as_deref(), Some("b"));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_context() {
        let seen = establish(http_ctx("outer"), async {
            tokio::spawn(async { current().is_some() }).await.unwrap()
        })
        .await;
        assert!(!seen);
    }
}
