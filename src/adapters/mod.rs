//! Vendor adapters. Each one is a closed tool enum plus the toolbox that runs it.

pub mod answer;
pub mod deploy;

use std::sync::Arc;

use crate::config::{AdapterKind, Config};
use crate::context::CredentialResolver;
use crate::tools::{Registry, ToolRegistry};
use crate::vendor::VendorApi;

use answer::AnswerToolbox;
use deploy::DeployToolbox;

/// Vendor name shown in error texts.
pub fn vendor_name(kind: AdapterKind) -> &'static str {
    match kind {
        AdapterKind::Answer => "Perplexity",
        AdapterKind::Deploy => "Vercel",
    }
}

/// Server instructions returned from `initialize`.
pub fn instructions(kind: AdapterKind) -> &'static str {
    match kind {
        AdapterKind::Answer => {
            "Web-grounded question answering. Use answer_ask for quick facts, answer_research \
             for in-depth reports, answer_reason for step-by-step problem solving and \
             answer_search for raw search results."
        }
        AdapterKind::Deploy => {
            "Manage deployments, projects, domains and environment variables. Projects can be \
             referenced by id (prj_...) or by exact name."
        }
    }
}

/// Build the tool registry for the configured adapter.
pub fn registry_for(
    config: &Config,
    vendor: Arc<dyn VendorApi>,
) -> anyhow::Result<Arc<dyn ToolRegistry>> {
    let credentials = CredentialResolver::new(
        config.credential_policy,
        config.fallback_credential.clone(),
        config.fallback_scope.clone(),
    );

    Ok(match config.adapter {
        AdapterKind::Answer => Arc::new(Registry::new(AnswerToolbox::new(vendor, credentials))?),
        AdapterKind::Deploy => Arc::new(Registry::new(DeployToolbox::new(vendor, credentials))?),
    })
}
