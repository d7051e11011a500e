//! AWS Bedrock model-id heuristics
//!
//! Bedrock model ids look like `[region.]vendor.model-name[:version]`, e.g.
//! `us.anthropic.claude-3-5-sonnet-20241022-v2:0`. Prompt caching is only
//! offered for a handful of model families, so support is decided by
//! matching the normalised id against a known list.

use std::collections::HashSet;

/// Cross-region inference profile prefixes
const REGIONAL_PREFIXES: &[&str] = &["us", "eu", "ap", "apac", "ca", "jp", "au", "us-gov"];

/// Vendors that can be inferred from a model id
const KNOWN_VENDORS: &[&str] = &[
    "anthropic",
    "amazon",
    "meta",
    "mistral",
    "cohere",
    "ai21",
    "deepseek",
];

const CACHE_SUPPORTED_MODELS: &[&str] = &[
    "anthropic.claude-3-5-sonnet-20241022-v2:0",
    "anthropic.claude-3-5-haiku-20241022-v1:0",
    "anthropic.claude-3-7-sonnet-20250219-v1:0",
    "anthropic.claude-sonnet-4-20250514-v1:0",
    "anthropic.claude-opus-4-20250514-v1:0",
    "amazon.nova-micro-v1:0",
    "amazon.nova-lite-v1:0",
    "amazon.nova-pro-v1:0",
    "us.amazon.nova-premier-v1:0",
];

/// Model ids known to support prompt caching
pub fn cache_supported_models() -> HashSet<&'static str> {
    CACHE_SUPPORTED_MODELS.iter().copied().collect()
}

/// Strip the regional prefix and the `:N` version suffix
pub fn normalize_model_id(model_id: &str) -> String {
    let mut id = model_id.trim();

    if let Some((prefix, rest)) = id.split_once('.') {
        if REGIONAL_PREFIXES.contains(&prefix) && rest.contains('.') {
            id = rest;
        }
    }

    if let Some((base, version)) = id.rsplit_once(':') {
        if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
            id = base;
        }
    }

    id.to_string()
}

/// Whether prompt caching is available for `model_id`
///
/// Matches on the normalised id. A shorter id matches a supported one only
/// when the part it leaves off is date/version segments, so
/// `anthropic.claude-3-5-sonnet-20241022` resolves but `amazon.nova` does not.
pub fn is_cache_supported(model_id: &str) -> bool {
    let normalized = normalize_model_id(model_id);
    if normalized.is_empty() {
        return false;
    }

    CACHE_SUPPORTED_MODELS.iter().any(|supported| {
        let supported = normalize_model_id(supported);
        supported == normalized
            || drops_only_version(&normalized, &supported)
            || extends_at_boundary(&normalized, &supported)
    })
}

/// `full` is `partial` followed by `-`-separated date/version segments
fn drops_only_version(partial: &str, full: &str) -> bool {
    full.strip_prefix(partial)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|rest| rest.split('-').all(is_version_segment))
}

/// `id` is `supported` with a further `-` or `:` suffix
fn extends_at_boundary(id: &str, supported: &str) -> bool {
    id.strip_prefix(supported)
        .is_some_and(|rest| rest.starts_with('-') || rest.starts_with(':'))
}

fn is_version_segment(segment: &str) -> bool {
    let digits = segment.strip_prefix('v').unwrap_or(segment);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Vendor of a model id (`anthropic`, `amazon`, ...), if recognised
pub fn infer_provider(model_id: &str) -> Option<&'static str> {
    let normalized = normalize_model_id(model_id);
    let (vendor, _) = normalized.split_once('.')?;
    KNOWN_VENDORS.iter().copied().find(|known| *known == vendor)
}
