//! `FallbackPlan` construction and tie-break rules.
//!
//! Kept free of any registry/credential-store types so it can be unit
//! tested here with plain `ProfileSpec` values; the extractor crate's
//! `ProfileRegistry` and `CredentialStore` resolve names/availability and
//! call into this function.

use crate::model::{FallbackPlan, ProfileSpec};

/// Build a plan from an already-resolved preferred profile (`None` if the
/// request didn't name one, or named one the registry doesn't know, in
/// which case it's treated as absent), the configured default order
/// (already resolved, unknown names dropped by the registry), and whether
/// credentials are currently available.
///
/// Credentialled profiles are dropped outright when credentials are
/// unavailable. They are never placed in the plan at all, including as
/// the preferred slot.
pub fn build_plan(
    preferred: Option<ProfileSpec>,
    default_order: &[ProfileSpec],
    credentials_available: bool,
) -> FallbackPlan {
    let mut profiles: Vec<ProfileSpec> = Vec::with_capacity(default_order.len() + 1);

    if let Some(p) = preferred {
        profiles.push(p);
    }
    for p in default_order {
        if !profiles.iter().any(|existing| existing.name == p.name) {
            profiles.push(p.clone());
        }
    }

    profiles.retain(|p| !p.requires_credentials || credentials_available);

    FallbackPlan { profiles }
}
