//! Profile registry.
//!
//! Enumerates the closed set of player-client profiles and resolves the
//! configuration-driven default order. Unknown names in configuration are
//! dropped with a `warn` log, never a fatal error; an empty *resolved*
//! order is the one fatal startup condition (an operator typo'd every
//! entry in `defaultOrder`).

use dlgate_core::model::{ImpersonationTarget, ProfileSpec, QualityCeiling};

/// Returns the closed set of profiles this build knows about, in a fixed
/// canonical order. This is the superset `DefaultOrder()` entries are
/// validated against.
fn known_profiles() -> Vec<ProfileSpec> {
    vec![
        ProfileSpec {
            name: "tv".to_string(),
            quality_ceiling: QualityCeiling::Hd,
            requires_credentials: false,
            impersonation: ImpersonationTarget::Tv,
        },
        ProfileSpec {
            name: "ios".to_string(),
            quality_ceiling: QualityCeiling::Hd,
            requires_credentials: false,
            impersonation: ImpersonationTarget::Ios,
        },
        ProfileSpec {
            name: "android".to_string(),
            quality_ceiling: QualityCeiling::Sd360p,
            requires_credentials: false,
            impersonation: ImpersonationTarget::Android,
        },
        ProfileSpec {
            name: "mweb".to_string(),
            quality_ceiling: QualityCeiling::Sd360p,
            requires_credentials: false,
            impersonation: ImpersonationTarget::MobileWeb,
        },
        ProfileSpec {
            name: "web".to_string(),
            quality_ceiling: QualityCeiling::Hd,
            requires_credentials: false,
            impersonation: ImpersonationTarget::Web,
        },
        ProfileSpec {
            name: "cookies".to_string(),
            quality_ceiling: QualityCeiling::Hd,
            requires_credentials: true,
            impersonation: ImpersonationTarget::Cookies,
        },
    ]
}

/// Holds the closed profile set plus the configuration-resolved default
/// order and default profile name.
pub struct ProfileRegistry {
    profiles: Vec<ProfileSpec>,
    default_order: Vec<String>,
    default_profile: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no recognised profile names in configured default order")]
    EmptyResolvedOrder,
}

impl ProfileRegistry {
    /// Build the registry from raw configuration strings. Unknown names
    /// are dropped with a `warn`; if nothing survives, startup must fail.
    pub fn new(
        raw_default_order: &[String],
        raw_default_profile: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let profiles = known_profiles();

        let default_order: Vec<String> = raw_default_order
            .iter()
            .filter(|name| {
                let known = profiles.iter().any(|p| &p.name == *name);
                if !known {
                    tracing::warn!(profile = %name, "ignoring unknown profile in defaultOrder");
                }
                known
            })
            .cloned()
            .collect();

        if default_order.is_empty() {
            return Err(RegistryError::EmptyResolvedOrder);
        }

        let default_profile = raw_default_profile.and_then(|name| {
            if profiles.iter().any(|p| p.name == name) {
                Some(name.to_string())
            } else {
                tracing::warn!(profile = %name, "ignoring unknown defaultProfile");
                None
            }
        });

        Ok(Self {
            profiles,
            default_order,
            default_profile,
        })
    }

    pub fn list(&self) -> &[ProfileSpec] {
        &self.profiles
    }

    /// Look up a profile by name. Unknown names return `None`, never an
    /// error. Callers (the plan builder) treat an unknown preferred
    /// profile as if none were specified.
    pub fn get(&self, name: &str) -> Option<ProfileSpec> {
        self.profiles.iter().find(|p| p.name == name).cloned()
    }

    /// The configured default order, resolved to specs, in configured
    /// order, with a fresh clone per call (the plan builder needs
    /// ownership).
    pub fn default_order(&self) -> Vec<ProfileSpec> {
        self.default_order
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn default_profile(&self) -> Option<ProfileSpec> {
        self.default_profile.as_deref().and_then(|name| self.get(name))
    }
}
