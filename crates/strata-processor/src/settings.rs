//! Build settings read back from the generated project

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_core::{LanguageVersion, Version};

use crate::config::Platform;

/// Settings the user may have edited in the generated project and that the
/// next generation must carry over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<LanguageVersion>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

impl ProjectSettings {
    /// Union of extracted and configured platforms, by name. Configured
    /// deployment targets win. Sorted by name.
    pub fn merged_platforms(&self, configured: &[Platform]) -> Vec<Platform> {
        let mut by_name: BTreeMap<&str, &Version> = self
            .platforms
            .iter()
            .map(|p| (p.name.as_str(), &p.deployment_target))
            .collect();
        for platform in configured {
            by_name.insert(platform.name.as_str(), &platform.deployment_target);
        }
        by_name
            .into_iter()
            .map(|(name, deployment_target)| Platform {
                name: name.to_string(),
                deployment_target: deployment_target.clone(),
            })
            .collect()
    }
}
