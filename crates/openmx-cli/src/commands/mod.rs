//! CLI subcommands

pub mod attributes;
pub mod info;
pub mod invoke;
pub mod list;
pub mod watch;

use anyhow::{anyhow, Context};
use openmx_engine::{BeanKind, DynamicBean, ObjectName, Platform};
use std::sync::Arc;

/// Find a bean by object name, or by kind for single-bean kinds
pub fn resolve(platform: &Platform, target: &str) -> anyhow::Result<Arc<dyn DynamicBean>> {
    if let Ok(kind) = target.parse::<BeanKind>() {
        return platform
            .get(kind)
            .ok_or_else(|| anyhow!("`{}` names several beans or none; use an object name", kind));
    }
    let name = ObjectName::parse(target)
        .with_context(|| format!("`{}` is neither a bean kind nor an object name", target))?;
    platform
        .find(&name)
        .ok_or_else(|| anyhow!("no bean named {}", name))
}

/// Display name of a bean
pub fn display_name(bean: &dyn DynamicBean) -> String {
    bean.object_name()
        .map(ObjectName::canonical)
        .unwrap_or_else(|| format!("<unnamed {}>", bean.descriptor().interface()))
}
