//! Per-platform option inference.
//!
//! Resolvers borrow the declared options and return new, fully populated
//! values. Explicitly declared fields always survive unchanged; inference only
//! fills the gaps.

pub mod native;
pub mod scripting;

pub use native::NativeResolver;
pub use scripting::ScriptingResolver;

use async_trait::async_trait;

use crate::{
    debug::DebugLaunch,
    error::Result,
    options::{BuildOptions, RunOptions},
    platform::RuntimeTarget,
    task::WorkspaceFolder,
};

pub const DEFAULT_OS: &str = "Linux";
const FALLBACK_IMAGE_NAME: &str = "image";

#[async_trait]
pub trait OptionResolver: Send + Sync {
    type RuntimeOptions: Send + Sync;

    /// Tag appended to inferred image names.
    fn default_tag_suffix(&self) -> &'static str;

    async fn resolve_build_options(
        &self,
        folder: &WorkspaceFolder,
        partial: &BuildOptions,
        runtime: &Self::RuntimeOptions,
    ) -> Result<BuildOptions>;

    async fn resolve_run_options(
        &self,
        folder: &WorkspaceFolder,
        partial: &RunOptions,
        runtime: &Self::RuntimeOptions,
        bound_build: Option<&BuildOptions>,
    ) -> Result<RunOptions>;

    /// Describes how a debugger reaches the program running in the container
    /// described by `run`.
    async fn resolve_debug_launch(
        &self,
        folder: &WorkspaceFolder,
        runtime: &Self::RuntimeOptions,
        run: &RunOptions,
    ) -> Result<DebugLaunch>;
}

pub async fn resolve_build_options(
    folder: &WorkspaceFolder,
    target: &RuntimeTarget,
    partial: &BuildOptions,
) -> Result<BuildOptions> {
    match target {
        RuntimeTarget::Native(options) => {
            NativeResolver
                .resolve_build_options(folder, partial, options)
                .await
        }
        RuntimeTarget::Scripting(options) => {
            ScriptingResolver
                .resolve_build_options(folder, partial, options)
                .await
        }
    }
}

pub async fn resolve_run_options(
    folder: &WorkspaceFolder,
    target: &RuntimeTarget,
    partial: &RunOptions,
    bound_build: Option<&BuildOptions>,
) -> Result<RunOptions> {
    match target {
        RuntimeTarget::Native(options) => {
            NativeResolver
                .resolve_run_options(folder, partial, options, bound_build)
                .await
        }
        RuntimeTarget::Scripting(options) => {
            ScriptingResolver
                .resolve_run_options(folder, partial, options, bound_build)
                .await
        }
    }
}

pub async fn resolve_debug_launch(
    folder: &WorkspaceFolder,
    target: &RuntimeTarget,
    run: &RunOptions,
) -> Result<DebugLaunch> {
    match target {
        RuntimeTarget::Native(options) => {
            NativeResolver
                .resolve_debug_launch(folder, options, run)
                .await
        }
        RuntimeTarget::Scripting(options) => {
            ScriptingResolver
                .resolve_debug_launch(folder, options, run)
                .await
        }
    }
}

pub fn default_tag_suffix(target: &RuntimeTarget) -> &'static str {
    match target {
        RuntimeTarget::Native(_) => NativeResolver.default_tag_suffix(),
        RuntimeTarget::Scripting(_) => ScriptingResolver.default_tag_suffix(),
    }
}

/// Lowercased alphanumerics of `hint`, or `image` when nothing survives,
/// tagged with `suffix`.
pub fn default_image_name(hint: &str, suffix: &str) -> String {
    let sanitized: String = hint
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let name: &str = if sanitized.is_empty() {
        FALLBACK_IMAGE_NAME
    } else {
        &sanitized
    };

    format!("{}:{}", name, suffix)
}

/// Explicit image, then the bound build tag, then a name derived from `hint`.
pub fn infer_image_name(
    explicit: Option<&str>,
    bound_tag: Option<&str>,
    hint: &str,
    suffix: &str,
) -> String {
    explicit
        .filter(|image| !image.is_empty())
        .or_else(|| bound_tag.filter(|tag| !tag.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| default_image_name(hint, suffix))
}

/// `registry/app:dev` becomes `registry-app-dev`.
pub fn default_container_name(image: &str) -> String {
    image.replace(['/', ':'], "-")
}

/// The fields every platform fills the same way.
pub(crate) fn resolve_common_run_options(
    folder: &WorkspaceFolder,
    partial: &RunOptions,
    bound_build: Option<&BuildOptions>,
    suffix: &str,
) -> RunOptions {
    let mut resolved = partial.clone();

    let image = infer_image_name(
        partial.image.as_deref(),
        bound_build.and_then(|b| b.tag.as_deref()),
        &folder.name,
        suffix,
    );

    if resolved
        .container_name
        .as_deref()
        .is_none_or(str::is_empty)
    {
        resolved.container_name = Some(default_container_name(&image));
    }
    resolved.image = Some(image);

    if resolved.os.is_none() {
        resolved.os = Some(DEFAULT_OS.to_string());
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_image_name_strips_and_lowercases() {
        assert_eq!(default_image_name("My App!", "latest"), "myapp:latest");
        assert_eq!(default_image_name("api-server_2", "dev"), "apiserver2:dev");
    }

    #[test]
    fn default_image_name_falls_back_when_nothing_survives() {
        assert_eq!(default_image_name("!!! ", "latest"), "image:latest");
        assert_eq!(default_image_name("", "latest"), "image:latest");
    }

    #[test]
    fn infer_image_name_precedence() {
        assert_eq!(infer_image_name(Some("x"), Some("y"), "z", "latest"), "x");
        assert_eq!(infer_image_name(None, Some("y"), "z", "latest"), "y");
        assert_eq!(infer_image_name(None, None, "z", "latest"), "z:latest");
        assert_eq!(infer_image_name(Some(""), Some(""), "z", "latest"), "z:latest");
    }

    #[test]
    fn container_name_replaces_separators() {
        assert_eq!(default_container_name("myapp:dev"), "myapp-dev");
        assert_eq!(
            default_container_name("registry.local/team/app:1.0"),
            "registry.local-team-app-1.0"
        );
    }

    #[test]
    fn common_run_options_keep_explicit_values() {
        let folder = WorkspaceFolder {
            name: "shop".to_string(),
            path: "/work/shop".into(),
        };
        let partial = RunOptions {
            container_name: Some("custom".to_string()),
            os: Some("Windows".to_string()),
            ..Default::default()
        };
        let build = BuildOptions {
            tag: Some("shop:v2".to_string()),
            ..Default::default()
        };

        let resolved = resolve_common_run_options(&folder, &partial, Some(&build), "dev");
        assert_eq!(resolved.image.as_deref(), Some("shop:v2"));
        assert_eq!(resolved.container_name.as_deref(), Some("custom"));
        assert_eq!(resolved.os.as_deref(), Some("Windows"));

        let resolved = resolve_common_run_options(&folder, &RunOptions::default(), None, "dev");
        assert_eq!(resolved.image.as_deref(), Some("shop:dev"));
        assert_eq!(resolved.container_name.as_deref(), Some("shop-dev"));
        assert_eq!(resolved.os.as_deref(), Some(DEFAULT_OS));
    }
}
