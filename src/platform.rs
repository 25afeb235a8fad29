//! Runtime platform classification.
//!
//! Configuration records arrive untyped: a `platform` tag may be declared, and
//! either runtime-specific options bag may be present. [`classify`] reduces
//! those signals to a [`Platform`], and [`RuntimeTarget::from_signals`] is the
//! boundary where a record becomes a typed runtime target or is rejected.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocktaskError, Result};

pub const NATIVE_RUNTIME_TAG: &str = "nativeRuntime";
pub const SCRIPTING_RUNTIME_TAG: &str = "scriptingRuntime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    NativeRuntime,
    ScriptingRuntime,
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::NativeRuntime => write!(f, "{}", NATIVE_RUNTIME_TAG),
            Platform::ScriptingRuntime => write!(f, "{}", SCRIPTING_RUNTIME_TAG),
            Platform::Unknown => write!(f, "unknown"),
        }
    }
}

/// Options for compiled managed projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeRuntimeOptions {
    /// Project file; discovered in the workspace root when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_project: Option<PathBuf>,
    /// Built artifact, relative to the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debugger_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectMode {
    #[default]
    Default,
    Break,
}

/// Options for `package.json`-described projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptingRuntimeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspect_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspect_mode: Option<InspectMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_root: Option<String>,
}

impl NativeRuntimeOptions {
    /// These options with every field `overrides` sets taking precedence.
    pub fn overridden_by(&self, overrides: &Self) -> Self {
        Self {
            app_project: overrides.app_project.clone().or_else(|| self.app_project.clone()),
            app_output: overrides.app_output.clone().or_else(|| self.app_output.clone()),
            debugger_path: overrides
                .debugger_path
                .clone()
                .or_else(|| self.debugger_path.clone()),
        }
    }
}

impl ScriptingRuntimeOptions {
    /// These options with every field `overrides` sets taking precedence.
    pub fn overridden_by(&self, overrides: &Self) -> Self {
        Self {
            package: overrides.package.clone().or_else(|| self.package.clone()),
            inspect_port: overrides.inspect_port.or(self.inspect_port),
            inspect_mode: overrides.inspect_mode.or(self.inspect_mode),
            remote_root: overrides.remote_root.clone().or_else(|| self.remote_root.clone()),
        }
    }
}

/// The fields a record exposes to classification.
pub trait PlatformSignals {
    /// Name used in error messages.
    fn display_name(&self) -> &str;
    fn declared_platform(&self) -> Option<&str>;
    fn native_runtime(&self) -> Option<&NativeRuntimeOptions>;
    fn scripting_runtime(&self) -> Option<&ScriptingRuntimeOptions>;
}

pub fn classify<S: PlatformSignals + ?Sized>(record: &S) -> Platform {
    if let Some(tag) = record.declared_platform() {
        return match tag {
            NATIVE_RUNTIME_TAG => Platform::NativeRuntime,
            SCRIPTING_RUNTIME_TAG => Platform::ScriptingRuntime,
            _ => Platform::Unknown,
        };
    }

    match (
        record.native_runtime().is_some(),
        record.scripting_runtime().is_some(),
    ) {
        (true, false) => Platform::NativeRuntime,
        (false, true) => Platform::ScriptingRuntime,
        _ => Platform::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeTarget {
    Native(NativeRuntimeOptions),
    Scripting(ScriptingRuntimeOptions),
}

impl RuntimeTarget {
    pub fn from_signals<S: PlatformSignals + ?Sized>(record: &S) -> Result<Self> {
        match classify(record) {
            Platform::NativeRuntime => Ok(RuntimeTarget::Native(
                record.native_runtime().cloned().unwrap_or_default(),
            )),
            Platform::ScriptingRuntime => Ok(RuntimeTarget::Scripting(
                record.scripting_runtime().cloned().unwrap_or_default(),
            )),
            Platform::Unknown => Err(DocktaskError::UnrecognizedPlatform {
                name: record.display_name().to_string(),
                declared: record.declared_platform().map(str::to_string),
            }),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            RuntimeTarget::Native(_) => Platform::NativeRuntime,
            RuntimeTarget::Scripting(_) => Platform::ScriptingRuntime,
        }
    }

    /// Field-wise overlay of `overrides` on this target. A target on another
    /// platform replaces this one whole.
    pub fn overridden_by(&self, overrides: &RuntimeTarget) -> RuntimeTarget {
        match (self, overrides) {
            (RuntimeTarget::Native(base), RuntimeTarget::Native(over)) => {
                RuntimeTarget::Native(base.overridden_by(over))
            }
            (RuntimeTarget::Scripting(base), RuntimeTarget::Scripting(over)) => {
                RuntimeTarget::Scripting(base.overridden_by(over))
            }
            (_, other) => other.clone(),
        }
    }
}
