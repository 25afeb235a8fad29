//! Runtime-agnostic `docker build` / `docker run` option bags.
//!
//! Every field is optional; an absent field means the corresponding flag is
//! not emitted.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::command_line::CommandArgs;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<ExtraHost>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<PortMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports_publish_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<VolumeMapping>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraHost {
    pub hostname: String,
    pub ip: String,
}

impl ExtraHost {
    pub fn to_arg(&self) -> String {
        format!("{}:{}", self.hostname, self.ip)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl PortMapping {
    /// `[host:]container[/protocol]`
    pub fn to_arg(&self) -> String {
        let mut arg = String::new();
        if let Some(host_port) = self.host_port {
            arg.push_str(&format!("{}:", host_port));
        }
        arg.push_str(&self.container_port.to_string());
        if let Some(protocol) = self.protocol.as_deref().filter(|p| !p.is_empty()) {
            arg.push('/');
            arg.push_str(protocol);
        }
        arg
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMapping {
    pub local_path: String,
    pub container_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl VolumeMapping {
    pub fn to_arg(&self) -> String {
        match self.permissions.as_deref().filter(|p| !p.is_empty()) {
            Some(permissions) => format!(
                "{}:{}:{}",
                self.local_path, self.container_path, permissions
            ),
            None => format!("{}:{}", self.local_path, self.container_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_mapping_formats_optional_parts() {
        let bare = PortMapping {
            host_port: None,
            container_port: 9229,
            protocol: None,
        };
        assert_eq!(bare.to_arg(), "9229");

        let full = PortMapping {
            host_port: Some(5353),
            container_port: 53,
            protocol: Some("udp".to_string()),
        };
        assert_eq!(full.to_arg(), "5353:53/udp");
    }

    #[test]
    fn volume_mapping_appends_permissions() {
        let volume = VolumeMapping {
            local_path: "/work".to_string(),
            container_path: "/src".to_string(),
            permissions: Some("ro".to_string()),
        };
        assert_eq!(volume.to_arg(), "/work:/src:ro");
    }

    #[test]
    fn run_options_parse_camel_case_keys() {
        let options: RunOptions = serde_json::from_str(
            r#"{
                "containerName": "api",
                "portsPublishAll": true,
                "envFiles": ["a.env", "b.env"],
                "command": ["npm", "start"],
                "extraHosts": [{ "hostname": "db", "ip": "10.0.0.2" }]
            }"#,
        )
        .unwrap();

        assert_eq!(options.container_name.as_deref(), Some("api"));
        assert_eq!(options.ports_publish_all, Some(true));
        assert_eq!(options.env_files.unwrap(), vec!["a.env", "b.env"]);
        assert_eq!(
            options.command,
            Some(CommandArgs::Tokens(vec!["npm".to_string(), "start".to_string()]))
        );
        assert_eq!(options.extra_hosts.unwrap()[0].to_arg(), "db:10.0.0.2");
    }
}
