//! Ordered, shell-quoted command line construction.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const SHELL_SPECIAL: &[char] = &[
    '"', '\'', '\\', '$', '`', '&', '|', ';', '<', '>', '(', ')', '*', '?', '[', ']', '{', '}',
    '!', '#', '~',
];

/// Extra arguments appended after the image: either a raw string split on
/// whitespace or an already tokenized list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandArgs {
    Line(String),
    Tokens(Vec<String>),
}

impl CommandArgs {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandArgs::Line(line) => line.trim().is_empty(),
            CommandArgs::Tokens(tokens) => tokens.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

impl Serialize for CommandLine {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tokens.serialize(serializer)
    }
}

pub struct CommandLineBuilder {
    tokens: Vec<String>,
}

impl CommandLineBuilder {
    pub fn create(executable: &str, leading_args: &[&str]) -> Self {
        let mut tokens = Vec::with_capacity(leading_args.len() + 1);
        tokens.push(quote(executable));
        tokens.extend(leading_args.iter().map(|arg| quote(arg)));
        Self { tokens }
    }

    pub fn with_flag_arg(mut self, flag: &str, present: bool) -> Self {
        if present {
            self.tokens.push(flag.to_string());
        }
        self
    }

    pub fn with_named_arg(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.tokens.push(name.to_string());
            self.tokens.push(quote(value));
        }
        self
    }

    pub fn with_key_value_args(
        mut self,
        flag: &str,
        values: Option<&IndexMap<String, String>>,
    ) -> Self {
        for (key, value) in values.into_iter().flatten() {
            self.tokens.push(flag.to_string());
            self.tokens.push(quote(&format!("{}={}", key, value)));
        }
        self
    }

    pub fn with_array_args<T, F>(mut self, flag: &str, items: Option<&[T]>, formatter: F) -> Self
    where
        F: Fn(&T) -> String,
    {
        for item in items.into_iter().flatten() {
            self.tokens.push(flag.to_string());
            self.tokens.push(quote(&formatter(item)));
        }
        self
    }

    pub fn with_quoted_arg(mut self, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.tokens.push(quote(value));
        }
        self
    }

    pub fn with_args(mut self, args: Option<&CommandArgs>) -> Self {
        match args {
            Some(CommandArgs::Line(line)) => {
                self.tokens.extend(line.split_whitespace().map(str::to_string));
            }
            Some(CommandArgs::Tokens(tokens)) => {
                self.tokens.extend(tokens.iter().cloned());
            }
            None => {}
        }
        self
    }

    pub fn build(self) -> CommandLine {
        CommandLine {
            tokens: self.tokens,
        }
    }
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || SHELL_SPECIAL.contains(&c))
}

/// Double-quotes `value` when the shell would otherwise split or expand it.
pub fn quote(value: &str) -> String {
    if !needs_quoting(value) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CommandLineBuilder {
        CommandLineBuilder::create("docker", &["build", "--rm"])
    }

    #[test]
    fn executable_is_first_token() {
        let line = base().with_quoted_arg(Some(".")).build();
        assert_eq!(line.tokens()[0], "docker");
        assert_eq!(line.to_string(), "docker build --rm .");
    }

    #[test]
    fn flag_presence_differs_by_exactly_one_token() {
        let with_pull = base()
            .with_flag_arg("--pull", true)
            .with_named_arg("-t", Some("app:dev"))
            .build();
        let without_pull = base()
            .with_flag_arg("--pull", false)
            .with_named_arg("-t", Some("app:dev"))
            .build();

        assert_eq!(with_pull.tokens().len(), without_pull.tokens().len() + 1);
        let mut stripped = with_pull.tokens().to_vec();
        stripped.retain(|t| t != "--pull");
        assert_eq!(stripped, without_pull.tokens());
    }

    #[test]
    fn key_value_args_keep_insertion_order() {
        let mut args = IndexMap::new();
        args.insert("B".to_string(), "2".to_string());
        args.insert("A".to_string(), "1".to_string());

        let line = CommandLineBuilder::create("docker", &[])
            .with_key_value_args("--build-arg", Some(&args))
            .build();
        assert_eq!(line.to_string(), "docker --build-arg B=2 --build-arg A=1");

        let mut ordered = IndexMap::new();
        ordered.insert("A".to_string(), "1".to_string());
        ordered.insert("B".to_string(), "2".to_string());
        let line = CommandLineBuilder::create("docker", &[])
            .with_key_value_args("--build-arg", Some(&ordered))
            .build();
        assert_eq!(line.to_string(), "docker --build-arg A=1 --build-arg B=2");
    }

    #[test]
    fn empty_named_values_are_skipped() {
        let line = base()
            .with_named_arg("-f", Some(""))
            .with_named_arg("--target", None)
            .with_quoted_arg(None)
            .build();
        assert_eq!(line.tokens(), ["docker", "build", "--rm"]);
    }

    #[test]
    fn values_with_whitespace_are_quoted_individually() {
        let line = base()
            .with_named_arg("-f", Some("/my files/Dockerfile"))
            .with_named_arg("-t", Some("app:dev"))
            .with_quoted_arg(Some("/my files"))
            .build();
        assert_eq!(
            line.tokens(),
            [
                "docker",
                "build",
                "--rm",
                "-f",
                "\"/my files/Dockerfile\"",
                "-t",
                "app:dev",
                "\"/my files\""
            ]
        );
    }

    #[test]
    fn quoting_escapes_expansion_characters() {
        assert_eq!(quote("plain-value_1.0"), "plain-value_1.0");
        assert_eq!(quote("A=$HOME"), "\"A=\\$HOME\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn array_args_use_formatter_in_list_order() {
        let ports = vec![(80u16, 8080u16), (443, 8443)];
        let line = CommandLineBuilder::create("docker", &["run"])
            .with_array_args("-p", Some(ports.as_slice()), |(host, container)| {
                format!("{}:{}", host, container)
            })
            .build();
        assert_eq!(line.to_string(), "docker run -p 80:8080 -p 443:8443");
    }

    #[test]
    fn args_split_line_but_keep_tokens_verbatim() {
        let line = CommandLineBuilder::create("docker", &["run"])
            .with_args(Some(&CommandArgs::Line("  node   index.js ".to_string())))
            .build();
        assert_eq!(line.tokens(), ["docker", "run", "node", "index.js"]);

        let line = CommandLineBuilder::create("docker", &["run"])
            .with_args(Some(&CommandArgs::Tokens(vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo a b".to_string(),
            ])))
            .build();
        assert_eq!(line.tokens(), ["docker", "run", "sh", "-c", "echo a b"]);
    }
}
