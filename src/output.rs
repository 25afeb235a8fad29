use clap::ValueEnum;
use serde::Serialize;

use crate::error::Result;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// Pretty-printed JSON documents.
    Json,
}

impl OutputFormat {
    /// Renders `value` as JSON, or with `text` for the text format.
    pub fn render<T, F>(self, value: &T, text: F) -> Result<String>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> String,
    {
        match self {
            OutputFormat::Text => Ok(text(value)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_ignores_text_renderer() {
        let rendered = OutputFormat::Json
            .render(&vec!["docker", "build"], |_| unreachable!())
            .unwrap();
        assert_eq!(rendered, "[\n  \"docker\",\n  \"build\"\n]");
    }

    #[test]
    fn text_uses_renderer() {
        let rendered = OutputFormat::Text
            .render(&vec!["docker", "build"], |v| v.join(" "))
            .unwrap();
        assert_eq!(rendered, "docker build");
    }
}
