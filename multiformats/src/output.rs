//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use multiformats_core::{Cid, MultiAddress, MultiHash};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error chain directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `hash` command.
#[derive(Debug, Serialize)]
pub struct HashOutput {
    pub success: bool,
    pub result_code: u8,
    pub multihash: MultiHash,
    pub algorithm: String,
    pub digest: String,
    pub cid: Cid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// Output for `cid inspect` and `cid convert` commands.
#[derive(Debug, Serialize)]
pub struct CidOutput {
    pub success: bool,
    pub result_code: u8,
    pub cid: Cid,
    pub version: u64,
    pub content_type: String,
    pub encoding: String,
    pub multihash: MultiHash,
    pub hash_algorithm: String,
    pub digest: String,
    pub bytes: String,
}

/// Output for `base encode` command.
#[derive(Debug, Serialize)]
pub struct BaseEncodeOutput {
    pub success: bool,
    pub result_code: u8,
    pub encoding: String,
    pub text: String,
}

/// Output for `base decode` command.
#[derive(Debug, Serialize)]
pub struct BaseDecodeOutput {
    pub success: bool,
    pub result_code: u8,
    pub encoding: String,
    pub length: usize,
    pub bytes: String,
}

/// One component of a multiaddress.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub protocol: String,
    pub code: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Output for `addr` command.
#[derive(Debug, Serialize)]
pub struct AddrOutput {
    pub success: bool,
    pub result_code: u8,
    pub address: MultiAddress,
    pub components: Vec<ComponentInfo>,
    pub bytes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<MultiHash>,
}

/// Link information for `dag` commands.
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    pub name: Option<String>,
    pub id: Cid,
    pub size: u64,
}

/// Output for `dag build` and `dag inspect` commands.
#[derive(Debug, Serialize)]
pub struct DagOutput {
    pub success: bool,
    pub result_code: u8,
    pub id: Cid,
    pub size: u64,
    pub hashing_algorithm: String,
    pub data_length: usize,
    pub links: Vec<LinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<String>,
}

/// Registry entry information for `algorithms` command.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmInfo {
    pub kind: String,
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Output for `algorithms` command.
#[derive(Debug, Serialize)]
pub struct AlgorithmsOutput {
    pub success: bool,
    pub result_code: u8,
    pub algorithms: Vec<AlgorithmInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_output_shape() {
        let output = ErrorOutput {
            success: false,
            result_code: 1,
            error: "Unknown hashing algorithm: nope".into(),
        };
        let value: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["result_code"], 1);
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let hash = MultiHash::compute(b"hello world", "sha2-256").unwrap();
        let output = HashOutput {
            success: true,
            result_code: 0,
            cid: Cid::from_multihash(hash.clone()).unwrap(),
            algorithm: hash.algorithm().name().to_string(),
            digest: "b94d27b9".into(),
            multihash: hash,
            verified: None,
        };
        let value: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(
            value["multihash"],
            "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4"
        );
        assert_eq!(value["cid"], value["multihash"]);
        assert!(value.get("verified").is_none());
    }

    #[test]
    fn test_component_without_value_omits_field() {
        let info = ComponentInfo {
            protocol: "https".into(),
            code: 443,
            value: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"protocol":"https","code":443}"#);
    }
}
