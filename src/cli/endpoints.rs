//! Endpoint list files
//!
//! ```toml
//! [[endpoints]]
//! id = "a"
//! host = "10.0.0.1"
//! port = 20880
//! attributes = { region = "hangzhou" }
//! ```

use crate::endpoint::{Endpoint, Pool};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct EndpointsFile {
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

/// Parse an endpoint list, keeping file order.
pub fn parse_endpoints(content: &str) -> Result<Pool, Box<dyn std::error::Error>> {
    let file: EndpointsFile = toml::from_str(content)?;
    Ok(file.endpoints.into_iter().map(Arc::new).collect())
}

/// Read an endpoint list from disk.
pub fn load_endpoints(path: &Path) -> Result<Pool, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read endpoints {}: {}", path.display(), e))?;
    parse_endpoints(&content)
}
