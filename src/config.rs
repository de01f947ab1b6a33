/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! JSON configuration file loading. A
//! missing file is not an error — built-in defaults apply, mirroring the
//! teacher's tolerant treatment of optional inputs; a present-but-malformed
//! file is a `ConfigError`. CLI flags always take precedence over whatever
//! a loaded `Config` carries.

use std::path::Path;

use serde::Deserialize;

use crate::assembler::encoder::Endianness;
use crate::errors::{AssemblyError, ErrorKind, SourceLocation};
use crate::file_reader::FileReader;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchitectureConfig {
    pub endianness: String,
    pub word_size: u32,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            endianness: "little".to_string(),
            word_size: 32,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub instruction_set: Option<String>,
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub generate_lst: bool,
    pub generate_bin: bool,
    pub generate_hex: bool,
    pub generate_map: bool,
    pub enable_macros: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            generate_lst: false,
            generate_bin: true,
            generate_hex: false,
            generate_map: false,
            enable_macros: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub architecture: ArchitectureConfig,
    pub paths: PathsConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Loads a config from `path` using `reader`. A missing file yields the
    /// default configuration rather than an error; a present
    /// file that fails to parse as JSON is `ConfigError`.
    pub fn load<F: FileReader>(reader: &F, path: &Path) -> Result<Config, AssemblyError> {
        let text = match reader.read_to_string(path) {
            Ok(t) => t,
            Err(_) => return Ok(Config::default()),
        };
        serde_json::from_str(&text).map_err(|e| {
            AssemblyError::new(
                ErrorKind::ConfigError,
                SourceLocation::new(path, 0, 0),
                format!("malformed configuration file: {e}"),
            )
        })
    }

    pub fn endianness(&self) -> Result<Endianness, AssemblyError> {
        match self.architecture.endianness.to_ascii_lowercase().as_str() {
            "little" => Ok(Endianness::Little),
            "big" => Ok(Endianness::Big),
            other => Err(AssemblyError::new(
                ErrorKind::ConfigError,
                SourceLocation::default(),
                format!("architecture.endianness must be \"little\" or \"big\", got {:?}", other),
            )),
        }
    }
}
