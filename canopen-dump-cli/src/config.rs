//! Configuration loading and parsing
//!
//! Every section is optional; an empty file is a valid configuration.
//!
//! ```toml
//! [source]
//! mode = "tcp"            # can | tcp | file
//! address = "127.0.0.1:29536"
//!
//! [output]
//! timestamp = true
//!
//! [filter]
//! classes = ["sdo", "emcy", "heartbeat"]
//!
//! [dictionary]
//! strings = ["0x2000:1"]
//! types = { "0x2001:0" = 0x0009 }
//!
//! [decoder]
//! on_unclassified = "skip"  # skip | abort
//! ```

use anyhow::{anyhow, Context, Result};
use canopen_dump_decoder::{
    DataType, DumpOptions, Multiplexer, SourceMode, TypeDictionary, UnclassifiedPolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub mode: SourceMode,
    /// Interface name, `host:port` or trace file path, depending on `mode`
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Prefix every line with `seconds.microseconds`
    #[serde(default)]
    pub timestamp: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Service classes to show; empty shows everything
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DictionaryConfig {
    /// Objects holding visible strings, as `INDEX:SUBINDEX`
    #[serde(default)]
    pub strings: Vec<String>,
    /// Objects with an explicit CiA 301 data type index
    #[serde(default)]
    pub types: BTreeMap<String, u16>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub on_unclassified: UnclassifiedPolicy,
}

impl AppConfig {
    /// Options bitmask for the dumper; mode and timestamp included
    pub fn dump_options(&self) -> Result<DumpOptions> {
        Ok(filter_options(&self.filter.classes)?
            .with_timestamp(self.output.timestamp)
            .with_source_mode(self.source.mode))
    }

    /// Built-in dictionary extended with the configured objects
    pub fn type_dictionary(&self) -> Result<TypeDictionary> {
        let mut dictionary = TypeDictionary::new();

        for address in &self.dictionary.strings {
            dictionary.insert(parse_address(address)?, DataType::VisibleString);
        }

        for (address, type_index) in &self.dictionary.types {
            let data_type = DataType::from_index(*type_index).ok_or_else(|| {
                anyhow!("Unknown data type 0x{:04X} for object {}", type_index, address)
            })?;
            dictionary.insert(parse_address(address)?, data_type);
        }

        Ok(dictionary)
    }

    /// Check everything that can be checked before opening a source
    pub fn validate(&self) -> Result<()> {
        self.dump_options()?;
        self.type_dictionary()?;
        Ok(())
    }
}

/// Filter bits for a list of class names
pub fn filter_options(classes: &[String]) -> Result<DumpOptions> {
    classes.iter().try_fold(DumpOptions::new(), |options, name| {
        DumpOptions::filter_by_name(name)
            .map(|filter| options.with_filter(filter))
            .ok_or_else(|| anyhow!("Unknown service class in filter: {:?}", name))
    })
}

fn parse_address(address: &str) -> Result<Multiplexer> {
    address
        .parse::<Multiplexer>()
        .with_context(|| format!("Invalid dictionary entry {:?}", address))
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}
