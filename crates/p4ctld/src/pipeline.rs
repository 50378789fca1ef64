//! Forwarding pipeline blobs.

use std::fs;
use std::io;
use std::path::Path;

/// Compiled P4 program and its P4Info.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingPipeline {
    /// Target-specific device config.
    pub device_config: Vec<u8>,
    /// Serialized P4Info.
    pub p4info: Vec<u8>,
}

impl ForwardingPipeline {
    /// Creates a pipeline from in-memory blobs.
    pub fn new(device_config: Vec<u8>, p4info: Vec<u8>) -> Self {
        Self {
            device_config,
            p4info,
        }
    }

    /// Loads the pipeline blobs.
    ///
    /// Either path may be omitted (software targets load the program
    /// themselves), leaving that blob empty.
    pub fn load(bin: Option<&Path>, p4info: Option<&Path>) -> io::Result<Self> {
        let read = |path: Option<&Path>| {
            path.map(fs::read)
                .transpose()
                .map(Option::unwrap_or_default)
        };

        Ok(Self {
            device_config: read(bin)?,
            p4info: read(p4info)?,
        })
    }
}
