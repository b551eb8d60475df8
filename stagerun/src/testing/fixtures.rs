//! Test fixtures.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

use crate::config::{ConfigLoader, WorkflowConfig};
use crate::pipeline::{StageGraph, StageGraphBuilder};
use crate::template::VariableEnv;

/// A small but complete workflow: a clean stage, a hidden setup stage,
/// a build chain with a log file, and an independent docs stage.
pub const SAMPLE_WORKFLOW: &str = r#"
variables:
  build_dir: "{cwd}/target/{dut}"
  logs_dir: "{build_dir}/logs"
  image: "{build_dir}/image.bin"
stages:
  clean:
    description: Remove build outputs
    commands:
      - "rm -rf {build_dir}"
  setup:
    hidden: true
    commands:
      - "mkdir -p {build_dir}"
  configure:
    dependencies: [setup]
    commands:
      - "echo configuring {dut}"
  build:
    dependencies: [configure]
    description: Build the image
    commands:
      - "echo building {image}"
    log_file: "{logs_dir}/build_{timestamp}.log"
  docs:
    dependencies: [setup]
    commands:
      - "echo docs"
"#;

/// Loads [`SAMPLE_WORKFLOW`].
///
/// # Panics
///
/// Panics if the sample does not parse, which would be a bug in the fixture.
#[must_use]
pub fn sample_config() -> WorkflowConfig {
    ConfigLoader::from_yaml_str(SAMPLE_WORKFLOW).expect("sample workflow parses")
}

/// Builds a command-less graph from `(stage, dependencies)` pairs.
#[must_use]
pub fn graph_from_edges(edges: &[(&str, &[&str])]) -> StageGraph {
    edges
        .iter()
        .fold(StageGraphBuilder::new(), |builder, (name, deps)| {
            builder.stage(name, deps, &[])
        })
        .build()
}

/// Builds a variable environment from `(name, value)` pairs.
#[must_use]
pub fn env_from_pairs(pairs: &[(&str, &str)]) -> VariableEnv {
    pairs.iter().copied().collect()
}

/// A cloneable in-memory writer for capturing console output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    /// Returns the written lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
