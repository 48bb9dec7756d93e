//! The `codegen` command: extract declarations and generate the three
//! bridge artifacts.

use std::path::PathBuf;

use anyhow::Result;
use log::debug;

use crate::config::GenerateConfig;
use crate::extract;
use crate::generate;

/// Inputs of one `codegen` invocation.
#[derive(Debug, Clone)]
pub struct CodegenConfig {
    pub files: Vec<PathBuf>,
    pub c_source: PathBuf,
    pub c_header: PathBuf,
    pub rust_source: PathBuf,
    pub module_name: String,
    pub snake_case: bool,
    pub export_all: bool,
    pub tags: Vec<String>,
    pub output_dir: Option<PathBuf>,
}

impl CodegenConfig {
    fn into_generate_config(self) -> GenerateConfig {
        GenerateConfig {
            c_source: self.c_source,
            c_header: self.c_header,
            rust_source: self.rust_source,
            module_name: self.module_name,
            snake_case: self.snake_case,
            export_all: self.export_all,
            tags: self.tags,
            output_dir: self.output_dir,
        }
    }
}

pub fn handle_codegen(config: CodegenConfig) -> Result<()> {
    let files = config.files.clone();
    let export_all = config.export_all;
    let generate_config = config.into_generate_config().resolved()?;

    let extraction = extract::extract_files(&files, export_all)?;
    debug!(
        "extracted {} functions and {} types from package '{}'",
        extraction.functions.len(),
        extraction.types.len(),
        extraction.package
    );

    generate::generate(&generate_config, &extraction)?;
    Ok(())
}
