use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pybridge")]
#[command(about = "Generate CPython extension bridge code from Rust sources", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate the C, header, and Rust bridge sources
    Codegen {
        /// Rust source files to scan for exported declarations
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output C code file
        #[arg(long = "output-c-code", default_value = "pyexports.c")]
        c_source: PathBuf,

        /// Output C header file
        #[arg(long = "output-chdr-code", default_value = "pyexports.h")]
        c_header: PathBuf,

        /// Output Rust code file
        #[arg(long = "output-rust-code", default_value = "pyexports.rs")]
        rust_source: PathBuf,

        /// Name of the python module
        #[arg(long = "pymodule", default_value = "rsmodule")]
        module_name: String,

        /// Keep the original identifier casing instead of snake_case
        #[arg(long = "no-snake-case")]
        no_snake_case: bool,

        /// Export every eligible public function, marker or not
        #[arg(long = "export-all")]
        export_all: bool,

        /// Cargo features gating the generated Rust code (comma-separated)
        #[arg(long = "tags", value_delimiter = ',')]
        tags: Vec<String>,

        /// Output directory applied to all generated files
        #[arg(long = "output-dir")]
        output_dir: Option<PathBuf>,

        /// Enable debug messages (repeat for trace)
        #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count)]
        debug: u8,
    },
}

impl Commands {
    /// Verbosity from repeated `-d` flags.
    pub fn debug_level(&self) -> u8 {
        match self {
            Commands::Codegen { debug, .. } => *debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codegen_defaults() {
        let cli = Cli::parse_from(["pybridge", "codegen", "exports.rs"]);
        let Commands::Codegen {
            files,
            c_source,
            module_name,
            no_snake_case,
            export_all,
            tags,
            ..
        } = cli.command;
        assert_eq!(files, vec![PathBuf::from("exports.rs")]);
        assert_eq!(c_source, PathBuf::from("pyexports.c"));
        assert_eq!(module_name, "rsmodule");
        assert!(!no_snake_case);
        assert!(!export_all);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_codegen_options() {
        let cli = Cli::parse_from([
            "pybridge",
            "codegen",
            "--pymodule",
            "sample",
            "--tags",
            "python,extra",
            "--output-dir",
            "out",
            "-dd",
            "a.rs",
            "b.rs",
        ]);
        let Commands::Codegen {
            files,
            module_name,
            tags,
            output_dir,
            debug,
            ..
        } = cli.command;
        assert_eq!(files.len(), 2);
        assert_eq!(module_name, "sample");
        assert_eq!(tags, vec!["python", "extra"]);
        assert_eq!(output_dir, Some(PathBuf::from("out")));
        assert_eq!(debug, 2);
    }

    #[test]
    fn test_files_are_required() {
        assert!(Cli::try_parse_from(["pybridge", "codegen"]).is_err());
    }
}
