use anyhow::Result;
use clap::Parser;
use pybridge::cli::{Cli, Commands};
use pybridge::commands::{handle_codegen, CodegenConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.debug_level());

    match cli.command {
        Commands::Codegen {
            files,
            c_source,
            c_header,
            rust_source,
            module_name,
            no_snake_case,
            export_all,
            tags,
            output_dir,
            debug: _,
        } => handle_codegen(CodegenConfig {
            files,
            c_source,
            c_header,
            rust_source,
            module_name,
            snake_case: !no_snake_case,
            export_all,
            tags,
            output_dir,
        }),
    }
}

/// `-d` raises the level to debug, `-dd` to trace; `RUST_LOG` still wins
/// when set.
fn init_logging(debug_level: u8) {
    let default_level = match debug_level {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
