// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{anyhow, Context, Result};
use blobc_core::codegen;
use blobc_core::{parse_file, DirectoryImports, TypeSystem};
use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Generate source code from blob definitions.
#[derive(Parser)]
#[command(name = "blobc")]
struct Cli {
    /// Input source file.
    #[arg(value_name = "source file")]
    input: PathBuf,

    /// Language to generate code for.
    #[arg(short = 'l', value_name = "language")]
    language: String,

    /// Output source file (stdout when omitted).
    #[arg(short = 'o', value_name = "file")]
    output: Option<PathBuf>,

    /// Auxiliary output source file.
    #[arg(short = 'a', value_name = "file")]
    aux_output: Option<PathBuf>,

    /// Import search directories, tried in order.
    #[arg(short = 'I', value_name = "path")]
    import_paths: Vec<PathBuf>,

    /// Merge all imports together and produce stand-alone output
    /// suitable for distribution.
    #[arg(short = 'm', long = "merge-imports")]
    merge_imports: bool,

    /// Increase logging verbosity. Can be specified multiple times.
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn run() -> Result<()> {
        let cli = Self::parse();

        let log_level = match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(log_level.as_str()),
        );
        builder.init();

        let import_paths = if cli.import_paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            cli.import_paths.clone()
        };
        let provider = DirectoryImports::new(import_paths);

        let items = parse_file(&cli.input, &provider)?;
        let types = TypeSystem::compile(&items)?;

        let input_name = cli.input.display().to_string();
        let mut generator = codegen::create(&cli.language, &input_name)
            .ok_or_else(|| anyhow!("unknown language '{}'", cli.language))?;

        let mut out: Box<dyn Write> = match &cli.output {
            Some(path) => Box::new(
                File::create(path)
                    .with_context(|| format!("couldn't create {}", path.display()))?,
            ),
            None => Box::new(std::io::stdout()),
        };
        // The aux stream exists for generators that split declarations
        // from definitions; none of the shipped generators use it, but
        // the file is still created so build systems can depend on it.
        let _aux: Option<File> = match &cli.aux_output {
            Some(path) => Some(
                File::create(path)
                    .with_context(|| format!("couldn't create {}", path.display()))?,
            ),
            None => None,
        };

        codegen::generate(
            &items,
            &types,
            generator.as_mut(),
            &mut out,
            cli.merge_imports,
        )?;
        out.flush()?;

        Ok(())
    }
}

fn main() {
    let exit_code = match Cli::run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    };

    std::process::exit(exit_code)
}
