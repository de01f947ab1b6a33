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

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use serde::Serialize;

use tcasm::assembler::encoder::Endianness;
use tcasm::assembler::selector::SelectorOptions;
use tcasm::config::Config;
use tcasm::emit;
use tcasm::errors::AssemblyError;
use tcasm::file_reader::{AsmFileReader, FileReader};
use tcasm::preprocess::{self, MacroEnv};
use tcasm::table::{self, TableFormat};
use tcasm::{assemble_source, PipelineOutput};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Bin,
    Hex,
    Txt,
}

/// Data-driven TriCore TC1.6/1.8 assembler.
#[derive(Parser, Debug)]
#[clap(version, author = "Connor Nolan")]
struct Opts {
    /// Assembly source file.
    input: PathBuf,

    #[clap(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Bin)]
    format: OutputFormat,

    /// Final output file; defaults to the input's stem with the format's extension.
    #[clap(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Emit a listing; an optional explicit path may follow.
    #[clap(short = 'l', long = "listing", num_args = 0..=1, default_missing_value = "")]
    listing: Option<String>,

    /// Emit a symbol map next to the output.
    #[clap(long = "map")]
    map: bool,

    #[clap(short = 'D', long = "output-dir")]
    output_dir: Option<PathBuf>,

    #[clap(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[clap(short = 's', long = "instruction-set")]
    instruction_set: Option<PathBuf>,

    /// Additional macro-definition files for the preprocessor (repeatable).
    #[clap(short = 'm', long = "macro-file")]
    macro_file: Vec<PathBuf>,

    #[clap(long = "no-macros")]
    no_macros: bool,

    /// Run only the preprocessor; write the expanded source to stdout.
    #[clap(short = 'E')]
    preprocess_only: bool,

    #[clap(long = "O32")]
    force_32: bool,

    #[clap(long = "Ono-implicit")]
    no_implicit: bool,

    #[clap(long)]
    verbose: bool,

    #[clap(long)]
    info: bool,

    /// Verbose diagnostics plus a `build_summary.json` artefact.
    #[clap(long)]
    debug: bool,
}

#[derive(Serialize)]
struct BuildSummary {
    input: String,
    errors: usize,
    warnings: usize,
    info: usize,
    debug: usize,
    statement_count: usize,
    output_bytes: usize,
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(&opts);

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(opts: &Opts) {
    let level = if opts.debug {
        "debug"
    } else if opts.info {
        "info"
    } else if opts.verbose {
        "warn"
    } else {
        "error"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(opts: &Opts) -> Result<()> {
    let reader = AsmFileReader;

    let config_path = opts
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("tcasm.json"));
    let config = Config::load(&reader, &config_path).context("loading configuration")?;
    debug!("loaded configuration from {}", config_path.display());

    let output_dir = opts
        .output_dir
        .clone()
        .or_else(|| config.paths.output_dir.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let enable_macros = if opts.no_macros {
        false
    } else {
        config.output.enable_macros
    };

    let mut macro_env = MacroEnv::new();
    for macro_path in &opts.macro_file {
        let text = reader
            .read_to_string(macro_path)
            .with_context(|| format!("reading macro file {}", macro_path.display()))?;
        macro_env
            .load_definitions(&text)
            .with_context(|| format!("loading macro definitions from {}", macro_path.display()))?;
    }

    if opts.preprocess_only {
        let source = reader
            .read_to_string(&opts.input)
            .with_context(|| format!("reading source file {}", opts.input.display()))?;
        let (expanded, _) = preprocess::preprocess(&source, &mut macro_env, 0)
            .context("running the preprocessor")?;
        print!("{expanded}");
        return Ok(());
    }

    let instruction_set_path = opts
        .instruction_set
        .clone()
        .or_else(|| config.paths.instruction_set.clone().map(PathBuf::from))
        .context("no instruction table configured: pass -s/--instruction-set or set paths.instruction_set")?;
    let table_format = TableFormat::from_path(&instruction_set_path);
    let table = table::load_table(&reader, &instruction_set_path, table_format)
        .map_err(anyhow_from_assembly_error)
        .with_context(|| format!("loading instruction table {}", instruction_set_path.display()))?;
    info!("loaded {} instruction variant(s)", table.len());

    let endianness = config.endianness().map_err(anyhow_from_assembly_error)?;
    let selector_options = SelectorOptions {
        force_32: opts.force_32,
        no_implicit: opts.no_implicit,
    };

    let PipelineOutput { diagnostics, program } = assemble_source(
        &reader,
        &opts.input,
        &table,
        selector_options,
        endianness,
        &mut macro_env,
        enable_macros,
    )
    .map_err(anyhow_from_assembly_error)?;

    for d in &diagnostics {
        eprintln!("{d}");
    }
    let counts = tcasm::errors::DiagnosticCounts::tally(&diagnostics);
    println!("{counts}");

    let Some(program) = program else {
        anyhow::bail!("assembly failed with {} error(s)", counts.errors);
    };

    let stem = opts
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    let output_bytes;
    match opts.format {
        OutputFormat::Bin => {
            let bytes = emit::bin::emit_binary(&program);
            output_bytes = bytes.len();
            let path = resolve_output_path(opts, &output_dir, &stem, "bin");
            write_atomically(&path, &bytes)?;
            println!("wrote {}", path.display());
        }
        OutputFormat::Hex => {
            let text = emit::ihex::emit_intel_hex(&program);
            output_bytes = text.len();
            let path = resolve_output_path(opts, &output_dir, &stem, "hex");
            write_atomically(&path, text.as_bytes())?;
            println!("wrote {}", path.display());
        }
        OutputFormat::Txt => {
            let text = emit::text::emit_text_dump(&program, endianness);
            output_bytes = text.len();
            let path = resolve_output_path(opts, &output_dir, &stem, "txt");
            write_atomically(&path, text.as_bytes())?;
            println!("wrote {}", path.display());
        }
    }

    let want_listing = opts.listing.is_some() || config.output.generate_lst;
    if want_listing {
        let listing_text = emit::listing::emit_listing(&program);
        let path = match opts.listing.as_deref() {
            Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
            _ => output_dir.join(format!("{stem}.lst")),
        };
        write_atomically(&path, listing_text.as_bytes())?;
        println!("wrote {}", path.display());
    }

    if opts.map || config.output.generate_map {
        let map_text = emit::map::emit_map(&program);
        let path = output_dir.join(format!("{stem}.map"));
        write_atomically(&path, map_text.as_bytes())?;
        println!("wrote {}", path.display());
    }

    if opts.debug {
        let summary = BuildSummary {
            input: opts.input.display().to_string(),
            errors: counts.errors,
            warnings: counts.warnings,
            info: counts.info,
            debug: counts.debug,
            statement_count: program.statements.len(),
            output_bytes,
        };
        let json = serde_json::to_vec_pretty(&summary).context("serializing build summary")?;
        let path = output_dir.join("build_summary.json");
        write_atomically(&path, &json)?;
        debug!("wrote build summary to {}", path.display());
    }

    Ok(())
}

fn resolve_output_path(opts: &Opts, output_dir: &Path, stem: &str, ext: &str) -> PathBuf {
    opts.output
        .clone()
        .unwrap_or_else(|| output_dir.join(format!("{stem}.{ext}")))
}

/// Writes `contents` to a `.tmp` sibling of `path` and renames it into
/// place, so a crash mid-write never leaves a half-written artefact (spec
/// §5 "Shared resources").
fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        file.write_all(contents)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;
    Ok(())
}

fn anyhow_from_assembly_error(e: AssemblyError) -> anyhow::Error {
    anyhow::anyhow!(e.to_string())
}
