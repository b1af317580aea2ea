#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(not(target_env = "musl"))]
use mimalloc as _;

use std::io::prelude::*;

use anyhow::{bail, Context, Result};
use env_logger::Builder;
use log::{Level, LevelFilter};
use openctm::{Importer, Mesh, Method, SaveOptions};
use owo_colors::OwoColorize;

mod menu;
use menu::Commands;

fn color_level(level: Level) -> String {
    match level {
        Level::Error => level.red().to_string(),
        Level::Warn => level.yellow().to_string(),
        Level::Info => level.green().to_string(),
        Level::Debug => level.blue().to_string(),
        Level::Trace => level.purple().to_string(),
    }
}

const fn level_filter(verbose: usize) -> LevelFilter {
    match verbose {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        //default to off
        _ => LevelFilter::Off,
    }
}

fn main() -> Result<()> {
    //Parse command line input
    let args: menu::CtmTool = argp::parse_args_or_exit(argp::DEFAULT);

    // Build up a logger with custom formatting and set it to the verbosity from the command line
    if args.verbose != 0 {
        Builder::new()
            .format(|buf, record| {
                writeln!(buf, "{} {}", color_level(record.level()), record.args())
            })
            .filter(None, level_filter(args.verbose))
            .init();
    }

    match args.nested {
        Commands::Info(params) => info(&params.input),
        Commands::Convert(params) => convert(params),
        Commands::Verify(params) => verify(&params.input),
    }
}

fn info(path: &str) -> Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("unable to open {path}"))?;
    let mut reader = std::io::BufReader::new(file);
    let importer = Importer::read_header(&mut reader)?;

    println!("{path}: OpenCTM, method {}", importer.method());
    println!("  vertices:   {}", importer.vertex_count());
    println!("  triangles:  {}", importer.triangle_count());
    println!("  normals:    {}", if importer.has_normals() { "yes" } else { "no" });
    for id in importer.uv_map_ids() {
        let name = importer.uv_map_name(id).unwrap_or_default();
        match importer.uv_map_file_name(id) {
            Some(file_name) => println!("  UV map:     {name} ({file_name})"),
            None => println!("  UV map:     {name}"),
        }
    }
    for id in importer.attrib_map_ids() {
        println!("  attributes: {}", importer.attrib_map_name(id).unwrap_or_default());
    }
    if let Some(comment) = importer.comment() {
        println!("  comment:    {comment}");
    }
    Ok(())
}

fn convert(params: menu::ConvertData) -> Result<()> {
    let method = match params.method.as_deref().unwrap_or("mg1") {
        "raw" | "RAW" => Method::Raw,
        "mg1" | "MG1" => Method::Mg1,
        "mg2" | "MG2" => Method::Mg2,
        other => bail!("unknown method {other:?}, expected raw, mg1 or mg2"),
    };

    log::info!("Reading mesh {}", &params.input);
    let mut mesh = Mesh::open(&params.input)?;
    if let Some(comment) = params.comment {
        mesh.comment = (!comment.is_empty()).then_some(comment);
    }

    let mut options = SaveOptions::with_method(method);
    if let Some(level) = params.level {
        options.compression_level = level;
    }
    if let Some(precision) = params.vertex_precision {
        options.vertex_precision = precision;
    }
    if let Some(precision) = params.normal_precision {
        options.normal_precision = precision;
    }

    log::info!("Writing mesh {}", &params.output);
    mesh.save_to_path(&params.output, &options)?;
    Ok(())
}

fn verify(path: &str) -> Result<()> {
    //A full decode runs every integrity check the codec has
    let mesh = Mesh::open(path)?;
    println!(
        "{path}: OK ({} vertices, {} triangles, {} UV maps, {} attribute maps)",
        mesh.vertex_count(),
        mesh.triangle_count(),
        mesh.uv_maps.len(),
        mesh.attrib_maps.len()
    );
    Ok(())
}
