//! Prints a summary of a compiled Genesis3D level.
//!
//! Usage: `gbsp-info <file.bsp> [--keep-sky]`, built with `--features cli`.
//! Set `RUST_LOG=debug` to trace the chunk walk.

use std::{env, error::Error, fs, process};

use gbsp::{DecodeOptions, GBSP};
use log::info;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut path = None;
    let mut options = DecodeOptions::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--keep-sky" => options.exclude_sky = false,
            _ if path.is_none() => path = Some(arg),
            _ => {
                eprintln!("unexpected argument {:?}", arg);
                process::exit(2);
            }
        }
    }

    let Some(path) = path else {
        eprintln!("usage: gbsp-info <file.bsp> [--keep-sky]");
        process::exit(2);
    };

    let buf = fs::read(&path)?;
    info!("read {} bytes from {}", buf.len(), path);

    let level = GBSP::new(&buf, options)?.into_level();

    match level.header {
        Some(header) => println!("{}: GBSP version {}", path, header.version),
        None => println!("{}: no header chunk", path),
    }

    println!("{} models", level.meshes.len());
    for mesh in &level.meshes {
        println!(
            "  {:>3} {:<24} {:>7} verts {:>6} tris {:>4} groups  at {:?}",
            mesh.model_index,
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.groups.len(),
            mesh.world_position
        );
    }

    println!("{} materials", level.materials.len());
    for material in &level.materials {
        println!("  {:>3} {:<32} {}x{}", material.texture_index, material.name, material.width, material.height);
    }

    println!("{} entities", level.entities.len());
    for entity in level.entities.iter() {
        match entity.name.as_str() {
            "" => println!("  {}", entity.classname),
            name => println!("  {} {:?}", entity.classname, name),
        }
    }

    if !level.warnings.is_empty() {
        println!("{} warnings", level.warnings.len());
        for warning in &level.warnings {
            println!("  {}", warning);
        }
    }

    Ok(())
}
