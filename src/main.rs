//! gritphys - collision resource tool
//!
//! Inspects, pretty prints and converts TCOL/BCOL collision resources, and
//! can drop a probe sphere onto one to check that it simulates sanely.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gritphys::config::AppConfig;
use grit_col::{bcol, parse_tcol, pretty_print, MaterialDb};
use grit_math::{Transform, Vector3};
use grit_physics::{decode, CollisionMesh, DiskSource, PhysicsWorld, ResourceSource, SweepHits};

#[derive(Debug, Parser)]
#[command(name = "gritphys", about = "Inspect, convert and test TCOL/BCOL collision resources")]
struct Cli {
    /// Config directory holding default.toml and user.toml
    #[arg(long, value_name = "DIR", default_value = "config")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarise a resource: mass, parts and per-material face area
    Info {
        /// Resource name, relative to the resource root
        resource: String,
    },
    /// Pretty print a resource as TCOL text
    Print {
        resource: String,
    },
    /// Convert a TCOL or BCOL file to BCOL
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
    /// Drop a probe sphere onto a resource and report where it settles
    Drop {
        resource: String,
        /// Simulated time in seconds
        #[arg(default_value_t = 3.0)]
        seconds: f32,
    },
}

const PROBE: &str = "gritphys/probe.tcol";
const PROBE_TCOL: &str = r#"TCOL1.0 attributes { mass 1; } compound { sphere { material "Frictionless"; radius 0.5; } }"#;

/// Everything a command needs from the configuration
struct Context {
    config: AppConfig,
    materials: MaterialDb,
    source: DiskSource,
}

impl Context {
    fn new(config: AppConfig) -> Result<Self, Box<dyn Error>> {
        let materials = config.resources.load_materials()?;
        let source = DiskSource::new(&config.resources.root);
        Ok(Self { config, materials, source })
    }

    fn mesh(&self, name: &str) -> Result<CollisionMesh, Box<dyn Error>> {
        let bytes = self.source.read(name)?;
        let file = decode(name, &bytes, &self.materials)?;
        Ok(CollisionMesh::from_tcol(name, file, self.config.physics.internal_edge_fix)?)
    }
}

fn info(ctx: &Context, name: &str) -> Result<(), Box<dyn Error>> {
    let mesh = ctx.mesh(name)?;
    let props = mesh.properties();
    println!("{}", name);
    if mesh.is_static() {
        println!("  static");
    } else {
        println!("  mass {}  inertia {:?}", props.mass, props.inertia);
    }
    println!("  damping {} / {}", props.linear_damping, props.angular_damping);
    for (i, kind) in mesh.part_kinds().iter().enumerate() {
        if kind.is_trimesh() {
            println!("  part {}: {:?}", i, kind);
            continue;
        }
        let material = mesh.part_materials().get(i).map_or("?", |&m| ctx.materials.name_of(m));
        println!("  part {}: {:?} \"{}\"", i, kind, material);
    }
    if mesh.face_count() > 0 {
        println!("  {} faces", mesh.face_count());
        for material in ctx.materials.iter() {
            let area = mesh.material_area(material.id);
            if area > 0.0 {
                println!("    \"{}\": {:.3} m^2", material.name, area);
            }
        }
    }
    Ok(())
}

fn print(ctx: &Context, name: &str) -> Result<(), Box<dyn Error>> {
    let bytes = ctx.source.read(name)?;
    let file = decode(name, &bytes, &ctx.materials)?;
    print!("{}", pretty_print(&file, &ctx.materials));
    Ok(())
}

fn convert(ctx: &Context, input: &Path, output: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(input)?;
    let file = decode(&input.to_string_lossy(), &bytes, &ctx.materials)?;
    let blob = bcol::write(&file, &ctx.materials);
    fs::write(output, &blob)?;
    log::info!("Wrote {} ({} bytes)", output.display(), blob.len());
    Ok(())
}

fn drop_probe(ctx: &Context, name: &str, seconds: f32) -> Result<(), Box<dyn Error>> {
    let probe = parse_tcol(PROBE, PROBE_TCOL, &ctx.materials)?;
    let mut world = PhysicsWorld::new(ctx.config.physics.clone(), ctx.materials.clone(), ctx.source.clone());
    world.set_interactions(ctx.config.resources.load_interactions()?);
    world.add_mesh(CollisionMesh::from_tcol(PROBE, probe, false)?);

    let target = world.create_body(name, Transform::IDENTITY)?;
    let mut hits = SweepHits::default();
    world.ray(Vector3::new(0.0, 0.0, 1000.0), Vector3::new(0.0, 0.0, -1000.0), -1.0, &mut hits);
    let top = hits.nearest().map_or(0.0, |h| 1000.0 - 2000.0 * h.distance);
    let start = Vector3::new(0.0, 0.0, top + 2.0);
    let sphere = world.create_body(PROBE, Transform::from_position(start))?;

    let frame = 1.0 / 60.0;
    let mut t = 0.0;
    while t < seconds {
        world.pump(frame);
        t += frame;
    }

    let body = world.body(sphere).ok_or("probe vanished")?;
    let end = body.position();
    println!(
        "probe fell from {:.3} to ({:.3}, {:.3}, {:.3}), speed {:.3}, {}",
        start.z,
        end.x,
        end.y,
        end.z,
        body.linear_velocity().length(),
        if body.is_sleeping() { "asleep" } else { "awake" }
    );
    if world.anomaly_count() > 0 {
        log::warn!("{} contact material lookups fell back to material 0", world.anomaly_count());
    }
    world.destroy_body(sphere)?;
    world.destroy_body(target)?;
    Ok(())
}

fn run(config: AppConfig, command: &Command) -> Result<(), Box<dyn Error>> {
    let ctx = Context::new(config)?;
    match command {
        Command::Info { resource } => info(&ctx, resource),
        Command::Print { resource } => print(&ctx, resource),
        Command::Convert { input, output } => convert(&ctx, input, output),
        Command::Drop { resource, seconds } => drop_probe(&ctx, resource, *seconds),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config);
    let level = config.as_ref().map_or("info", |c| c.debug.log_level.as_str());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    let config = config.unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    match run(config, &cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_drop_defaults_to_three_seconds() {
        let cli = Cli::try_parse_from(["gritphys", "drop", "props/crate.tcol"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config"));
        match cli.command {
            Command::Drop { resource, seconds } => {
                assert_eq!(resource, "props/crate.tcol");
                assert_eq!(seconds, 3.0);
            }
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["gritphys", "drop", "hill.tcol", "soon"]).is_err());
        assert!(Cli::try_parse_from(["gritphys", "convert", "only-input.tcol"]).is_err());
        assert!(Cli::try_parse_from(["gritphys", "explode", "hill.tcol"]).is_err());
    }

    #[test]
    fn test_convert_takes_paths() {
        let cli = Cli::try_parse_from(["gritphys", "--config", "etc", "convert", "a.tcol", "b.bcol"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("etc"));
        assert!(matches!(cli.command, Command::Convert { ref output, .. } if output == Path::new("b.bcol")));
    }
}
