use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glshade_gl::{GlContext, HeadlessGl, Primitive};
use glshade_scene::{ProgramDescriptor, ScenePrograms, presets};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glshade-cli", about = "Check shader program descriptors and dry-run frames")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// Program descriptor YAML file
    file: Option<PathBuf>,
    /// Built-in descriptor name (see `presets`)
    #[arg(short, long)]
    preset: Option<String>,
}

impl Source {
    fn load(&self) -> anyhow::Result<ProgramDescriptor> {
        match (&self.file, &self.preset) {
            (Some(path), _) => ProgramDescriptor::load(path)
                .with_context(|| format!("loading {}", path.display())),
            (None, Some(name)) => Ok(presets::preset(name)?),
            (None, None) => anyhow::bail!("no descriptor given"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// List built-in program descriptors
    Presets,
    /// Compile and link a program, then resolve its declared parameters
    Check {
        #[command(flatten)]
        source: Source,
    },
    /// Set up a program, bind zero-filled vertex data and record one draw
    Frame {
        #[command(flatten)]
        source: Source,
        /// Number of vertices to draw
        #[arg(short = 'n', long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
        vertices: u32,
        /// Position attribute fed with zeros when the descriptor does not list it
        #[arg(short, long, default_value = "a_Position")]
        attribute: String,
    },
}

fn check(descriptor: &ProgramDescriptor) -> anyhow::Result<()> {
    let mut ctx = GlContext::new(HeadlessGl::new());
    let mut program = descriptor.build();
    program
        .setup(&mut ctx)
        .with_context(|| format!("program `{}`", descriptor.name))?;
    println!("{}: linked", descriptor.name);

    for attribute in &descriptor.attributes {
        let binding = program.bind_attribute(&ctx, &attribute.name)?;
        match binding.location() {
            Some(location) => println!("  attribute {} -> location {location}", attribute.name),
            None => println!("  attribute {} -> unresolved", attribute.name),
        }
    }
    for name in descriptor.uniforms.keys() {
        let binding = program.bind_uniform(&ctx, name)?;
        let status = if binding.is_resolved() { "resolved" } else { "unresolved" };
        println!("  uniform {name} -> {status}");
    }

    program.release(&mut ctx);
    Ok(())
}

fn frame(descriptor: ProgramDescriptor, vertices: u32, position: &str) -> anyhow::Result<()> {
    let name = descriptor.name.clone();
    let mut ctx = GlContext::new(HeadlessGl::new());
    let mut scene = ScenePrograms::new();
    scene.insert(descriptor)?;
    scene.setup_all(&mut ctx)?;

    let unresolved = scene.apply_constants(&mut ctx, &name)?;
    if unresolved > 0 {
        println!("{unresolved} constant(s) not used by the program");
    }

    let (Some(program), Some(descriptor)) = (scene.get(&name), scene.descriptor(&name)) else {
        anyhow::bail!("program `{name}` missing after setup");
    };
    let mut arrays: Vec<(&str, u32)> = descriptor
        .attributes
        .iter()
        .filter(|a| a.constant.is_none())
        .map(|a| (a.name.as_str(), a.components))
        .collect();
    if descriptor.attribute(position).is_none() {
        arrays.push((position, 3));
    }

    program.execute_using(&mut ctx, |ctx, p| {
        for (attribute, components) in &arrays {
            let zeros = vec![0.0; vertices as usize * *components as usize];
            p.bind_attribute(ctx, attribute)?
                .bind_vertex_data(ctx, &zeros, *components, false, 0)?;
        }
        Ok(())
    })?;
    ctx.draw_arrays(Primitive::Triangles, 0, vertices);

    for (i, draw) in ctx.backend().draw_calls().iter().enumerate() {
        println!(
            "draw {i}: {:?} first={} count={} program={:?}",
            draw.primitive, draw.first, draw.count, draw.program
        );
    }

    scene.release_all(&mut ctx);
    let gl = ctx.backend();
    println!(
        "after release: live shaders={}, live programs={}, invalid calls={}",
        gl.live_shaders(),
        gl.live_programs(),
        gl.invalid_operations()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("glshade-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("gl: {}", glshade_gl::crate_info());
            println!("shading: {}", glshade_shading::crate_info());
            println!("scene: {}", glshade_scene::crate_info());
        }
        Commands::Presets => {
            for name in presets::preset_names() {
                println!("{name}");
            }
        }
        Commands::Check { source } => {
            check(&source.load()?)?;
        }
        Commands::Frame {
            source,
            vertices,
            attribute,
        } => {
            frame(source.load()?, vertices, &attribute)?;
        }
    }

    Ok(())
}
