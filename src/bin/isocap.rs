use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use isocap::{AssetCompiler, pipeline};

#[derive(Parser, Debug)]
#[command(name = "isocap", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every file a full export of the scene would produce.
    Plan(SceneArgs),
    /// Write the object-description manifest next to the scene file.
    Manifest(SceneArgs),
    /// Split rendered sprite sheets into sprites (follows the configured
    /// update-xml/compile chain).
    Split(CompilerArgs),
    /// Update the object XML with the split sprites.
    UpdateXml(CompilerArgs),
    /// Compile the object XML into the final archive.
    Compile(CompilerArgs),
    /// Advanced compile with format string and creator credit.
    CompileAdvanced(CompilerArgs),
    /// Add all four rotations to the draw groups in the object XML.
    AddRotations(CompilerArgs),
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Scene description JSON.
    #[arg(long)]
    scene: PathBuf,
}

#[derive(Parser, Debug)]
struct CompilerArgs {
    /// Scene description JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Path to the asset compiler executable.
    #[arg(long)]
    compiler: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Manifest(args) => cmd_manifest(args),
        Command::Split(args) => {
            cmd_compiler(args, |scene, compiler| pipeline::split_sprites(scene, compiler))
        }
        Command::UpdateXml(args) => {
            cmd_compiler(args, |scene, compiler| pipeline::update_xml(scene, compiler))
        }
        Command::Compile(args) => cmd_compiler(args, |scene, compiler| {
            pipeline::compile_object(scene, compiler).map(|step| vec![step])
        }),
        Command::CompileAdvanced(args) => cmd_compiler(args, |scene, compiler| {
            pipeline::compile_advanced_object(scene, compiler)
        }),
        Command::AddRotations(args) => cmd_compiler(args, |scene, compiler| {
            pipeline::add_rotations(scene, compiler).map(|step| vec![step])
        }),
    }
}

fn read_scene_json(path: &Path) -> anyhow::Result<isocap::Scene> {
    let file = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let mut scene: isocap::Scene =
        serde_json::from_reader(reader).with_context(|| "parse scene JSON")?;
    if scene.source_path.is_none() {
        scene.source_path = Some(path.to_path_buf());
    }
    scene.validate()?;
    Ok(scene)
}

fn cmd_plan(args: SceneArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.scene)?;
    for file in pipeline::planned_files(&scene)? {
        println!("{}", file.display());
    }
    Ok(())
}

fn cmd_manifest(args: SceneArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.scene)?;
    let path = isocap::manifest::write(&scene)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_compiler(
    args: CompilerArgs,
    run: impl FnOnce(
        &isocap::Scene,
        &AssetCompiler,
    ) -> isocap::IsocapResult<Vec<pipeline::CompilerStep>>,
) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.scene)?;
    let compiler = AssetCompiler::new(&args.compiler)?;

    let steps = run(&scene, &compiler)?;
    let mut failed = 0usize;
    for step in &steps {
        let label = match &step.variant {
            Some(variant) => format!("{} ({variant})", step.step),
            None => step.step.to_string(),
        };
        for line in &step.outcome.info {
            println!("{label}: {line}");
        }
        if let Some(error) = step.outcome.error() {
            eprintln!("{label}: {error}");
            failed += 1;
        }
    }

    if failed > 0 {
        eprintln!("{failed} of {} compiler steps reported errors", steps.len());
    }
    Ok(())
}
