use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use ebpf_pinloader::abi::{MapFlags, MapType, ObjName, PinningMode};
use ebpf_pinloader::cli::{
    Cli, Commands, CreateMapArgs, LoadArgs, OutputFormat, PinArg, PinPathArgs,
};
use ebpf_pinloader::loader::{elf_parser, LoadError, ProgramLoadRequest, ProgramLoader};
use ebpf_pinloader::maps::{MapDefinition, MapManager, MapObject};
use ebpf_pinloader::output::{
    formatter, MapReport, PinPathReport, PinReport, ProgramReport, Report,
};
use ebpf_pinloader::pin::{PinState, Pinner};
use ebpf_pinloader::syscall::LinuxGateway;
use ebpf_pinloader::utils::config::LoaderConfig;
use ebpf_pinloader::utils::logger;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let cli = Cli::parse();

    logger::init(logger::level_for(cli.verbose, cli.quiet));

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        if let Some(log) = e
            .downcast_ref::<LoadError>()
            .and_then(LoadError::verifier_log)
        {
            eprintln!("\n{}\n{}", "Verifier log".bold(), log.trim_end());
        }
        log::debug!("Detailed error: {:#?}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => LoaderConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    let report = match cli.command {
        Commands::CreateMap(args) => create_map_command(&config, args)?,
        Commands::Load(args) => load_command(&config, args)?,
        Commands::PinPath(args) => pin_path_command(&config, args)?,
    };

    print_report(&report, cli.format)
}

fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    let output = formatter::format_output(report, format)?;
    println!("{}", output);
    Ok(())
}

fn pinning_mode(arg: PinArg) -> PinningMode {
    match arg {
        PinArg::None => PinningMode::None,
        PinArg::Object => PinningMode::ObjectNamespace,
        PinArg::Global => PinningMode::GlobalNamespace,
        PinArg::Custom => PinningMode::CustomNamespace,
    }
}

/// Picks the pin path: an explicit `--pin-path` wins, otherwise it is derived
/// from the layout. Resolved before any kernel call so a bad request costs
/// nothing.
fn resolve_pin_path(
    config: &LoaderConfig,
    mode: PinningMode,
    explicit: Option<PathBuf>,
    object: Option<&str>,
    name: &ObjName,
) -> Result<Option<PathBuf>> {
    if mode == PinningMode::None {
        if explicit.is_some() {
            log::warn!("--pin-path ignored because pinning is disabled");
        }
        return Ok(None);
    }
    match explicit {
        Some(path) => Ok(Some(path)),
        None => Ok(config.pin_layout().path_for(mode, object, name)?),
    }
}

fn pin_fd(fd: BorrowedFd<'_>, mode: PinningMode, path: Option<&Path>) -> Result<PinState> {
    match path {
        Some(path) => Ok(Pinner::new(LinuxGateway).pin(fd, mode, path)?),
        None => Ok(PinState::Unpinned),
    }
}

fn create_map_command(config: &LoaderConfig, args: CreateMapArgs) -> Result<Report> {
    let map_type = MapType::from_name(&args.map_type)
        .with_context(|| format!("Unknown map type {:?}", args.map_type))?;
    let flags = match args.flags.as_deref() {
        Some(list) => MapFlags::from_names(list)
            .with_context(|| format!("Unknown map flag in {:?}", list))?,
        None => MapFlags::empty(),
    };
    let mode = pinning_mode(args.pin);
    let name = ObjName::new(&args.name)?;

    let def = MapDefinition::new(map_type, args.key_size, args.value_size, args.max_entries)
        .with_flags(flags)
        .with_pinning(mode);
    def.validate()?;
    let pin_path = resolve_pin_path(
        config,
        mode,
        args.pin_path,
        args.object.as_deref(),
        &name,
    )?;

    let mut obj = MapObject::new(def, name);
    if let Some(node) = args.numa_node {
        obj = obj.with_numa_node(node);
    }

    let map = MapManager::new(LinuxGateway).create_map(&obj)?;
    let state = pin_fd(map.as_fd(), mode, pin_path.as_deref())?;

    Ok(Report::Map(MapReport {
        name: map.name().to_string(),
        map_type: map_type.to_string(),
        key_size: def.key_size,
        value_size: def.value_size,
        max_entries: def.max_entries,
        flags: def
            .flags
            .iter_names()
            .map(|(name, _)| name.to_string())
            .collect(),
        numa_node: args.numa_node,
        fd: map.as_raw_fd(),
        pin: PinReport {
            mode: mode.to_string(),
            state,
            path: pin_path,
        },
    }))
}

/// `--license`, then the object's `license` section, then the config. An
/// empty section counts as absent.
fn select_license(flag: Option<String>, section: Option<String>, fallback: &str) -> String {
    flag.or_else(|| section.filter(|l| !l.is_empty()))
        .unwrap_or_else(|| fallback.to_string())
}

fn load_command(config: &LoaderConfig, args: LoadArgs) -> Result<Report> {
    let section = elf_parser::read_program_section(&args.object, &args.section)?;
    let license = select_license(
        args.license,
        section.license.clone(),
        &config.license,
    );

    let mut request = ProgramLoadRequest::new(&args.prog_type, &section.insns, &license);
    if let Some(name) = args.name.as_deref() {
        request = request.with_name(ObjName::new(name)?);
    }

    let loader = ProgramLoader::with_options(LinuxGateway, config.load_options())?;
    let program = loader.load(&request).with_context(|| {
        format!(
            "Failed to load section {:?} of {}",
            args.section,
            args.object.display()
        )
    })?;

    let mode = if args.pin_path.is_some() {
        PinningMode::CustomNamespace
    } else {
        PinningMode::None
    };
    let state = pin_fd(program.as_fd(), mode, args.pin_path.as_deref())?;

    Ok(Report::Program(ProgramReport {
        object: args.object,
        section: section.section,
        name: args.name,
        program_type: program.program_type().to_string(),
        instructions: program.insn_count(),
        license,
        fd: program.as_raw_fd(),
        pin: PinReport {
            mode: mode.to_string(),
            state,
            path: args.pin_path,
        },
    }))
}

fn pin_path_command(config: &LoaderConfig, args: PinPathArgs) -> Result<Report> {
    let name = ObjName::new(&args.name)?;
    let mode = pinning_mode(args.pin);
    let path = config
        .pin_layout()
        .path_for(mode, args.object.as_deref(), &name)?;

    Ok(Report::PinPath(PinPathReport {
        name: args.name,
        mode: mode.to_string(),
        path,
    }))
}
