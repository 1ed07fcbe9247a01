use clap::{Parser, Subcommand};
use groute_common::db::core::{DesignDB, PlacementStatus};
use groute_common::db::legalizer::PlacementLegalizer;
use groute_common::db::tech::{SigType, TrackAxis};
use groute_common::util::config::Config;
use groute_common::util::{check, logger, visualization};
use groute_placer::TetrisLegalizer;
use groute_router::GlobalRouter;
use groute_router::guides::{self, GuideLayers};
use groute_router::rc::{InMemoryParasitics, RcEstimator};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Global route and write the guides.
    Route,
    /// Route, fix antenna violations with diodes, then write guides and the placed DEF.
    RepairAntennas,
    /// Route and write the per-net RC summary.
    EstimateRc,
    /// Route, repair and estimate.
    Flow,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config: Config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Flow);
    validate_input_paths(&config)?;

    if let Err(e) = run(command, &config) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn validate_input_paths(config: &Config) -> anyhow::Result<()> {
    for lef in &config.input.lef_files {
        if !Path::new(lef).exists() {
            return Err(anyhow::anyhow!("Input LEF file missing: {}", lef));
        }
    }
    if !Path::new(&config.input.def_file).exists() {
        return Err(anyhow::anyhow!(
            "Input DEF file missing: {}",
            config.input.def_file
        ));
    }
    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load_design(config: &Config) -> anyhow::Result<DesignDB> {
    let mut db = DesignDB::new();
    for lef_path in &config.input.lef_files {
        log::info!("Parsing LEF: {}", lef_path);
        groute_common::db::parser::lef::parse(&mut db, lef_path)
            .map_err(|e| anyhow::anyhow!("Invalid LEF syntax in '{}': {}", lef_path, e))?;
    }

    log::info!("Parsing DEF: {}", config.input.def_file);
    groute_common::db::parser::def::parse(&mut db, &config.input.def_file).map_err(|e| {
        anyhow::anyhow!("Invalid DEF syntax in '{}': {}", config.input.def_file, e)
    })?;

    if db.layers.is_empty() {
        return Err(anyhow::anyhow!("No layers defined! Cannot route."));
    }
    Ok(db)
}

fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    let mut db = load_design(config)?;

    if let Some(report) = &config.global_routing.congestion_report {
        prepare_output_dir(report)?;
    }
    let mut router = GlobalRouter::new(config.global_routing.clone());
    router.global_route(&db)?;

    if matches!(command, Commands::RepairAntennas | Commands::Flow) {
        repair_antennas(&mut router, &mut db, config)?;
    }

    write_guides(&router, &db, &config.output.guide_file)?;

    if matches!(command, Commands::EstimateRc | Commands::Flow) {
        estimate_rc(&router, &db, &config.output.rc_report)?;
    }
    Ok(())
}

fn repair_antennas(router: &mut GlobalRouter, db: &mut DesignDB, config: &Config) -> anyhow::Result<()> {
    if !config.antenna.enabled {
        log::warn!("Antenna repair disabled in the configuration.");
        return Ok(());
    }

    let legalizer = TetrisLegalizer::from(&config.legalization);
    let summary = router.repair_antennas(db, &config.antenna, &legalizer as &dyn PlacementLegalizer)?;
    log::info!(
        "Antenna repair: {} violations on {} nets, {} diodes, {} nets rerouted.",
        summary.violations,
        summary.violating_nets,
        summary.diodes,
        summary.rerouted
    );

    if summary.diodes > 0 {
        check::run_placement_check(db)
            .map_err(|e| anyhow::anyhow!("Placement check failed after diode insertion: {}", e))?;
    }

    if let Some(image) = &config.output.placement_image {
        prepare_output_dir(image)?;
        log::info!("Generating placement visualization...");
        visualization::draw_placement(db, image, 1000, 1000)
            .map_err(|e| anyhow::anyhow!("Failed to write placement image '{}': {}", image, e))?;
    }

    prepare_output_dir(&config.output.output_def)?;
    log::info!("Writing placed DEF to {}", config.output.output_def);
    save_def(db, &config.output.output_def)?;
    Ok(())
}

fn write_guides(router: &GlobalRouter, db: &DesignDB, path: &str) -> anyhow::Result<()> {
    let grid = router
        .grid()
        .ok_or_else(|| anyhow::anyhow!("No routing grid, was the design routed?"))?;
    let mapping = GuideLayers {
        min_layer: router.layer_range().0,
        unidirectional: router.config().unidirectional,
    };

    prepare_output_dir(path)?;
    let count = guides::write_guides(
        Path::new(path),
        db,
        router.routes(),
        grid,
        router.layers(),
        mapping,
    )?;
    log::info!("Wrote guides of {} nets to {}", count, path);
    Ok(())
}

fn estimate_rc(router: &GlobalRouter, db: &DesignDB, path: &str) -> anyhow::Result<()> {
    let mut parasitics = InMemoryParasitics::new();
    RcEstimator::new(db).estimate_all(router.routes(), router.nets(), &mut parasitics);

    prepare_output_dir(path)?;
    parasitics
        .write_summary(Path::new(path))
        .map_err(|e| anyhow::anyhow!("Failed to write RC summary '{}': {}", path, e))?;
    log::info!("Wrote RC summary of {} nets to {}", parasitics.len(), path);
    Ok(())
}

fn status_keyword(status: PlacementStatus) -> &'static str {
    match status {
        PlacementStatus::Unplaced => "UNPLACED",
        PlacementStatus::Placed => "PLACED",
        PlacementStatus::Firm => "FIRM",
        PlacementStatus::Fixed => "FIXED",
    }
}

/// Writes the placement and connectivity back as DEF. Routing is left to
/// the guides.
fn save_def(db: &DesignDB, filename: &str) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);

    writeln!(file, "VERSION 5.8 ;")?;
    writeln!(file, "DIVIDERCHAR \"/\" ;")?;
    writeln!(file, "BUSBITCHARS \"[]\" ;")?;
    writeln!(file, "DESIGN {} ;", db.name)?;
    writeln!(file, "UNITS DISTANCE MICRONS {} ;", db.dbu_per_micron)?;
    let die = &db.die_area;
    writeln!(
        file,
        "DIEAREA ( {} {} ) ( {} {} ) ;",
        die.min.x, die.min.y, die.max.x, die.max.y
    )?;

    for row in &db.rows {
        writeln!(
            file,
            "ROW {} {} {} {} N DO {} BY 1 STEP {} 0 ;",
            row.name, row.site, row.origin.x, row.origin.y, row.num_sites, row.site_width
        )?;
    }
    for track in &db.tracks {
        let axis = match track.axis {
            TrackAxis::X => "X",
            TrackAxis::Y => "Y",
        };
        writeln!(
            file,
            "TRACKS {} {} DO {} STEP {} LAYER {} ;",
            axis, track.start, track.num_tracks, track.step, track.layer
        )?;
    }

    writeln!(file, "COMPONENTS {} ;", db.num_cells())?;
    for cell in &db.cells {
        let master = &db.masters[cell.master.index()];
        if cell.status == PlacementStatus::Unplaced {
            writeln!(file, "- {} {} + UNPLACED ;", cell.name, master.name)?;
        } else {
            writeln!(
                file,
                "- {} {} + {} ( {} {} ) N ;",
                cell.name,
                master.name,
                status_keyword(cell.status),
                cell.origin.x,
                cell.origin.y
            )?;
        }
    }
    writeln!(file, "END COMPONENTS")?;

    let ports: Vec<usize> = (0..db.pins.len()).filter(|&i| db.pins[i].is_port()).collect();
    if !ports.is_empty() {
        writeln!(file, "PINS {} ;", ports.len())?;
        for &i in &ports {
            let pin = &db.pins[i];
            write!(file, "- {}", pin.name)?;
            if let Some(net) = pin.net {
                let net = &db.nets[net.index()];
                write!(file, " + NET {}", net.name)?;
                if net.sig_type == SigType::Clock {
                    write!(file, " + USE CLOCK")?;
                }
            }
            if let Some((level, rect)) = pin.shapes.first()
                && let Some(layer) = db.routing_layer(*level)
            {
                write!(
                    file,
                    " + LAYER {} ( 0 0 ) ( {} {} ) + PLACED ( {} {} ) N",
                    layer.name,
                    rect.width(),
                    rect.height(),
                    rect.min.x,
                    rect.min.y
                )?;
            }
            writeln!(file, " ;")?;
        }
        writeln!(file, "END PINS")?;
    }

    for special in [true, false] {
        let nets: Vec<_> = db.nets.iter().filter(|n| n.special == special).collect();
        if special && nets.is_empty() {
            continue;
        }
        let section = if special { "SPECIALNETS" } else { "NETS" };
        writeln!(file, "{} {} ;", section, nets.len())?;
        for net in nets {
            write!(file, "- {}", net.name)?;
            for &pin_id in &net.pins {
                let pin = &db.pins[pin_id.index()];
                match pin.cell {
                    Some(cell) => write!(file, " ( {} {} )", db.cells[cell.index()].name, pin.name)?,
                    None => write!(file, " ( PIN {} )", pin.name)?,
                }
            }
            match net.sig_type {
                SigType::Clock => write!(file, " + USE CLOCK")?,
                SigType::Power => write!(file, " + USE POWER")?,
                SigType::Ground => write!(file, " + USE GROUND")?,
                SigType::Signal => {}
            }
            writeln!(file, " ;")?;
        }
        writeln!(file, "END {}", section)?;
    }
    writeln!(file, "END DESIGN")?;
    file.flush()
}
