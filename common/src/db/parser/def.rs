use crate::db::core::{DesignDB, PlacementStatus, RowData, Wire, WireShape};
use crate::db::indices::CellId;
use crate::db::tech::{SigType, TrackAxis, TrackDef};
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use anyhow::{Context, Result, anyhow};

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Components,
    Pins,
    Nets,
    SpecialNets,
    Blockages,
    Other,
}

/// Splits the file into `;`-terminated statements. `END <SECTION>` lines
/// carry no semicolon and become statements of their own.
fn statements(content: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut pending_end = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("");
        for raw in line.split_whitespace() {
            if pending_end {
                out.push(vec!["END", raw]);
                pending_end = false;
                continue;
            }
            if raw == "END" && current.is_empty() {
                pending_end = true;
                continue;
            }
            if raw == ";" {
                out.push(std::mem::take(&mut current));
            } else if let Some(stripped) = raw.strip_suffix(';') {
                current.push(stripped);
                out.push(std::mem::take(&mut current));
            } else {
                current.push(raw);
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

struct Units {
    scale: f64,
}

impl Units {
    fn coord(&self, token: &str) -> Result<i64> {
        let v: f64 = token
            .parse()
            .with_context(|| format!("bad DEF coordinate '{}'", token))?;
        Ok((v * self.scale).round() as i64)
    }
}

/// Collects `( x y )` points following `start`, resolving `*` to the
/// previous value.
fn points(tokens: &[&str], units: &Units) -> Result<Vec<Point<i64>>> {
    let mut pts = Vec::new();
    let mut i = 0;
    let mut last = Point::new(0, 0);
    while i < tokens.len() {
        if tokens[i] == "(" && i + 2 < tokens.len() {
            let x = if tokens[i + 1] == "*" {
                last.x
            } else {
                units.coord(tokens[i + 1])?
            };
            let y = if tokens[i + 2] == "*" {
                last.y
            } else {
                units.coord(tokens[i + 2])?
            };
            last = Point::new(x, y);
            pts.push(last);
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(pts)
}

pub fn parse(db: &mut DesignDB, filename: &str) -> Result<()> {
    let content = std::fs::read_to_string(filename)?;
    let mut section = Section::None;
    let mut units = Units { scale: 1.0 };
    let lef_loaded = !db.layers.is_empty() || !db.masters.is_empty();

    for st in statements(&content) {
        if st.is_empty() {
            continue;
        }

        match st[0] {
            "DESIGN" if section == Section::None => {
                if let Some(name) = st.get(1) {
                    db.name = name.to_string();
                }
            }
            "UNITS" => {
                let def_units: f64 = st
                    .last()
                    .context("UNITS statement without value")?
                    .parse()?;
                if lef_loaded {
                    units.scale = db.dbu_per_micron as f64 / def_units;
                    if (units.scale - 1.0).abs() > f64::EPSILON {
                        log::warn!(
                            "DEF units ({}) differ from LEF database units ({}); rescaling.",
                            def_units,
                            db.dbu_per_micron
                        );
                    }
                } else {
                    db.dbu_per_micron = def_units as i64;
                }
                log::info!("DEF Units updated to: {}", def_units);
            }
            "DIEAREA" => {
                let pts = points(&st[1..], &units)?;
                let first = pts.first().ok_or_else(|| anyhow!("empty DIEAREA"))?;
                let mut r = Rect::new(*first, *first);
                for p in &pts {
                    r = r.merge(&Rect::new(*p, *p));
                }
                db.die_area = r;
            }
            "ROW" => {
                // ROW name site x y orient DO nx BY ny STEP sx sy
                if st.len() < 6 {
                    return Err(anyhow!("malformed ROW '{}'", st.join(" ")));
                }
                let site = st[2].to_string();
                let origin = Point::new(units.coord(st[3])?, units.coord(st[4])?);
                let (site_w, site_h) = db.sites.get(&site).copied().unwrap_or((0, 0));
                let mut num_sites = 1;
                let mut step_x = 0;
                if let Some(i) = st.iter().position(|&t| t == "DO") {
                    num_sites = st.get(i + 1).context("ROW DO")?.parse()?;
                }
                if let Some(i) = st.iter().position(|&t| t == "STEP") {
                    step_x = units.coord(st.get(i + 1).context("ROW STEP")?)?;
                }
                db.rows.push(RowData {
                    name: st[1].to_string(),
                    site,
                    origin,
                    num_sites,
                    site_width: if step_x > 0 { step_x } else { site_w },
                    height: site_h,
                });
            }
            "TRACKS" => {
                // TRACKS X|Y start DO n STEP s LAYER l...
                let axis = match st.get(1).copied() {
                    Some("X") => TrackAxis::X,
                    Some("Y") => TrackAxis::Y,
                    other => return Err(anyhow!("bad TRACKS axis {:?}", other)),
                };
                let start = units.coord(st.get(2).context("TRACKS start")?)?;
                let num: u32 = st.get(4).context("TRACKS count")?.parse()?;
                let step = units.coord(st.get(6).context("TRACKS step")?)?;
                if let Some(i) = st.iter().position(|&t| t == "LAYER") {
                    for layer in &st[i + 1..] {
                        db.tracks.push(TrackDef {
                            layer: layer.to_string(),
                            axis,
                            start,
                            num_tracks: num,
                            step,
                        });
                    }
                }
            }
            "COMPONENTS" => section = Section::Components,
            "PINS" => section = Section::Pins,
            "NETS" => section = Section::Nets,
            "SPECIALNETS" => section = Section::SpecialNets,
            "BLOCKAGES" => section = Section::Blockages,
            "VIAS" | "NONDEFAULTRULES" | "GROUPS" | "REGIONS" | "PROPERTYDEFINITIONS" => {
                section = Section::Other
            }
            "END" => section = Section::None,
            "-" => match section {
                Section::Components => parse_component(db, &st, &units)?,
                Section::Pins => parse_pin(db, &st, &units)?,
                Section::Nets => parse_net(db, &st, &units, false)?,
                Section::SpecialNets => parse_net(db, &st, &units, true)?,
                Section::Blockages => parse_blockage(db, &st, &units)?,
                _ => {}
            },
            _ => {}
        }
    }

    log::info!(
        "DEF {}: {} instances, {} nets, {} rows, {} track patterns",
        filename,
        db.num_cells(),
        db.num_nets(),
        db.rows.len(),
        db.tracks.len()
    );
    Ok(())
}

fn placement_status(st: &[&str]) -> PlacementStatus {
    for &t in st {
        match t {
            "PLACED" => return PlacementStatus::Placed,
            "FIXED" | "COVER" => return PlacementStatus::Fixed,
            "FIRM" => return PlacementStatus::Firm,
            "UNPLACED" => return PlacementStatus::Unplaced,
            _ => {}
        }
    }
    PlacementStatus::Unplaced
}

fn parse_component(db: &mut DesignDB, st: &[&str], units: &Units) -> Result<()> {
    let name = st.get(1).context("component name")?.to_string();
    let master_name = st.get(2).context("component master")?;
    let master = db
        .find_master(master_name)
        .ok_or_else(|| anyhow!("component '{}' uses unknown master '{}'", name, master_name))?;
    let status = placement_status(st);
    let origin = points(st, units)?.first().copied().unwrap_or_default();
    db.add_cell(name, master, origin, status)?;
    Ok(())
}

fn parse_pin(db: &mut DesignDB, st: &[&str], units: &Units) -> Result<()> {
    let name = st.get(1).context("pin name")?.to_string();
    let mut net_name = None;
    let mut use_clock = false;
    let mut layer_rect: Option<(usize, Rect)> = None;
    let mut location = Point::new(0, 0);

    let mut i = 2;
    while i < st.len() {
        match st[i] {
            "NET" => net_name = st.get(i + 1).copied(),
            "USE" => use_clock = st.get(i + 1) == Some(&"CLOCK"),
            "LAYER" => {
                let layer = st.get(i + 1).context("pin layer")?;
                let level = db
                    .layer_level(layer)
                    .ok_or_else(|| anyhow!("pin '{}' on unknown layer '{}'", name, layer))?;
                let pts = points(&st[i + 2..], units)?;
                if pts.len() >= 2 {
                    layer_rect = Some((
                        level,
                        Rect::from_corners(pts[0].x, pts[0].y, pts[1].x, pts[1].y),
                    ));
                }
            }
            "PLACED" | "FIXED" | "COVER" | "FIRM" => {
                if let Some(p) = points(&st[i + 1..], units)?.first() {
                    location = *p;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let shapes: Vec<(usize, Rect)> = layer_rect
        .map(|(l, r)| vec![(l, r.translate(location))])
        .unwrap_or_default();
    let net = net_name.map(|n| {
        let sig = if use_clock {
            SigType::Clock
        } else {
            SigType::Signal
        };
        db.add_net(n.to_string(), sig)
    });
    db.add_port(name, net, shapes)?;
    Ok(())
}

fn parse_net(db: &mut DesignDB, st: &[&str], units: &Units, special: bool) -> Result<()> {
    let name = st.get(1).context("net name")?.to_string();
    let net = db.add_net(name.clone(), SigType::Signal);
    db.nets[net.index()].special |= special;

    let mut i = 2;
    while i < st.len() && st[i] == "(" {
        let owner = st.get(i + 1).context("net terminal")?;
        let pin = st.get(i + 2).context("net terminal pin")?;
        if *owner == "PIN" {
            match db.port_name_map.get(*pin).copied() {
                Some(port) => db.connect_port(port, net),
                None => log::warn!("Net '{}' references unknown port '{}'", name, pin),
            }
        } else if *owner == "*" {
            // Global connection by pin name, typical for supply nets.
            let cells: Vec<CellId> = (0..db.num_cells())
                .map(CellId::new)
                .filter(|&c| db.master_of(c).find_pin(pin).is_some())
                .collect();
            for cell in cells {
                if let Err(e) = db.connect(cell, pin, net) {
                    log::warn!("Net '{}': global connection skipped: {}", name, e);
                }
            }
        } else if let Some(cell) = db.find_cell(owner) {
            db.connect(cell, pin, net)?;
        } else {
            log::warn!("Net '{}' references unknown instance '{}'", name, owner);
        }
        // ( owner pin [+ SYNTHESIZED] )
        while i < st.len() && st[i] != ")" {
            i += 1;
        }
        i += 1;
    }

    while i < st.len() {
        match st[i] {
            "USE" => {
                db.nets[net.index()].sig_type = match st.get(i + 1).copied() {
                    Some("CLOCK") => SigType::Clock,
                    Some("POWER") => SigType::Power,
                    Some("GROUND") => SigType::Ground,
                    _ => db.nets[net.index()].sig_type,
                };
            }
            "ROUTED" | "FIXED" | "COVER" => {
                let wire = parse_wiring(db, &st[i + 1..], units, special)?;
                if !wire.shapes.is_empty() {
                    let entry = db.nets[net.index()].wire.get_or_insert_with(Wire::default);
                    entry.shapes.extend(wire.shapes);
                    if !special {
                        db.nets[net.index()].detail_routed = true;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Parses `layer [width] ( x y ) ( x y ) via ... NEW layer ...` up to the
/// next `+` keyword.
fn parse_wiring(db: &DesignDB, tokens: &[&str], units: &Units, special: bool) -> Result<Wire> {
    let mut wire = Wire::default();
    let mut i = 0;
    let mut level = 0;
    let mut width = 0;
    let mut last: Option<Point<i64>> = None;

    while i < tokens.len() {
        let t = tokens[i];
        if t == "+" {
            break;
        }
        if i == 0 || t == "NEW" {
            let name = if t == "NEW" {
                i += 1;
                tokens.get(i).copied().unwrap_or("")
            } else {
                t
            };
            level = db.layer_level(name).unwrap_or(0);
            width = db.routing_layer(level).map(|l| l.width).unwrap_or(0);
            last = None;
            if special && let Some(w) = tokens.get(i + 1).and_then(|w| w.parse::<f64>().ok()) {
                width = (w * units.scale).round() as i64;
                i += 1;
            }
            i += 1;
            continue;
        }
        if t == "(" {
            let x_tok = tokens.get(i + 1).copied().unwrap_or("*");
            let y_tok = tokens.get(i + 2).copied().unwrap_or("*");
            let prev = last.unwrap_or_default();
            let x = if x_tok == "*" { prev.x } else { units.coord(x_tok)? };
            let y = if y_tok == "*" { prev.y } else { units.coord(y_tok)? };
            let p = Point::new(x, y);
            if let Some(prev) = last
                && level > 0
                && prev != p
            {
                let half = width / 2;
                let rect = Rect::from_corners(prev.x, prev.y, p.x, p.y).bloat(half, half);
                wire.shapes.push(WireShape::Segment { level, rect });
            }
            last = Some(p);
            while i < tokens.len() && tokens[i] != ")" {
                i += 1;
            }
            i += 1;
            continue;
        }
        if let Some(at) = last
            && level > 0
            && t.chars().next().is_some_and(|c| c.is_alphabetic())
            && t != "MASK"
            && t != "RECT"
        {
            wire.shapes.push(WireShape::Via { bottom: level, at });
        }
        i += 1;
    }
    Ok(wire)
}

fn parse_blockage(db: &mut DesignDB, st: &[&str], units: &Units) -> Result<()> {
    let mut rects = Vec::new();
    for (i, &t) in st.iter().enumerate() {
        if t == "RECT" {
            let pts = points(&st[i + 1..], units)?;
            if pts.len() >= 2 {
                rects.push(Rect::from_corners(pts[0].x, pts[0].y, pts[1].x, pts[1].y));
            }
        }
    }
    match st.get(1).copied() {
        Some("LAYER") => {
            let layer = st.get(2).context("blockage layer")?;
            match db.layer_level(layer) {
                Some(level) => db
                    .routing_blockages
                    .extend(rects.into_iter().map(|r| (level, r))),
                None => log::warn!("Blockage on non-routing layer '{}' ignored", layer),
            }
        }
        Some("PLACEMENT") => db.placement_blockages.extend(rects),
        _ => {}
    }
    Ok(())
}
