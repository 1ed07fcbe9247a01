use crate::db::core::DesignDB;
use crate::db::tech::*;
use crate::geom::rect::Rect;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};

#[derive(PartialEq)]
enum Scope {
    Top,
    Units,
    Layer,
    Site,
    Macro,
    Pin,
    Port,
    Obs,
    Skip(String),
}

struct LayerBuilder {
    name: String,
    layer_type: String,
    direction: LayerDirection,
    pitch: f64,
    width: f64,
    spacing: f64,
    resistance: f64,
    capacitance: f64,
    edge_capacitance: f64,
    antenna: AntennaRule,
}

impl LayerBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layer_type: String::new(),
            direction: LayerDirection::Unknown,
            pitch: 0.0,
            width: 0.0,
            spacing: 0.0,
            resistance: 0.0,
            capacitance: 0.0,
            edge_capacitance: 0.0,
            antenna: AntennaRule::default(),
        }
    }
}

fn num(parts: &[&str], i: usize) -> Result<f64> {
    let raw = parts
        .get(i)
        .with_context(|| format!("missing value in '{}'", parts.join(" ")))?;
    raw.trim_end_matches(';')
        .parse::<f64>()
        .with_context(|| format!("bad number '{}' in '{}'", raw, parts.join(" ")))
}

fn parse_pwl(parts: &[&str]) -> Vec<(f64, f64)> {
    let values: Vec<f64> = parts
        .iter()
        .filter_map(|p| p.trim_matches(|c| c == '(' || c == ')' || c == ';').parse().ok())
        .collect();
    values.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Reads technology and library data. Values are converted to database
/// units with the `DATABASE MICRONS` factor (or the current one on the db).
pub fn parse(db: &mut DesignDB, filename: &str) -> Result<()> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut scope = Scope::Top;
    let mut layer: Option<LayerBuilder> = None;
    let mut site_name = String::new();
    let mut master: Option<MasterData> = None;
    let mut pin: Option<MasterPin> = None;
    let mut shape_level: Option<usize> = None;
    let mut pwl_buffer: Option<Vec<String>> = None;

    for line in reader.lines() {
        let line = line?;
        let line = line.split('#').next().unwrap_or("");
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        // PWL tables may span several lines.
        if let Some(buffer) = pwl_buffer.as_mut() {
            buffer.extend(parts.iter().map(|s| s.to_string()));
            if line.contains(';') {
                let tokens: Vec<&str> = buffer.iter().map(|s| s.as_str()).collect();
                if let Some(l) = layer.as_mut() {
                    l.antenna.diff_par_ratio = PwlTable::new(parse_pwl(&tokens));
                }
                pwl_buffer = None;
            }
            continue;
        }

        if let Scope::Skip(block) = &scope {
            if parts[0] == "END" && parts.get(1) == Some(&block.as_str()) {
                scope = Scope::Top;
            }
            continue;
        }

        let dbu = db.dbu_per_micron as f64;
        let to_dbu = |v: f64| (v * dbu).round() as i64;

        match parts[0] {
            "UNITS" if scope == Scope::Top => scope = Scope::Units,
            "VIA" | "VIARULE" | "NONDEFAULTRULE" if scope == Scope::Top => {
                scope = Scope::Skip(parts.get(1).copied().unwrap_or("").to_string());
            }
            "PROPERTYDEFINITIONS" if scope == Scope::Top => {
                scope = Scope::Skip(parts[0].to_string());
            }
            "DATABASE" if scope == Scope::Units => {
                if parts.get(1) == Some(&"MICRONS") {
                    db.dbu_per_micron = num(&parts, 2)? as i64;
                }
            }
            "LAYER" => match scope {
                Scope::Top => {
                    layer = Some(LayerBuilder::new(parts[1]));
                    scope = Scope::Layer;
                }
                Scope::Port | Scope::Obs => {
                    let name = parts[1].trim_end_matches(';');
                    shape_level = db.layer_level(name);
                }
                _ => {}
            },
            "TYPE" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.layer_type = parts[1].trim_end_matches(';').to_string();
                }
            }
            "DIRECTION" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.direction = match parts[1].trim_end_matches(';') {
                        "VERTICAL" => LayerDirection::Vertical,
                        "HORIZONTAL" => LayerDirection::Horizontal,
                        _ => LayerDirection::Unknown,
                    };
                }
            }
            "DIRECTION" if scope == Scope::Pin => {
                if let Some(p) = pin.as_mut() {
                    p.direction = match parts[1].trim_end_matches(';') {
                        "INPUT" => PinDirection::Input,
                        "OUTPUT" => PinDirection::Output,
                        _ => PinDirection::Inout,
                    };
                }
            }
            "USE" if scope == Scope::Pin => {
                if let Some(p) = pin.as_mut() {
                    p.usage = match parts[1].trim_end_matches(';') {
                        "CLOCK" => SigType::Clock,
                        "POWER" => SigType::Power,
                        "GROUND" => SigType::Ground,
                        _ => SigType::Signal,
                    };
                }
            }
            "PITCH" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.pitch = num(&parts, 1)?;
                }
            }
            "WIDTH" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.width = num(&parts, 1)?;
                }
            }
            "SPACING" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut()
                    && l.spacing == 0.0
                {
                    l.spacing = num(&parts, 1)?;
                }
            }
            "RESISTANCE" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    let idx = if parts.get(1) == Some(&"RPERSQ") { 2 } else { 1 };
                    l.resistance = num(&parts, idx)?;
                }
            }
            "CAPACITANCE" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.capacitance = num(&parts, 2)?;
                }
            }
            "EDGECAPACITANCE" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.edge_capacitance = num(&parts, 1)?;
                }
            }
            "ANTENNAAREARATIO" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.antenna.par_ratio = num(&parts, 1)?;
                }
            }
            "ANTENNADIFFAREARATIO" if scope == Scope::Layer => {
                if parts.get(1) == Some(&"PWL") {
                    if line.contains(';') {
                        if let Some(l) = layer.as_mut() {
                            l.antenna.diff_par_ratio = PwlTable::new(parse_pwl(&parts[2..]));
                        }
                    } else {
                        pwl_buffer = Some(parts[2..].iter().map(|s| s.to_string()).collect());
                    }
                } else if let Some(l) = layer.as_mut() {
                    l.antenna.diff_par_ratio = PwlTable::constant(num(&parts, 1)?);
                }
            }
            "ANTENNAAREAFACTOR" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    let value = num(&parts, 1)?;
                    if parts.contains(&"DIFFUSEONLY") {
                        l.antenna.diff_area_factor = value;
                    } else {
                        l.antenna.area_factor = value;
                        l.antenna.diff_area_factor = value;
                    }
                }
            }
            "ANTENNAAREAMINUSDIFF" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.antenna.minus_diff_factor = num(&parts, 1)?;
                }
            }
            "ANTENNAGATEPLUSDIFF" if scope == Scope::Layer => {
                if let Some(l) = layer.as_mut() {
                    l.antenna.plus_diff_factor = num(&parts, 1)?;
                }
            }
            "SITE" if scope == Scope::Top => {
                site_name = parts[1].to_string();
                scope = Scope::Site;
            }
            "MACRO" if scope == Scope::Top => {
                master = Some(MasterData {
                    name: parts[1].to_string(),
                    class: MasterClass::Core,
                    width: 0,
                    height: 0,
                    pins: Vec::new(),
                    obstructions: Vec::new(),
                });
                scope = Scope::Macro;
            }
            "CLASS" if scope == Scope::Macro => {
                if let Some(m) = master.as_mut() {
                    let class = parts[1].trim_end_matches(';');
                    m.class = match class {
                        "CORE" if parts.contains(&"ANTENNACELL") => MasterClass::CoreAntennaCell,
                        "CORE" => MasterClass::Core,
                        "PAD" => MasterClass::Pad,
                        "BLOCK" | "RING" => MasterClass::Block,
                        "COVER" => MasterClass::Cover,
                        _ => MasterClass::Other,
                    };
                }
            }
            "SIZE" => {
                let w = num(&parts, 1)?;
                let h = num(&parts, 3)?;
                match scope {
                    Scope::Macro => {
                        if let Some(m) = master.as_mut() {
                            m.width = to_dbu(w);
                            m.height = to_dbu(h);
                        }
                    }
                    Scope::Site => {
                        db.sites.insert(site_name.clone(), (to_dbu(w), to_dbu(h)));
                    }
                    _ => {}
                }
            }
            "PIN" if scope == Scope::Macro => {
                pin = Some(MasterPin {
                    name: parts[1].to_string(),
                    direction: PinDirection::Inout,
                    usage: SigType::Signal,
                    shapes: Vec::new(),
                    gate_area: 0.0,
                    diff_area: 0.0,
                });
                scope = Scope::Pin;
            }
            "ANTENNAGATEAREA" if scope == Scope::Pin => {
                if let Some(p) = pin.as_mut() {
                    p.gate_area = p.gate_area.max(num(&parts, 1)?);
                }
            }
            "ANTENNADIFFAREA" if scope == Scope::Pin => {
                if let Some(p) = pin.as_mut() {
                    p.diff_area = p.diff_area.max(num(&parts, 1)?);
                }
            }
            "PORT" if scope == Scope::Pin => {
                scope = Scope::Port;
                shape_level = None;
            }
            "OBS" if scope == Scope::Macro => {
                scope = Scope::Obs;
                shape_level = None;
            }
            "RECT" if scope == Scope::Port || scope == Scope::Obs => {
                let offset = usize::from(parts.get(1) == Some(&"MASK")) * 2;
                let rect = Rect::from_corners(
                    to_dbu(num(&parts, 1 + offset)?),
                    to_dbu(num(&parts, 2 + offset)?),
                    to_dbu(num(&parts, 3 + offset)?),
                    to_dbu(num(&parts, 4 + offset)?),
                );
                if let Some(level) = shape_level {
                    if scope == Scope::Port {
                        if let Some(p) = pin.as_mut() {
                            p.shapes.push((level, rect));
                        }
                    } else if let Some(m) = master.as_mut() {
                        m.obstructions.push((level, rect));
                    }
                }
            }
            "END" => {
                let name = parts.get(1).copied().unwrap_or("");
                match scope {
                    Scope::Units if name == "UNITS" => scope = Scope::Top,
                    Scope::Layer => {
                        if let Some(l) = layer.take() {
                            commit_layer(db, l);
                        }
                        scope = Scope::Top;
                    }
                    Scope::Site => scope = Scope::Top,
                    Scope::Port | Scope::Obs if name.is_empty() => {
                        scope = if scope == Scope::Port {
                            Scope::Pin
                        } else {
                            Scope::Macro
                        };
                    }
                    Scope::Pin => {
                        if let (Some(p), Some(m)) = (pin.take(), master.as_mut()) {
                            m.pins.push(p);
                        }
                        scope = Scope::Macro;
                    }
                    Scope::Macro => {
                        if let Some(m) = master.take() {
                            db.add_master(m);
                        }
                        scope = Scope::Top;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    log::info!(
        "LEF {}: {} routing layers, {} cut layers, {} masters",
        filename,
        db.layers.len(),
        db.cut_layers.len(),
        db.masters.len()
    );

    Ok(())
}

fn commit_layer(db: &mut DesignDB, l: LayerBuilder) {
    let dbu = db.dbu_per_micron as f64;
    match l.layer_type.as_str() {
        "ROUTING" => {
            let mut data = LayerData::new(
                l.name,
                l.direction,
                (l.pitch * dbu).round() as i64,
                (l.width * dbu).round() as i64,
            );
            data.spacing = (l.spacing * dbu).round() as i64;
            data.resistance = l.resistance;
            data.capacitance = l.capacitance;
            data.edge_capacitance = l.edge_capacitance;
            data.antenna = l.antenna;
            db.add_layer(data);
        }
        "CUT" => db.add_cut_layer(l.name, l.resistance),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LEF: &str = r#"
UNITS
  DATABASE MICRONS 2000 ;
END UNITS

LAYER metal1
  TYPE ROUTING ;
  DIRECTION HORIZONTAL ;
  PITCH 0.19 ;
  WIDTH 0.07 ;
  RESISTANCE RPERSQ 5.4 ;
  CAPACITANCE CPERSQDIST 7.7e-05 ;
  EDGECAPACITANCE 2.7e-05 ;
  ANTENNAAREARATIO 300 ;
  ANTENNADIFFAREARATIO PWL ( ( 0 400 )
    ( 0.0125 2200 ) ) ;
END metal1

LAYER via1
  TYPE CUT ;
  RESISTANCE 5 ;
END via1

LAYER metal2
  TYPE ROUTING ;
  DIRECTION VERTICAL ;
  PITCH 0.19 ;
  WIDTH 0.07 ;
END metal2

SITE core
  SIZE 0.19 BY 1.4 ;
END core

MACRO INV
  CLASS CORE ;
  SIZE 0.38 BY 1.4 ;
  PIN A
    DIRECTION INPUT ;
    ANTENNAGATEAREA 0.05 ;
    PORT
      LAYER metal1 ;
        RECT 0.0 0.0 0.1 0.1 ;
    END
  END A
  OBS
    LAYER metal1 ;
      RECT 0.2 0.2 0.3 0.3 ;
  END
END INV

MACRO ANTENNA
  CLASS CORE ANTENNACELL ;
  SIZE 0.19 BY 1.4 ;
  PIN A
    ANTENNADIFFAREA 0.02 ;
    PORT
      LAYER metal1 ;
        RECT 0 0 0.1 0.1 ;
    END
  END A
END ANTENNA
"#;

    #[test]
    fn parses_technology_and_masters() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LEF.as_bytes()).unwrap();

        let mut db = DesignDB::new();
        parse(&mut db, file.path().to_str().unwrap()).unwrap();

        assert_eq!(db.dbu_per_micron, 2000);
        assert_eq!(db.layers.len(), 2);
        let m1 = db.routing_layer(1).unwrap();
        assert_eq!(m1.pitch, 380);
        assert_eq!(m1.direction, LayerDirection::Horizontal);
        assert_eq!(m1.antenna.par_ratio, 300.0);
        assert_eq!(m1.antenna.diff_par_ratio.value_at(0.0125), 2200.0);
        assert_eq!(db.cut_layer_above(1).unwrap().resistance, 5.0);
        assert_eq!(db.sites["core"], (380, 2800));

        let inv = &db.masters[db.find_master("INV").unwrap().index()];
        assert_eq!(inv.width, 760);
        assert_eq!(inv.pins[0].gate_area, 0.05);
        assert_eq!(inv.pins[0].shapes, vec![(1, Rect::from_corners(0, 0, 200, 200))]);
        assert_eq!(inv.obstructions.len(), 1);

        let diode = &db.masters[db.find_master("ANTENNA").unwrap().index()];
        assert_eq!(diode.class, MasterClass::CoreAntennaCell);
        assert_eq!(diode.pins[0].diff_area, 0.02);
    }
}
