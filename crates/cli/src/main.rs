use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use georelay::prelude::*;
use georelay::MemoryEngine;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use tracing_subscriber::fmt::SubscriberBuilder;

#[derive(Parser)]
#[command(name = "georelay")]
#[command(about = "Geometry conversions through a single engine session")]
struct Cmd {
    /// Keep at most this many bytes of each engine message
    #[arg(long, default_value_t = 255)]
    message_limit: usize,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Encode WKT as hex WKB
    WktToWkb {
        /// Input file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,
        #[arg(long, default_value_t = 3)]
        dimension: u8,
        #[arg(long)]
        big_endian: bool,
        #[arg(long)]
        no_srid: bool,
    },
    /// Decode hex WKB to WKT
    WkbToWkt {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Polygonize WKT linework
    Polygonize {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Merge WKT lines through shared endpoints
    LineMerge {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Describe one WKT geometry
    Info {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Print crate and engine versions
    Version,
}

#[derive(Serialize)]
struct PolygonizeReport {
    rings: Vec<String>,
    cut_edges: Vec<String>,
    dangles: Vec<String>,
    invalid_rings: Vec<String>,
}

#[derive(Serialize)]
struct InfoReport {
    geometry_type: String,
    composite: bool,
    srid: i32,
    empty: bool,
    has_z: bool,
    dimension: usize,
    num_coordinates: usize,
    num_geometries: usize,
    area: f64,
    length: f64,
    envelope: String,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    let cfg = SessionCfg {
        message_limit: cmd.message_limit,
        ..SessionCfg::default()
    };
    let session = Session::open_with(MemoryEngine::new(), cfg)?;
    let out = dispatch(&session, cmd.action)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    if session.notices() > 0 {
        tracing::info!(notices = session.notices(), "engine notices forwarded");
    }
    Ok(())
}

fn dispatch(session: &Session, action: Action) -> Result<Value> {
    match action {
        Action::WktToWkb {
            input,
            dimension,
            big_endian,
            no_srid,
        } => {
            let g = read_wkt(session, &input)?;
            let mut writer = WkbWriter::new(session)?;
            writer.set_output_dimension(dimension)?;
            writer.set_include_srid(!no_srid)?;
            if big_endian {
                writer.set_byte_order(ByteOrder::Big)?;
            }
            let hex = writer.write_hex(&g)?;
            tracing::info!(input, bytes = hex.len() / 2, "wkt_to_wkb");
            Ok(serde_json::json!({ "wkb": hex }))
        }
        Action::WkbToWkt { input } => {
            let text = read_input(&input)?;
            let g = WkbReader::new(session)?
                .read_hex(text.trim())
                .with_context(|| format!("decoding WKB from {input}"))?;
            Ok(serde_json::json!({ "wkt": g.to_wkt()? }))
        }
        Action::Polygonize { input } => {
            let g = read_wkt(session, &input)?;
            let out = polygonize(&g)?;
            tracing::info!(
                rings = out.rings.len(),
                cut_edges = out.cut_edges.len(),
                dangles = out.dangles.len(),
                invalid_rings = out.invalid_rings.len(),
                "polygonize"
            );
            let report = PolygonizeReport {
                rings: wkt_all(&out.rings)?,
                cut_edges: wkt_all(&out.cut_edges)?,
                dangles: wkt_all(&out.dangles)?,
                invalid_rings: wkt_all(&out.invalid_rings)?,
            };
            Ok(serde_json::to_value(report)?)
        }
        Action::LineMerge { input } => {
            let g = read_wkt(session, &input)?;
            let lines = line_merge(&g)?;
            Ok(serde_json::json!({ "lines": wkt_all(&lines)? }))
        }
        Action::Info { input } => {
            let g = read_wkt(session, &input)?;
            let report = InfoReport {
                geometry_type: g.type_name()?,
                composite: g.geometry_type()?.is_composite(),
                srid: g.srid()?,
                empty: g.is_empty()?,
                has_z: g.has_z()?,
                dimension: g.dimension()?,
                num_coordinates: g.num_coordinates()?,
                num_geometries: g.num_geometries()?,
                area: g.area()?,
                length: g.length()?,
                envelope: g.envelope()?.to_wkt()?,
            };
            Ok(serde_json::to_value(report)?)
        }
        Action::Version => Ok(serde_json::json!({
            "georelay": georelay::VERSION,
            "engine": engine_version(session),
        })),
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).with_context(|| format!("reading {input}"))
}

fn read_wkt(session: &Session, input: &str) -> Result<Geometry> {
    let text = read_input(input)?;
    WktReader::new(session)?
        .read(text.trim())
        .with_context(|| format!("parsing WKT from {input}"))
}

fn wkt_all(parts: &[Geometry]) -> Result<Vec<String>> {
    Ok(parts.iter().map(Geometry::to_wkt).collect::<georelay::Result<_>>()?)
}
