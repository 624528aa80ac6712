//! Parses previously downloaded dive record files and prints their
//! decoded fields and sample stream as JSON.

use std::fs;
use std::path::PathBuf;

use clap::{Parser as ClapParser, ValueEnum};
use divecomputer::iterator::DiveStream;
use divecomputer::parser::FieldKind;
use divecomputer::{Family, Sample};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FamilyArg {
    OceanicAtom2,
    SuuntoVyper,
    ReefnetSensus,
    MaresIconHd,
    ShearwaterPredator,
    ShearwaterPetrel,
    DivesystemIdive,
    Tecdiving,
}

impl From<FamilyArg> for Family {
    fn from(value: FamilyArg) -> Self {
        match value {
            FamilyArg::OceanicAtom2 => Family::OceanicAtom2,
            FamilyArg::SuuntoVyper => Family::SuuntoVyper,
            FamilyArg::ReefnetSensus => Family::ReefnetSensus,
            FamilyArg::MaresIconHd => Family::MaresIconHD,
            FamilyArg::ShearwaterPredator => Family::ShearwaterPredator,
            FamilyArg::ShearwaterPetrel => Family::ShearwaterPetrel,
            FamilyArg::DivesystemIdive => Family::DiveSystemIDive,
            FamilyArg::Tecdiving => Family::TecdivingDivecomputerEu,
        }
    }
}

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Parse raw dive record files", long_about = None)]
struct Args {
    /// Which family's record layout to decode the files with
    #[arg(short, long, value_enum)]
    family: FamilyArg,

    /// Raw dive record files to parse
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ParsedDive {
    file: String,
    divetime_seconds: Option<u32>,
    max_depth_meters: Option<f64>,
    sample_count: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let family: Family = args.family.into();

    let mut parsed = Vec::new();
    for path in &args.files {
        let bytes = fs::read(path)?;
        let parser = divecomputer::registry::parser_for(family, &bytes)
            .ok_or_else(|| format!("{family:?} has no parser in this build"))?;

        let divetime_seconds = match parser.field(FieldKind::Divetime) {
            Ok(divecomputer::parser::FieldValue::U32(v)) => Some(v),
            _ => None,
        };
        let max_depth_meters = match parser.field(FieldKind::MaxDepth) {
            Ok(divecomputer::parser::FieldValue::F64(v)) => Some(v),
            _ => None,
        };

        drop(parser);

        // Stream the sample decode off a background thread via `DiveStream`
        // rather than the direct callback, so large files don't block
        // while every other file in the batch is still being read from disk.
        let sample_count = match DiveStream::spawn_decode(family, bytes) {
            Some((handle, stream)) => {
                let count = stream.filter(|sample| matches!(sample, Sample::Time(_))).count();
                handle.join().expect("decode thread panicked");
                count
            }
            None => 0,
        };

        parsed.push(ParsedDive {
            file: path.display().to_string(),
            divetime_seconds,
            max_depth_meters,
            sample_count,
        });
    }

    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}
