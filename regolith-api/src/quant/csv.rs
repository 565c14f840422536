//! Parser for PIQUANT map CSV output.
//!
//! Format: one title line, one header line, then one row per point per
//! detector. Detector tables are interleaved by repeating each PMC once
//! per detector; the parser regroups rows by PMC occurrence index.

use regolith_common::models::{QuantDetector, QuantFile, QuantPoint};
use regolith_common::{Error, Result};
use std::collections::BTreeMap;
use std::collections::HashMap;

const COL_PMC: &str = "PMC";
const COL_RTT: &str = "RTT";
const COL_SCLK: &str = "SCLK";
const COL_FILENAME: &str = "filename";
const COL_LIVETIME: &str = "livetime";

struct HeaderLayout {
    pmc: usize,
    rtt: Option<usize>,
    sclk: Option<usize>,
    filename: Option<usize>,
    livetime: Option<usize>,
    // data column label and its position
    data: Vec<(String, usize)>,
}

fn parse_header(line: &str) -> Result<HeaderLayout> {
    let labels: Vec<String> = line.split(',').map(|s| s.trim().to_string()).collect();

    let mut layout = HeaderLayout {
        pmc: usize::MAX,
        rtt: None,
        sclk: None,
        filename: None,
        livetime: None,
        data: Vec::new(),
    };

    for (idx, label) in labels.iter().enumerate() {
        match label.as_str() {
            COL_PMC => layout.pmc = idx,
            COL_RTT => layout.rtt = Some(idx),
            COL_SCLK => layout.sclk = Some(idx),
            COL_FILENAME => layout.filename = Some(idx),
            COL_LIVETIME => layout.livetime = Some(idx),
            "" => {}
            _ => layout.data.push((label.clone(), idx)),
        }
    }

    if layout.pmc == usize::MAX {
        return Err(Error::BadRequest("CSV column PMC not found".into()));
    }
    Ok(layout)
}

fn detector_names(count: usize) -> Vec<String> {
    match count {
        1 => vec!["Combined".to_string()],
        2 => vec!["A".to_string(), "B".to_string()],
        n => (0..n).map(|i| format!("D{}", i)).collect(),
    }
}

fn parse_int(field: &str, line_no: usize, label: &str) -> Result<i32> {
    field.trim().parse().map_err(|_| {
        Error::BadRequest(format!(
            "CSV line {}: invalid {} value: {}",
            line_no, label, field
        ))
    })
}

fn parse_float(field: &str, line_no: usize, label: &str) -> Result<f64> {
    field.trim().parse().map_err(|_| {
        Error::BadRequest(format!(
            "CSV line {}: invalid {} value: {}",
            line_no, label, field
        ))
    })
}

/// Parse PIQUANT map CSV text into the per-detector table form
pub fn parse_quant_csv(csv: &str) -> Result<QuantFile> {
    let mut lines = csv.lines().enumerate();

    // Title line carries no structure
    lines
        .next()
        .ok_or_else(|| Error::BadRequest("CSV is empty".into()))?;
    let (_, header_line) = lines
        .next()
        .ok_or_else(|| Error::BadRequest("CSV has no header line".into()))?;
    let layout = parse_header(header_line)?;

    // detector index -> rows, in first-seen order
    let mut detector_rows: Vec<Vec<QuantPoint>> = Vec::new();
    let mut pmc_seen: HashMap<i32, usize> = HashMap::new();

    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let get = |pos: usize| fields.get(pos).copied().unwrap_or("");

        let pmc = parse_int(get(layout.pmc), line_no, COL_PMC)?;

        let mut columns = BTreeMap::new();
        for (label, pos) in &layout.data {
            columns.insert(label.clone(), parse_float(get(*pos), line_no, label)?);
        }

        let point = QuantPoint {
            pmc,
            rtt: match layout.rtt {
                Some(pos) => parse_int(get(pos), line_no, COL_RTT)?,
                None => 0,
            },
            sclk: match layout.sclk {
                Some(pos) => parse_int(get(pos), line_no, COL_SCLK)?,
                None => 0,
            },
            filename: layout
                .filename
                .map(|pos| get(pos).trim().to_string())
                .unwrap_or_default(),
            livetime: match layout.livetime {
                Some(pos) => parse_float(get(pos), line_no, COL_LIVETIME)?,
                None => 0.0,
            },
            columns,
        };

        // Nth occurrence of a PMC belongs to the Nth detector
        let occurrence = pmc_seen.entry(pmc).or_insert(0);
        if *occurrence >= detector_rows.len() {
            detector_rows.push(Vec::new());
        }
        detector_rows[*occurrence].push(point);
        *occurrence += 1;
    }

    if detector_rows.is_empty() {
        return Err(Error::BadRequest("CSV contains no data rows".into()));
    }

    let names = detector_names(detector_rows.len());
    let detectors = names
        .into_iter()
        .zip(detector_rows)
        .map(|(detector, points)| QuantDetector { detector, points })
        .collect();

    Ok(QuantFile { detectors })
}
