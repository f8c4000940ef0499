//! Topology and workload CSV parsing.

use crate::error::SimError;
use crate::medium::Medium;
use crate::noise::NoiseSource;
use crate::types::{Algorithm, MediumId, Tick};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

/// A single injection event parsed from the workload file, sorted by `tick` on load.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadEntry {
    pub tick: Tick,
    pub source: usize,
    pub dest: i64,
    pub byte_size: u64,
}

struct TopologyRow {
    id: usize,
    pathways: usize,
    overhead: u64,
    byte_rate: f64,
    drop_rate: f64,
    logic: bool,
    link: Option<(usize, usize)>,
}

fn parse_link_field(field: &str, path: &str, line: usize) -> Result<(usize, usize), SimError> {
    let trimmed = field.trim().trim_start_matches('[').trim_end_matches(']');
    let mut parts = trimmed.split_whitespace();
    let a = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SimError::MalformedRow {
            path: path.to_string(),
            line,
            reason: format!("bad link endpoint field {field:?}"),
        })?;
    let b = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SimError::MalformedRow {
            path: path.to_string(),
            line,
            reason: format!("bad link endpoint field {field:?}"),
        })?;
    Ok((a, b))
}

fn parse_topology_row(record: &csv::StringRecord, path: &str, line: usize) -> Result<TopologyRow, SimError> {
    let field = |i: usize, name: &str| -> Result<&str, SimError> {
        record.get(i).ok_or_else(|| SimError::MalformedRow {
            path: path.to_string(),
            line,
            reason: format!("missing field {name}"),
        })
    };
    let parse_int = |s: &str, name: &str| -> Result<usize, SimError> {
        s.trim().parse().map_err(|_| SimError::MalformedRow {
            path: path.to_string(),
            line,
            reason: format!("field {name} is not an integer: {s:?}"),
        })
    };
    let id = parse_int(field(0, "id")?, "id")?;
    let pathways = parse_int(field(1, "pathways")?, "pathways")?;
    let overhead = parse_int(field(2, "overhead")?, "overhead")? as u64;
    let byte_rate_raw = field(3, "byte_rate")?;
    let byte_rate: f64 = byte_rate_raw.trim().parse().map_err(|_| SimError::MalformedRow {
        path: path.to_string(),
        line,
        reason: format!("field byte_rate is not a number: {:?}", byte_rate_raw),
    })?;
    let drop_rate_raw = field(4, "drop_rate")?;
    let drop_rate: f64 = drop_rate_raw.trim().parse().map_err(|_| SimError::MalformedRow {
        path: path.to_string(),
        line,
        reason: format!("field drop_rate is not a number: {:?}", drop_rate_raw),
    })?;
    let logic = parse_int(field(5, "logic")?, "logic")? != 0;
    let link = match record.get(6) {
        Some(f) if !f.trim().is_empty() => Some(parse_link_field(f, path, line)?),
        _ => None,
    };
    Ok(TopologyRow { id, pathways, overhead, byte_rate, drop_rate, logic, link })
}

fn mix_seed(run_seed: u64, id: usize, salt: u64) -> u64 {
    run_seed
        .wrapping_add((id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(salt)
}

/// Load a topology file and construct every medium, wired by the link rows' endpoint pairs.
/// Medium ids must form a dense `0..n` range (the arena's index space doubles as the id space).
#[allow(clippy::too_many_arguments)]
pub fn load_topology(
    path: impl AsRef<Path>,
    algorithm: Algorithm,
    hurst: f64,
    deviation: f64,
    duration: Tick,
    seed: u64,
    noise: &dyn NoiseSource,
) -> Result<Vec<Medium>, SimError> {
    let path_ref = path.as_ref();
    let path_str = path_ref.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path_ref)?;

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(parse_topology_row(&record, &path_str, i + 1)?);
    }

    let n = rows.len();
    let mut seen = vec![false; n];
    let mut slots: Vec<Option<Medium>> = (0..n).map(|_| None).collect();
    let len = duration as usize + 1;

    for row in &rows {
        if row.id >= n {
            return Err(SimError::UnknownEndpoint(row.id));
        }
        if seen[row.id] {
            return Err(SimError::DuplicateMediumId(row.id));
        }
        seen[row.id] = true;

        let base_seed = mix_seed(seed, row.id, 0);
        let throughput: Vec<f64> = noise
            .sequence(base_seed, hurst, len)
            .into_iter()
            .map(|n| (row.byte_rate * (1.0 + deviation * n)).max(1e-3))
            .collect();
        let drop: Vec<f64> = noise
            .sequence(mix_seed(seed, row.id, 1), hurst, len)
            .into_iter()
            .map(|n| (row.drop_rate * (1.0 + deviation * n)).clamp(0.0, 1.0))
            .collect();
        let mut proto_rng = StdRng::seed_from_u64(mix_seed(seed, row.id, 2));

        let medium = Medium::new(
            MediumId(row.id),
            row.pathways,
            row.overhead,
            row.byte_rate,
            row.drop_rate,
            row.logic,
            row.logic.then_some(algorithm),
            throughput,
            drop,
            &mut proto_rng,
        );
        slots[row.id] = Some(medium);
    }

    if seen.iter().any(|&s| !s) {
        let missing = seen.iter().position(|&s| !s).unwrap();
        return Err(SimError::UnknownEndpoint(missing));
    }

    let mut media: Vec<Medium> = slots.into_iter().map(|m| m.unwrap()).collect();

    for row in &rows {
        if let Some((a, b)) = row.link {
            if a >= n || b >= n {
                return Err(SimError::UnknownEndpoint(if a >= n { a } else { b }));
            }
            if a == b {
                return Err(SimError::DegenerateLink(MediumId(row.id)));
            }
            media[row.id].connections = vec![MediumId(a), MediumId(b)];
            media[a].connections.push(MediumId(row.id));
            media[b].connections.push(MediumId(row.id));
        }
    }

    Ok(media)
}

/// Load and sort a workload file by injection tick.
pub fn load_workload(path: impl AsRef<Path>) -> Result<Vec<WorkloadEntry>, SimError> {
    let path_ref = path.as_ref();
    let path_str = path_ref.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path_ref)?;

    let mut entries = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let line = i + 1;
        let get = |idx: usize, name: &str| -> Result<&str, SimError> {
            record.get(idx).ok_or_else(|| SimError::MalformedRow {
                path: path_str.clone(),
                line,
                reason: format!("missing field {name}"),
            })
        };
        let parse = |s: &str, name: &str| -> Result<i64, SimError> {
            s.trim().parse().map_err(|_| SimError::MalformedRow {
                path: path_str.clone(),
                line,
                reason: format!("field {name} is not an integer: {s:?}"),
            })
        };
        let tick = parse(get(0, "inject_tick")?, "inject_tick")?;
        let source = parse(get(1, "source_id")?, "source_id")?;
        let dest = parse(get(2, "dest_id")?, "dest_id")?;
        let byte_size = parse(get(3, "byte_size")?, "byte_size")?;
        entries.push(WorkloadEntry {
            tick: tick.max(0) as Tick,
            source: source.max(0) as usize,
            dest,
            byte_size: byte_size.max(0) as u64,
        });
    }
    entries.sort_by_key(|e| e.tick);
    Ok(entries)
}
