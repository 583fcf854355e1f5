//! Channel raster, stream network and the link tree the toolset writes

use crate::config::Workspace;
use crate::error::{Error, Result};
use crate::io::geotiff::calculate_statistics;
use crate::taudem::HydroEngine;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

// One row of demtree.dat
#[derive(Debug, Clone, PartialEq)]
pub struct TreeLink {
    pub link_no: i64,
    pub start_point: i64,
    pub end_point: i64,
    pub ds_link_no: i64,
    pub us_link_no1: i64,
    pub us_link_no2: i64,
    pub order: i64,
}

impl TreeLink {
    fn from_record(path: &Path, record: &StringRecord) -> Result<Self> {
        // Rows start with a tab, so skip the empty leading field
        let values = record
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| f.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidVector {
                path: path.to_path_buf(),
                reason: format!("bad link tree row {:?}: {}", record, e),
            })?;
        if values.len() < 7 {
            return Err(Error::InvalidVector {
                path: path.to_path_buf(),
                reason: format!("link tree row has {} fields, expected 7+", values.len()),
            });
        }
        Ok(TreeLink {
            link_no: values[0],
            start_point: values[1],
            end_point: values[2],
            ds_link_no: values[3],
            us_link_no1: values[4],
            us_link_no2: values[5],
            order: values[6],
        })
    }
}

// Link topology of the derived network
#[derive(Debug, Clone, Default)]
pub struct LinkTree {
    pub links: Vec<TreeLink>,
}

impl LinkTree {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links draining out of the network (no downstream link inside it).
    pub fn outlets(&self) -> Vec<i64> {
        let known: HashMap<i64, &TreeLink> = self.links.iter().map(|l| (l.link_no, l)).collect();
        self.links
            .iter()
            .filter(|l| l.ds_link_no < 0 || !known.contains_key(&l.ds_link_no))
            .map(|l| l.link_no)
            .collect()
    }

    pub fn max_order(&self) -> i64 {
        self.links.iter().map(|l| l.order).max().unwrap_or(0)
    }
}

pub fn read_link_tree(path: &Path) -> Result<LinkTree> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut links = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        links.push(TreeLink::from_record(path, &record)?);
    }
    Ok(LinkTree { links })
}

/// Threshold the skeleton-weighted accumulation, then derive the network,
/// stream order and watershed labels from it.
pub fn build_network(engine: &dyn HydroEngine, ws: &Workspace, threshold: i64) -> Result<LinkTree> {
    info!("Channel raster at threshold {}", threshold);
    engine.threshold(ws, threshold)?;
    calculate_statistics(ws.src())?;

    info!("Stream network and watersheds");
    engine.stream_network(ws)?;
    calculate_statistics(ws.ord())?;
    calculate_statistics(ws.w())?;

    let tree = read_link_tree(&ws.tree())?;
    if tree.is_empty() {
        warn!("Stream network has no links");
    } else {
        info!(
            "Network has {} links, {} outlet(s), max order {}",
            tree.len(),
            tree.outlets().len(),
            tree.max_order()
        );
    }
    Ok(tree)
}
