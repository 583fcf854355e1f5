//! Clip the derived stream network to the dissolved watershed boundary

use crate::error::Result;
use crate::features::ChannelLink;
use crate::io::shp::read_network;
use crate::io::vector::write_channels;
use geo::{Intersects, MultiPolygon, Polygon};
use std::path::Path;
use tracing::{debug, info, warn};

/// Links whose midpoint falls inside (or on) the boundary.
pub fn links_within(links: Vec<ChannelLink>, boundary: &[Polygon<f64>]) -> Vec<ChannelLink> {
    let boundary = MultiPolygon::new(boundary.to_vec());
    links
        .into_iter()
        .filter(|link| match link.center() {
            Some(center) => boundary.intersects(&center),
            None => {
                debug!("Link {} has no geometry", link.link_no);
                false
            }
        })
        .collect()
}

/// Read the toolset network, keep the links inside the watershed and persist
/// them with the catchments' spatial reference.
pub fn clip_network(
    net: &Path,
    boundary: &[Polygon<f64>],
    pd_chnl: &Path,
    epsg: Option<u16>,
) -> Result<Vec<ChannelLink>> {
    let links = read_network(net)?;
    let total = links.len();
    let kept = links_within(links, boundary);
    if kept.is_empty() {
        warn!("No channel links inside the watershed boundary");
    }
    info!("{} of {} channel links inside the watershed", kept.len(), total);
    write_channels(pd_chnl, &kept, epsg)?;
    Ok(kept)
}
