//! Raster tile rendering: Liang-Barsky line clipping plus
//! Bresenham draw into a plain RGBA buffer. Pure and synchronous; has no
//! knowledge of tile pyramids, caching, or an HTTP server.

use crate::dataset::Osm;
use crate::error::Result;
use crate::geometry::way_is_area;
use crate::highway::Highway;
use std::str::FromStr;

#[derive(Debug, Clone, Copy)]
pub struct TileExtent {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StrokeStyle {
    pub rgba: [u8; 4],
    pub width_px: u32,
}

/// Maps a way's `(highway, is_area)` classification to a stroke style.
/// Unrecognized `highway` values fall back to `default_style`.
pub struct Style {
    pub styles: Vec<(Highway, StrokeStyle)>,
    pub area_style: StrokeStyle,
    pub default_style: StrokeStyle,
}

impl Style {
    fn resolve(&self, highway: Option<&str>, is_area: bool) -> StrokeStyle {
        if is_area {
            return self.area_style;
        }
        let Some(highway) = highway.and_then(|h| Highway::from_str(h).ok()) else {
            return self.default_style;
        };
        self.styles
            .iter()
            .find(|(h, _)| h == &highway)
            .map(|(_, s)| *s)
            .unwrap_or(self.default_style)
    }
}

impl Default for Style {
    fn default() -> Self {
        Style {
            styles: vec![
                (Highway::Motorway, StrokeStyle { rgba: [226, 122, 143, 255], width_px: 3 }),
                (Highway::Trunk, StrokeStyle { rgba: [249, 178, 156, 255], width_px: 3 }),
                (Highway::Primary, StrokeStyle { rgba: [252, 214, 164, 255], width_px: 2 }),
                (Highway::Secondary, StrokeStyle { rgba: [247, 250, 191, 255], width_px: 2 }),
                (Highway::Residential, StrokeStyle { rgba: [255, 255, 255, 255], width_px: 1 }),
                (Highway::Footway, StrokeStyle { rgba: [250, 138, 160, 255], width_px: 1 }),
            ],
            area_style: StrokeStyle { rgba: [200, 200, 200, 255], width_px: 1 },
            default_style: StrokeStyle { rgba: [180, 180, 180, 255], width_px: 1 },
        }
    }
}

pub struct Rgba8Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Rgba8Image {
    fn blank(width: u32, height: u32) -> Self {
        Rgba8Image { width, height, pixels: vec![0u8; (width * height * 4) as usize] }
    }

    fn set_pixel(&mut self, x: i64, y: i64, rgba: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let offset = ((y as u32 * self.width + x as u32) * 4) as usize;
        self.pixels[offset..offset + 4].copy_from_slice(&rgba);
    }
}

/// Affine map from `extent` to pixel space, y-flipped so row 0 is north.
struct Transform {
    extent: TileExtent,
    width: f64,
    height: f64,
}

impl Transform {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lon_span = (self.extent.max_lon - self.extent.min_lon).max(f64::EPSILON);
        let lat_span = (self.extent.max_lat - self.extent.min_lat).max(f64::EPSILON);
        let x = (lon - self.extent.min_lon) / lon_span * self.width;
        let y = (1.0 - (lat - self.extent.min_lat) / lat_span) * self.height;
        (x, y)
    }
}

/// Liang-Barsky clip of the segment `(x0,y0)-(x1,y1)` to `[0,width) x
/// [0,height)`. Returns the clipped endpoints, or `None` if the segment
/// lies entirely outside.
fn liang_barsky_clip(x0: f64, y0: f64, x1: f64, y1: f64, width: f64, height: f64) -> Option<(f64, f64, f64, f64)> {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    let checks = [(-dx, x0), (dx, width - x0), (-dy, y0), (dy, height - y0)];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            if r > t0 {
                t0 = r;
            }
        } else {
            if r < t0 {
                return None;
            }
            if r < t1 {
                t1 = r;
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((x0 + t0 * dx, y0 + t0 * dy, x0 + t1 * dx, y0 + t1 * dy))
}

/// Integer Bresenham rasterization of a single line segment with the given
/// pixel width (drawn as `width_px` parallel rows/columns around the ideal
/// line, matching the style of a cheap thick-line approximation rather
/// than true stroke geometry).
fn draw_line(image: &mut Rgba8Image, x0: f64, y0: f64, x1: f64, y1: f64, style: StrokeStyle) {
    let mut x0 = x0.round() as i64;
    let mut y0 = y0.round() as i64;
    let x1 = x1.round() as i64;
    let y1 = y1.round() as i64;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let half_width = (style.width_px as i64 - 1) / 2;
    loop {
        for ox in -half_width..=half_width {
            for oy in -half_width..=half_width {
                image.set_pixel(x0 + ox, y0 + oy, style.rgba);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Renders every way in `osm` intersecting `extent` into a `width x
/// height` RGBA raster.
pub fn render_tile(osm: &Osm, extent: TileExtent, width: u32, height: u32, style: &Style) -> Result<Rgba8Image> {
    let mut image = Rgba8Image::blank(width, height);
    let transform = Transform { extent, width: width as f64, height: height as f64 };

    let bbox = crate::node_table::BBox {
        min_lon: extent.min_lon,
        min_lat: extent.min_lat,
        max_lon: extent.max_lon,
        max_lat: extent.max_lat,
    };
    let candidates = osm.ways().intersects(&bbox)?;

    for way_index in candidates {
        let refs = osm.ways().refs_of(way_index)?;
        let tags = osm.ways().tags_of(way_index, osm.strings())?;
        let is_area = way_is_area(refs, &tags);
        let stroke = style.resolve(tags.get("highway").map(String::as_str), is_area);

        let mut points = Vec::with_capacity(refs.len());
        for &node_id in refs {
            if let Some(idx) = osm.nodes().index_of(node_id) {
                let (lon, lat) = osm.nodes().coord_of(idx)?;
                points.push(transform.project(lon, lat));
            }
        }

        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if let Some((cx0, cy0, cx1, cy1)) = liang_barsky_clip(x0, y0, x1, y1, width as f64, height as f64) {
                draw_line(&mut image, cx0, cy0, cx1, cy1, stroke);
            }
        }
    }

    Ok(image)
}
