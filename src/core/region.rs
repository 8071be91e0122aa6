use std::f64::consts::PI;

use geo::{GeodesicArea, GeodesicDestination, Intersects, LineString, Point, Polygon, Rect, coord};
use serde_json::json;

use crate::error::{Error, Result};

/// Number of vertices used for the geodesic polygon approximating the disc
pub const REGION_VERTICES: usize = 64;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_E2: f64 = 6.694_379_990_141_316e-3;

/// Meridional radius of curvature (metres) at a geodetic latitude in degrees
pub fn meridional_radius(lat_deg: f64) -> f64 {
    let s = lat_deg.to_radians().sin();
    WGS84_A * (1.0 - WGS84_E2) / (1.0 - WGS84_E2 * s * s).powf(1.5)
}

/// Prime-vertical radius of curvature (metres) at a geodetic latitude in degrees
pub fn normal_radius(lat_deg: f64) -> f64 {
    let s = lat_deg.to_radians().sin();
    WGS84_A / (1.0 - WGS84_E2 * s * s).sqrt()
}

/// Ground distance of one degree of longitude and of latitude at `lat_deg`
pub fn metres_per_degree(lat_deg: f64) -> (f64, f64) {
    let per_lon = normal_radius(lat_deg) * lat_deg.to_radians().cos() * PI / 180.0;
    let per_lat = meridional_radius(lat_deg) * PI / 180.0;
    (per_lon.max(0.0), per_lat)
}

/// Circular area of interest: a centre point buffered by a radius in metres.
///
/// Membership and extents use a local equirectangular frame tangent at the
/// centre; the geodesic polygon is kept for footprint intersection and
/// metadata.
#[derive(Debug, Clone)]
pub struct Region {
    lon: f64,
    lat: f64,
    radius: f64,
    polygon: Polygon<f64>,
    m_per_deg_lon: f64,
    m_per_deg_lat: f64,
}

impl Region {
    /// Build the disc around (`lon`, `lat`) with `radius` metres
    pub fn new(lon: f64, lat: f64, radius: f64) -> Result<Self> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::config(format!(
                "longitude {lon} outside [-180, 180]"
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::config(format!("latitude {lat} outside [-90, 90]")));
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::config(format!(
                "buffer radius must be positive, got {radius}"
            )));
        }

        let (m_per_deg_lon, m_per_deg_lat) = metres_per_degree(lat);
        let dlat = radius / m_per_deg_lat;
        if lat + dlat >= 90.0 || lat - dlat <= -90.0 {
            return Err(Error::config(format!(
                "a {radius} m disc around latitude {lat} reaches a pole"
            )));
        }
        let dlon = radius / m_per_deg_lon;
        if lon + dlon > 180.0 || lon - dlon < -180.0 {
            return Err(Error::config(format!(
                "a {radius} m disc around longitude {lon} crosses the antimeridian"
            )));
        }

        // counter-clockwise exterior: bearings decrease from north through west
        let center = Point::new(lon, lat);
        let ring: Vec<(f64, f64)> = (0..REGION_VERTICES)
            .map(|i| {
                let bearing = 360.0 * ((REGION_VERTICES - i) % REGION_VERTICES) as f64
                    / REGION_VERTICES as f64;
                let p = center.geodesic_destination(bearing, radius);
                (p.x(), p.y())
            })
            .collect();
        let polygon = Polygon::new(LineString::from(ring), vec![]);

        Ok(Self {
            lon,
            lat,
            radius,
            polygon,
            m_per_deg_lon,
            m_per_deg_lat,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (self.lon, self.lat)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Ground metres per degree (longitude, latitude) at the centre
    pub fn metres_per_degree(&self) -> (f64, f64) {
        (self.m_per_deg_lon, self.m_per_deg_lat)
    }

    /// Exact disc area in square metres
    pub fn area_m2(&self) -> f64 {
        PI * self.radius * self.radius
    }

    pub fn area_ha(&self) -> f64 {
        self.area_m2() / 10_000.0
    }

    /// Geodesic area of the polygon approximation in square metres
    pub fn polygon_area_m2(&self) -> f64 {
        self.polygon.geodesic_area_unsigned()
    }

    /// Offset in metres (east, north) of a coordinate from the centre
    pub fn local_offset(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (lon - self.lon) * self.m_per_deg_lon,
            (lat - self.lat) * self.m_per_deg_lat,
        )
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let (x, y) = self.local_offset(lon, lat);
        x * x + y * y <= self.radius * self.radius
    }

    /// Bounding box in degrees
    pub fn bounds(&self) -> Rect<f64> {
        let dlon = if self.m_per_deg_lon > 0.0 {
            self.radius / self.m_per_deg_lon
        } else {
            180.0
        };
        let dlat = self.radius / self.m_per_deg_lat;
        Rect::new(
            coord! { x: (self.lon - dlon).max(-180.0), y: (self.lat - dlat).max(-90.0) },
            coord! { x: (self.lon + dlon).min(180.0), y: (self.lat + dlat).min(90.0) },
        )
    }

    pub fn intersects(&self, footprint: &Rect<f64>) -> bool {
        self.polygon.intersects(footprint)
    }

    /// GeoJSON description used in export sidecars
    pub fn to_geojson(&self) -> serde_json::Value {
        let ring: Vec<[f64; 2]> = self
            .polygon
            .exterior()
            .coords()
            .map(|c| [c.x, c.y])
            .collect();
        json!({
            "type": "Polygon",
            "coordinates": [ring],
            "properties": {
                "center": [self.lon, self.lat],
                "radius_m": self.radius,
            }
        })
    }
}
