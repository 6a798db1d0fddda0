//! Area of interest: a point with a radius or a polygon ring, normalized into
//! one canonical geometry plus its bounding box.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.32;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    /// `[min_lon, min_lat, max_lon, max_lat]`, the STAC ordering.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    pub fn width_deg(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height_deg(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// Pixel dimensions whose longest side is `size`, keeping the ground aspect
    /// ratio (longitude shrinks with the cosine of the latitude).
    pub fn pixel_dims(&self, size: u32) -> (u32, u32) {
        let (_, lat) = self.center();
        let ground_w = self.width_deg() * lat.to_radians().cos();
        let ground_h = self.height_deg();
        if ground_w <= 0.0 || ground_h <= 0.0 {
            return (size, size);
        }

        if ground_w >= ground_h {
            let h = ((size as f64) * ground_h / ground_w).round().max(1.0) as u32;
            (size, h)
        } else {
            let w = ((size as f64) * ground_w / ground_h).round().max(1.0) as u32;
            (w, size)
        }
    }
}

/// The two accepted area descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    PointRadius { lon: f64, lat: f64, radius_km: f64 },
    Polygon { coordinates: Vec<[f64; 2]> },
}

/// Validated geometry with its cached bounding box. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Geometry", into = "Geometry")]
pub struct AreaOfInterest {
    geometry: Geometry,
    bbox: BBox,
}

impl AreaOfInterest {
    pub fn point_radius(lon: f64, lat: f64, radius_km: f64) -> Result<Self> {
        check_coordinate(lon, lat)?;
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AnalysisError::InvalidGeometry(format!(
                "radius must be positive, got {radius_km} km"
            )));
        }

        // Square buffer around the point, as a catalog footprint
        let dlat = radius_km / KM_PER_DEGREE;
        let cos_lat = lat.to_radians().cos().max(1e-6);
        let dlon = radius_km / (KM_PER_DEGREE * cos_lat);
        let bbox = BBox {
            min_lon: (lon - dlon).max(-180.0),
            min_lat: (lat - dlat).max(-90.0),
            max_lon: (lon + dlon).min(180.0),
            max_lat: (lat + dlat).min(90.0),
        };

        Ok(Self {
            geometry: Geometry::PointRadius { lon, lat, radius_km },
            bbox,
        })
    }

    /// Build from a ring of `(lon, lat)` pairs. A closing point equal to the
    /// first one is dropped.
    pub fn polygon(ring: Vec<[f64; 2]>) -> Result<Self> {
        let mut ring = ring;
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(AnalysisError::InvalidGeometry(format!(
                "polygon needs at least 3 points, got {}",
                ring.len()
            )));
        }
        for [lon, lat] in &ring {
            check_coordinate(*lon, *lat)?;
        }
        if ring.windows(2).any(|w| w[0] == w[1]) {
            return Err(AnalysisError::InvalidGeometry(
                "polygon has repeated consecutive vertices".to_string(),
            ));
        }
        if shoelace_area(&ring).abs() < 1e-12 {
            return Err(AnalysisError::InvalidGeometry(
                "polygon is degenerate (zero area)".to_string(),
            ));
        }

        let mut bbox = BBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for [lon, lat] in &ring {
            bbox.min_lon = bbox.min_lon.min(*lon);
            bbox.min_lat = bbox.min_lat.min(*lat);
            bbox.max_lon = bbox.max_lon.max(*lon);
            bbox.max_lat = bbox.max_lat.max(*lat);
        }

        Ok(Self {
            geometry: Geometry::Polygon { coordinates: ring },
            bbox,
        })
    }

    /// Resolve the request-layer inputs. A polygon wins over a point when both
    /// are supplied.
    pub fn from_parts(
        point: Option<(f64, f64)>,
        radius_km: f64,
        polygon: Option<Vec<[f64; 2]>>,
    ) -> Result<Self> {
        match (polygon, point) {
            (Some(ring), _) => Self::polygon(ring),
            (None, Some((lon, lat))) => Self::point_radius(lon, lat, radius_km),
            (None, None) => Err(AnalysisError::MissingArea),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }
}

impl TryFrom<Geometry> for AreaOfInterest {
    type Error = AnalysisError;

    fn try_from(geometry: Geometry) -> Result<Self> {
        match geometry {
            Geometry::PointRadius { lon, lat, radius_km } => Self::point_radius(lon, lat, radius_km),
            Geometry::Polygon { coordinates } => Self::polygon(coordinates),
        }
    }
}

impl From<AreaOfInterest> for Geometry {
    fn from(area: AreaOfInterest) -> Self {
        area.geometry
    }
}

fn check_coordinate(lon: f64, lat: f64) -> Result<()> {
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(AnalysisError::InvalidGeometry(format!(
            "coordinate out of range: ({lon}, {lat})"
        )));
    }
    Ok(())
}

fn shoelace_area(ring: &[[f64; 2]]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let [x1, y1] = ring[i];
            let [x2, y2] = ring[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();
    twice / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_polygon_is_invalid() {
        let err = AreaOfInterest::polygon(vec![[10.0, 45.0], [10.1, 45.1]]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidGeometry(_)));
    }

    #[test]
    fn collinear_polygon_is_degenerate() {
        let err =
            AreaOfInterest::polygon(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidGeometry(_)));
    }

    #[test]
    fn closed_ring_drops_duplicate_end() {
        let area = AreaOfInterest::polygon(vec![
            [10.0, 45.0],
            [10.2, 45.0],
            [10.2, 45.3],
            [10.0, 45.0],
        ])
        .unwrap();
        match area.geometry() {
            Geometry::Polygon { coordinates } => assert_eq!(coordinates.len(), 3),
            other => panic!("unexpected geometry {other:?}"),
        }
        let bbox = area.bbox();
        assert_eq!(bbox.min_lon, 10.0);
        assert_eq!(bbox.max_lon, 10.2);
        assert_eq!(bbox.max_lat, 45.3);
    }

    #[test]
    fn point_radius_bbox_is_centered() {
        let area = AreaOfInterest::point_radius(30.0, 0.0, 1.0).unwrap();
        let (lon, lat) = area.bbox().center();
        assert!((lon - 30.0).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
        assert!((area.bbox().height_deg() - 2.0 / KM_PER_DEGREE).abs() < 1e-9);
    }

    #[test]
    fn missing_area_is_reported() {
        let err = AreaOfInterest::from_parts(None, 0.5, None).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingArea));
    }

    #[test]
    fn bad_radius_and_coordinates_rejected() {
        assert!(AreaOfInterest::point_radius(10.0, 45.0, 0.0).is_err());
        assert!(AreaOfInterest::point_radius(200.0, 45.0, 1.0).is_err());
    }

    #[test]
    fn serde_revalidates() {
        let area = AreaOfInterest::point_radius(10.0, 45.0, 0.5).unwrap();
        let json = serde_json::to_string(&area).unwrap();
        assert!(json.contains("\"type\":\"point_radius\""));
        let back: AreaOfInterest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, area);

        let bad = r#"{"type":"polygon","coordinates":[[0.0,0.0],[1.0,1.0]]}"#;
        assert!(serde_json::from_str::<AreaOfInterest>(bad).is_err());
    }

    #[test]
    fn pixel_dims_keep_aspect() {
        let bbox = BBox {
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 2.0,
            max_lat: 1.0,
        };
        assert_eq!(bbox.pixel_dims(512), (512, 256));
    }
}
