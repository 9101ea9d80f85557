use std::f64;
use terraflow_common::structures::Point2D;

/// The ESRI shapefile geometry types supported by this library.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum ShapeType {
    #[default]
    Null,
    Point,
    PolyLine,
    Polygon,
    PointZ,
    PolyLineZ,
    PolygonZ,
}

impl ShapeType {
    pub fn from_int(value: i32) -> ShapeType {
        match value {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            _ => ShapeType::Null,
        }
    }

    pub fn to_int(&self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
        }
    }

    /// Reduces a Z-type to its planar base type.
    pub fn base_shape_type(&self) -> ShapeType {
        match self {
            ShapeType::PointZ => ShapeType::Point,
            ShapeType::PolyLineZ => ShapeType::PolyLine,
            ShapeType::PolygonZ => ShapeType::Polygon,
            _ => *self,
        }
    }

    pub fn dimension(&self) -> u8 {
        match self {
            ShapeType::PointZ | ShapeType::PolyLineZ | ShapeType::PolygonZ => 3,
            _ => 2,
        }
    }
}

/// A single shapefile record geometry: one or more parts of points with an
/// optional z per point.
#[derive(Default, Clone, Debug)]
pub struct ShapefileGeometry {
    pub shape_type: ShapeType,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub num_parts: i32,
    pub num_points: i32,
    pub parts: Vec<i32>,
    pub points: Vec<Point2D>,
    pub z_min: f64,
    pub z_max: f64,
    pub z_array: Vec<f64>,
}

impl ShapefileGeometry {
    pub fn new(shape_type: ShapeType) -> ShapefileGeometry {
        ShapefileGeometry {
            shape_type,
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
            z_min: f64::INFINITY,
            z_max: f64::NEG_INFINITY,
            ..Default::default()
        }
    }

    /// Appends a new part made of the supplied points.
    pub fn add_part(&mut self, points: &[Point2D]) {
        self.parts.push(self.num_points);
        self.num_parts += 1;
        for p in points {
            self.points.push(*p);
            if p.x < self.x_min {
                self.x_min = p.x;
            }
            if p.x > self.x_max {
                self.x_max = p.x;
            }
            if p.y < self.y_min {
                self.y_min = p.y;
            }
            if p.y > self.y_max {
                self.y_max = p.y;
            }
        }
        self.num_points += points.len() as i32;
    }

    /// Appends a new part with per-point z values; `points` and `z_values`
    /// must be the same length.
    pub fn add_part_with_z(&mut self, points: &[Point2D], z_values: &[f64]) {
        self.add_part(points);
        for z in z_values {
            self.z_array.push(*z);
            if *z < self.z_min {
                self.z_min = *z;
            }
            if *z > self.z_max {
                self.z_max = *z;
            }
        }
    }

    /// Record content length in bytes, as stored in the .shp record header.
    pub fn get_length(&self) -> i32 {
        match self.shape_type {
            ShapeType::Null => 4,
            ShapeType::Point => 4 + 16,
            ShapeType::PointZ => 4 + 32,
            ShapeType::PolyLine | ShapeType::Polygon => {
                4 + 32 + 8 + self.num_parts * 4 + self.num_points * 16
            }
            ShapeType::PolyLineZ | ShapeType::PolygonZ => {
                4 + 32 + 8 + self.num_parts * 4 + self.num_points * 16 + 16 + self.num_points * 8
            }
        }
    }

    pub fn has_z_data(&self) -> bool {
        !self.z_array.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::{Point2D, ShapeType, ShapefileGeometry};

    #[test]
    fn test_add_part_updates_extent() {
        let mut g = ShapefileGeometry::new(ShapeType::PolyLine);
        g.add_part(&[Point2D::new(1.0, 2.0), Point2D::new(-3.0, 5.0)]);
        g.add_part(&[Point2D::new(0.0, 0.0)]);
        assert_eq!(g.num_parts, 2);
        assert_eq!(g.num_points, 3);
        assert_eq!(g.parts, vec![0, 2]);
        assert_eq!(g.x_min, -3.0);
        assert_eq!(g.y_max, 5.0);
    }

    #[test]
    fn test_record_length() {
        let mut g = ShapefileGeometry::new(ShapeType::Polygon);
        g.add_part(&[
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(0.0, 0.0),
        ]);
        // 4 type + 32 box + 8 counts + 4 one part + 64 four points
        assert_eq!(g.get_length(), 112);
    }
}
