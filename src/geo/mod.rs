//! Plain geometry and feature values handed to downstream consumers.
use std::fmt;
use itertools::Itertools;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Point(pub f64, pub f64);

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Point3(pub f64, pub f64, pub f64);

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{},{})", self.0, self.1, self.2)
    }
}

/// A closed loop of Points bounding a Polygon or one of its holes.
///
/// Nothing checks that the first and last Points match.
#[derive(Clone, Debug, PartialEq)]
pub struct Ring(pub Box<[Point]>);

#[derive(Clone, Debug, PartialEq)]
pub struct Ring3(pub Box<[Point3]>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

/// Returns 2*area, negative iff the ring is clockwise.
///
/// Assumes the y axis points **up** (north), as in every projected or
/// geographic shapefile.
///
/// Assumes the first and last Points are identical.
pub fn signed_area2<'a, T: IntoIterator<Item = &'a Point>>(points: T) -> f64 {
    // https://en.wikipedia.org/wiki/Shoelace_formula
    points.into_iter()
        .tuple_windows()
        .map(|(p1, p2)| p1.0 * p2.1 - p2.0 * p1.1)
        .sum()
}

/// Returns winding order.
///
/// A zero-area Ring is considered to be Clockwise.
pub fn winding_order<'a, T: IntoIterator<Item = &'a Point>>(points: T) -> WindingOrder {
    if signed_area2(points) <= 0. {
        WindingOrder::Clockwise
    } else {
        WindingOrder::CounterClockwise
    }
}

impl Ring {
    pub fn winding_order(&self) -> WindingOrder {
        winding_order(self.0.iter())
    }
}

impl Ring3 {
    /// Winding order of the Ring's projection onto the XY plane.
    pub fn winding_order(&self) -> WindingOrder {
        let flat: Vec<Point> = self.0.iter().map(|p| Point(p.0, p.1)).collect();
        winding_order(flat.iter())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Point),
    Point3(Point3),
    MultiPoint(Box<[Point]>),
    MultiPoint3(Box<[Point3]>),
    LineString(Box<[Point]>),
    LineString3(Box<[Point3]>),
    MultiLineString(Box<[Box<[Point]>]>),
    MultiLineString3(Box<[Box<[Point3]>]>),
    /// Outer ring(s) first, then holes.
    Polygon(Box<[Ring]>),
    Polygon3(Box<[Ring3]>),
}

struct DisplayList<'a, T: 'a>(&'a [T]);

impl<'a, T: fmt::Display> fmt::Display for DisplayList<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", DisplayList(&*self.0))
    }
}

impl fmt::Display for Ring3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", DisplayList(&*self.0))
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Geometry::Point(ref p) => write!(f, "Point{}", p),
            Geometry::Point3(ref p) => write!(f, "Point3{}", p),
            Geometry::MultiPoint(ref ps) => write!(f, "MultiPoint{}", DisplayList(&**ps)),
            Geometry::MultiPoint3(ref ps) => write!(f, "MultiPoint3{}", DisplayList(&**ps)),
            Geometry::LineString(ref ps) => write!(f, "LineString{}", DisplayList(&**ps)),
            Geometry::LineString3(ref ps) => write!(f, "LineString3{}", DisplayList(&**ps)),
            Geometry::MultiLineString(ref lines) => {
                write!(f, "MultiLineString[")?;
                for (i, line) in lines.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", DisplayList(&**line))?;
                }
                write!(f, "]")
            }
            Geometry::MultiLineString3(ref lines) => {
                write!(f, "MultiLineString3[")?;
                for (i, line) in lines.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", DisplayList(&**line))?;
                }
                write!(f, "]")
            }
            Geometry::Polygon(ref rings) => write!(f, "Polygon{}", DisplayList(&**rings)),
            Geometry::Polygon3(ref rings) => write!(f, "Polygon3{}", DisplayList(&**rings)),
        }
    }
}

/// An axis-aligned 3D box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox3 {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox3 {
    /// A box that is unbounded along Z, for data that has no Z.
    pub fn with_xy(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> BoundingBox3 {
        BoundingBox3 {
            min: Point3(x_min, y_min, f64::NEG_INFINITY),
            max: Point3(x_max, y_max, f64::INFINITY),
        }
    }
}

impl Default for BoundingBox3 {
    fn default() -> BoundingBox3 {
        BoundingBox3 {
            min: Point3(0., 0., 0.),
            max: Point3(0., 0., 0.),
        }
    }
}

impl fmt::Display for BoundingBox3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// A geometry with its bounding box and attribute data.
///
/// `geometry` is `None` for records that have no shape (Null shapes) or whose
/// shape has no geometry representation here (MultiPatch).
#[derive(Clone, Debug, PartialEq)]
pub struct Feature<Data> {
    pub id: u64,
    pub bounding_box: BoundingBox3,
    pub geometry: Option<Geometry>,
    pub attributes: Data,
}

impl<Data: fmt::Display> fmt::Display for Feature<Data> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Feature({}, bbox:{}, ", self.id, self.bounding_box)?;
        match self.geometry {
            Some(ref g) => write!(f, "{}", g)?,
            None => write!(f, "Null")?,
        }
        write!(f, ", {})", self.attributes)
    }
}
