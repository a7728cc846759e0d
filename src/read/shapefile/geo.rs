//! Turns decoded ".shp" records into `geo` values.
use std::collections::VecDeque;
use std::iter;
use crate::geo;
use super::options::{LineParts, ReadOptions, RingRoles};
use super::shp::{PartType, RawShape, ShapeKind, Vertex};

/// A run of a record's vertices, with the part type it was given.
///
/// `part_type` is `None` when the number read as the type is not a valid part
/// type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPart<'a> {
    pub part_type: Option<PartType>,
    pub vertices: &'a [Vertex],
}

/// Slices a record's vertices into parts.
///
/// Part `i` runs from `part_starts[i]` up to the next start, and the last part
/// runs to the end. A record without part starts is a single part.
///
/// Bad starts are tolerated: at the first start that is negative, past the
/// last vertex or behind its predecessor's, slicing stops and the parts
/// resolved so far are returned.
pub fn split_parts(shape: &RawShape, ring_roles: RingRoles) -> Vec<RawPart<'_>> {
    let vertices = &*shape.vertices;
    let starts = &*shape.part_starts;
    let n = vertices.len();

    if starts.is_empty() {
        return vec![RawPart { part_type: None, vertices: vertices }];
    }

    let last = starts.len() - 1;
    let ends = starts[1..].iter()
        .map(|&s| if s < 0 { 0 } else { (s as usize).min(n) })
        .chain(iter::once(n));

    let mut parts = Vec::with_capacity(starts.len());
    for (i, (&start, end)) in starts.iter().zip(ends).enumerate() {
        if start < 0 || start as usize >= n || start as usize > end {
            tracing::debug!(
                record_number = shape.record_number,
                part = i,
                start = start,
                n_vertices = n,
                "Part start is out of range; keeping the parts before it"
            );
            break;
        }

        let type_code = if i == last && ring_roles == RingRoles::Legacy {
            start
        } else {
            shape.part_types[i]
        };

        parts.push(RawPart {
            part_type: PartType::with_i32(type_code),
            vertices: &vertices[start as usize..end],
        });
    }
    parts
}

fn point2(v: &Vertex) -> geo::Point {
    geo::Point(v.x, v.y)
}

fn point3(v: &Vertex) -> geo::Point3 {
    geo::Point3(v.x, v.y, v.z)
}

fn points<T, F: Fn(&Vertex) -> T>(vertices: &[Vertex], f: F) -> Box<[T]> {
    vertices.iter().map(f).collect::<Vec<T>>().into_boxed_slice()
}

/// Orders rings outer first. Each outer ring is put in front of the rings seen
/// so far; each inner ring goes at the back.
///
/// Nothing checks the rings are closed, wind correctly or nest.
fn polygon_rings<T, F, W>(parts: &[RawPart], ring_roles: RingRoles, make_ring: F, winding: W) -> Box<[T]>
    where F: Fn(&[Vertex]) -> T,
          W: Fn(&T) -> geo::WindingOrder
{
    let mut rings = VecDeque::<T>::with_capacity(parts.len());
    for part in parts {
        let ring = make_ring(part.vertices);
        let is_outer = match ring_roles {
            RingRoles::Legacy | RingRoles::PartTypes => match part.part_type {
                Some(PartType::OuterRing) | Some(PartType::FirstRing) => true,
                _ => false,
            },
            RingRoles::Winding => winding(&ring) == geo::WindingOrder::Clockwise,
        };

        if is_outer {
            rings.push_front(ring);
        } else {
            rings.push_back(ring);
        }
    }
    rings.into_iter().collect::<Vec<T>>().into_boxed_slice()
}

/// Builds the geometry of a record.
///
/// Returns `None` for Null and MultiPatch records, and for a Point record
/// without a vertex.
pub fn reconstruct(shape: &RawShape, options: &ReadOptions) -> Option<geo::Geometry> {
    let kind = shape.shape_type.kind();
    if kind == ShapeKind::Null || kind == ShapeKind::MultiPatch {
        return None;
    }

    let parts = split_parts(shape, options.ring_roles);
    let first: &[Vertex] = parts.first().map(|p| p.vertices).unwrap_or(&[]);
    let z = shape.shape_type.has_z();

    Some(match kind {
        ShapeKind::Point => {
            let v = first.first()?;
            if z { geo::Geometry::Point3(point3(v)) } else { geo::Geometry::Point(point2(v)) }
        }
        ShapeKind::MultiPoint => {
            if z {
                geo::Geometry::MultiPoint3(points(first, point3))
            } else {
                geo::Geometry::MultiPoint(points(first, point2))
            }
        }
        ShapeKind::PolyLine => match (options.line_parts, z) {
            (LineParts::FirstPartOnly, false) => geo::Geometry::LineString(points(first, point2)),
            (LineParts::FirstPartOnly, true) => geo::Geometry::LineString3(points(first, point3)),
            (LineParts::AllParts, false) => geo::Geometry::MultiLineString(
                parts.iter().map(|p| points(p.vertices, point2)).collect::<Vec<_>>().into_boxed_slice()
            ),
            (LineParts::AllParts, true) => geo::Geometry::MultiLineString3(
                parts.iter().map(|p| points(p.vertices, point3)).collect::<Vec<_>>().into_boxed_slice()
            ),
        },
        ShapeKind::Polygon => {
            if z {
                geo::Geometry::Polygon3(polygon_rings(
                    &parts,
                    options.ring_roles,
                    |vs| geo::Ring3(points(vs, point3)),
                    geo::Ring3::winding_order,
                ))
            } else {
                geo::Geometry::Polygon(polygon_rings(
                    &parts,
                    options.ring_roles,
                    |vs| geo::Ring(points(vs, point2)),
                    geo::Ring::winding_order,
                ))
            }
        }
        ShapeKind::Null | ShapeKind::MultiPatch => return None,
    })
}

/// The record's box in three dimensions.
///
/// Types without Z are unbounded along Z. Null records get an all-zero box.
pub fn bounding_box(shape: &RawShape) -> geo::BoundingBox3 {
    let b = &shape.bounding_box;
    if shape.shape_type.kind() == ShapeKind::Null {
        geo::BoundingBox3::default()
    } else if shape.shape_type.has_z() {
        geo::BoundingBox3 {
            min: geo::Point3(b.x_min, b.y_min, b.z_min),
            max: geo::Point3(b.x_max, b.y_max, b.z_max),
        }
    } else {
        geo::BoundingBox3::with_xy(b.x_min, b.y_min, b.x_max, b.y_max)
    }
}

#[cfg(test)]
mod test {
    use crate::geo::{Geometry, Point, Point3, Ring};
    use super::*;
    use super::super::shp::{ShpBoundingBox, ShpShapeType};

    fn v(x: f64, y: f64) -> Vertex {
        Vertex { x: x, y: y, z: 0., m: 0. }
    }

    fn shape(shape_type: ShpShapeType, starts: &[i32], vertices: &[Vertex]) -> RawShape {
        RawShape {
            shape_type: shape_type,
            record_number: 1,
            bounding_box: ShpBoundingBox::default(),
            part_starts: starts.to_vec().into_boxed_slice(),
            part_types: vec![5; starts.len()].into_boxed_slice(),
            vertices: vertices.to_vec().into_boxed_slice(),
        }
    }

    fn ring(points: &[(f64, f64)]) -> Ring {
        Ring(points.iter().map(|&(x, y)| Point(x, y)).collect::<Vec<_>>().into_boxed_slice())
    }

    // clockwise square, then a counter-clockwise hole inside it
    fn square_and_hole() -> Vec<Vertex> {
        vec![
            v(0., 0.), v(0., 4.), v(4., 4.), v(4., 0.), v(0., 0.),
            v(1., 1.), v(2., 1.), v(2., 2.), v(1., 1.),
        ]
    }

    #[test]
    fn split_without_starts() {
        let s = shape(ShpShapeType::MultiPoint, &[], &[v(1., 1.), v(2., 2.)]);
        let parts = split_parts(&s, RingRoles::Legacy);
        assert_eq!(1, parts.len());
        assert_eq!(2, parts[0].vertices.len());
        assert_eq!(None, parts[0].part_type);
    }

    #[test]
    fn split_stops_at_start_past_the_end() {
        let s = shape(ShpShapeType::PolyLine, &[0, 2, 9], &[v(0., 0.), v(1., 1.), v(2., 2.), v(3., 3.)]);
        let parts = split_parts(&s, RingRoles::PartTypes);
        assert_eq!(2, parts.len());
        assert_eq!(&[v(0., 0.), v(1., 1.)], parts[0].vertices);
        assert_eq!(&[v(2., 2.), v(3., 3.)], parts[1].vertices);
    }

    #[test]
    fn split_stops_at_decreasing_start() {
        let s = shape(ShpShapeType::PolyLine, &[2, 1], &[v(0., 0.), v(1., 1.), v(2., 2.)]);
        assert!(split_parts(&s, RingRoles::PartTypes).is_empty());
    }

    #[test]
    fn split_stops_at_negative_start() {
        let s = shape(ShpShapeType::PolyLine, &[0, -1], &[v(0., 0.), v(1., 1.)]);
        let parts = split_parts(&s, RingRoles::PartTypes);
        assert_eq!(1, parts.len());
        assert!(parts[0].vertices.is_empty());
    }

    #[test]
    fn legacy_last_part_type_is_its_start() {
        let s = shape(ShpShapeType::Polygon, &[0, 5], &square_and_hole());
        let parts = split_parts(&s, RingRoles::Legacy);
        assert_eq!(Some(PartType::Ring), parts[0].part_type);
        assert_eq!(Some(PartType::Ring), parts[1].part_type);

        let s = shape(ShpShapeType::Polygon, &[0, 4], &square_and_hole()[1..]);
        let parts = split_parts(&s, RingRoles::Legacy);
        assert_eq!(Some(PartType::FirstRing), parts[1].part_type);
        let parts = split_parts(&s, RingRoles::PartTypes);
        assert_eq!(Some(PartType::Ring), parts[1].part_type);
    }

    #[test]
    fn legacy_polygon_keeps_encounter_order() {
        let s = shape(ShpShapeType::Polygon, &[0, 5], &square_and_hole());
        match reconstruct(&s, &ReadOptions::default()) {
            Some(Geometry::Polygon(rings)) => {
                assert_eq!(2, rings.len());
                assert_eq!(5, rings[0].0.len());
                assert_eq!(4, rings[1].0.len());
            }
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn legacy_polygon_promotes_ring_starting_at_four() {
        // the second ring starts at vertex 4, which reads as FirstRing
        let vertices = vec![
            v(5., 5.), v(6., 5.), v(5., 6.), v(5., 5.),
            v(0., 0.), v(0., 4.), v(4., 4.), v(4., 0.), v(0., 0.),
        ];
        let s = shape(ShpShapeType::Polygon, &[0, 4], &vertices);
        match reconstruct(&s, &ReadOptions::default()) {
            Some(Geometry::Polygon(rings)) => {
                assert_eq!(ring(&[(0., 0.), (0., 4.), (4., 4.), (4., 0.), (0., 0.)]), rings[0]);
                assert_eq!(ring(&[(5., 5.), (6., 5.), (5., 6.), (5., 5.)]), rings[1]);
            }
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn winding_puts_outer_ring_first() {
        let mut vertices = square_and_hole()[5..].to_vec();
        vertices.extend_from_slice(&square_and_hole()[..5]);
        let s = shape(ShpShapeType::Polygon, &[0, 4], &vertices);
        let options = ReadOptions::default().ring_roles(RingRoles::Winding);
        match reconstruct(&s, &options) {
            Some(Geometry::Polygon(rings)) => {
                assert_eq!(ring(&[(0., 0.), (0., 4.), (4., 4.), (4., 0.), (0., 0.)]), rings[0]);
                assert_eq!(ring(&[(1., 1.), (2., 1.), (2., 2.), (1., 1.)]), rings[1]);
            }
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn outer_rings_are_prepended() {
        let vertices = vec![
            v(0., 0.), v(0., 1.), v(1., 1.), v(0., 0.),
            v(5., 5.), v(5., 6.), v(6., 6.), v(5., 5.),
        ];
        let s = shape(ShpShapeType::Polygon, &[0, 4], &vertices);
        let options = ReadOptions::default().ring_roles(RingRoles::Winding);
        match reconstruct(&s, &options) {
            Some(Geometry::Polygon(rings)) => assert_eq!(Point(5., 5.), rings[0].0[0]),
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn polygon_z_rings() {
        let vertices: Vec<Vertex> = square_and_hole()[..5].iter()
            .map(|p| Vertex { z: 7., ..*p })
            .collect();
        let s = shape(ShpShapeType::PolygonZ, &[0], &vertices);
        match reconstruct(&s, &ReadOptions::default()) {
            Some(Geometry::Polygon3(rings)) => {
                assert_eq!(1, rings.len());
                assert_eq!(Point3(0., 4., 7.), rings[0].0[1]);
            }
            other => panic!("expected Polygon3, got {:?}", other),
        }
    }

    #[test]
    fn polygon_without_parts_is_one_ring() {
        let s = shape(ShpShapeType::Polygon, &[], &square_and_hole()[..5]);
        match reconstruct(&s, &ReadOptions::default()) {
            Some(Geometry::Polygon(rings)) => assert_eq!(1, rings.len()),
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn polyline_first_part_only() {
        let s = shape(ShpShapeType::PolyLine, &[0, 2], &[v(0., 0.), v(1., 1.), v(2., 2.), v(3., 3.)]);
        assert_eq!(
            Some(Geometry::LineString(vec![Point(0., 0.), Point(1., 1.)].into_boxed_slice())),
            reconstruct(&s, &ReadOptions::default())
        );
    }

    #[test]
    fn polyline_all_parts() {
        let s = shape(ShpShapeType::PolyLine, &[0, 2], &[v(0., 0.), v(1., 1.), v(2., 2.), v(3., 3.)]);
        let options = ReadOptions::default().line_parts(LineParts::AllParts);
        assert_eq!(
            Some(Geometry::MultiLineString(vec![
                vec![Point(0., 0.), Point(1., 1.)].into_boxed_slice(),
                vec![Point(2., 2.), Point(3., 3.)].into_boxed_slice(),
            ].into_boxed_slice())),
            reconstruct(&s, &options)
        );
    }

    #[test]
    fn polyline_with_no_resolvable_part_is_empty() {
        let s = shape(ShpShapeType::PolyLine, &[3], &[v(0., 0.)]);
        assert_eq!(Some(Geometry::LineString(Vec::new().into_boxed_slice())), reconstruct(&s, &ReadOptions::default()));
    }

    #[test]
    fn null_and_multipatch_have_no_geometry() {
        let s = shape(ShpShapeType::Null, &[], &[]);
        assert_eq!(None, reconstruct(&s, &ReadOptions::default()));
        assert_eq!(geo::BoundingBox3::default(), bounding_box(&s));
        let s = shape(ShpShapeType::MultiPatch, &[0], &[v(0., 0.), v(1., 0.), v(1., 1.)]);
        assert_eq!(None, reconstruct(&s, &ReadOptions::default()));
    }

    #[test]
    fn measured_types_are_flat() {
        let s = shape(ShpShapeType::PointM, &[], &[Vertex { x: 1., y: 2., z: 0., m: 9. }]);
        assert_eq!(Some(Geometry::Point(Point(1., 2.))), reconstruct(&s, &ReadOptions::default()));
        let b = bounding_box(&s);
        assert_eq!(f64::NEG_INFINITY, b.min.2);
        assert_eq!(f64::INFINITY, b.max.2);
    }
}
