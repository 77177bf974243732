use std::path::Path;

use kurbo::{BezPath, PathEl, Point};
use usvg::{tiny_skia_path::PathSegment, TreeParsing};

/// How closely the flattened polyline follows the curves, in SVG units.
pub const TOLERANCE: f64 = 0.5;

pub fn load_svg(path: &Path) -> anyhow::Result<BezPath> {
    let data = std::fs::read(path)?;
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(&data, &opt)?;
    let mut ret = BezPath::new();

    let cvt = |pt: usvg::tiny_skia_path::Point| kurbo::Point::new(pt.x as f64, pt.y as f64);

    for node in tree.root.descendants() {
        let mut bez = BezPath::new();
        if let usvg::NodeKind::Path(p) = &*node.borrow() {
            for seg in p.data.segments() {
                match seg {
                    PathSegment::MoveTo(mut pt) => {
                        p.transform.map_point(&mut pt);
                        bez.move_to(cvt(pt));
                    }
                    PathSegment::LineTo(mut pt) => {
                        p.transform.map_point(&mut pt);
                        bez.line_to(cvt(pt));
                    }
                    PathSegment::QuadTo(mut pt1, mut pt2) => {
                        p.transform.map_point(&mut pt1);
                        p.transform.map_point(&mut pt2);
                        bez.quad_to(cvt(pt1), cvt(pt2));
                    }
                    PathSegment::CubicTo(mut pt1, mut pt2, mut pt3) => {
                        p.transform.map_point(&mut pt1);
                        p.transform.map_point(&mut pt2);
                        p.transform.map_point(&mut pt3);
                        bez.curve_to(cvt(pt1), cvt(pt2), cvt(pt3));
                    }
                    PathSegment::Close => bez.close_path(),
                }
            }
        }
        ret.extend(bez);
    }
    Ok(ret)
}

/// Flattens the first subpath of `path` into a polyline.
///
/// The robot lays a single line of dominoes, so anything after the first
/// subpath is ignored (with a warning).
pub fn first_polyline(path: &BezPath, tolerance: f64) -> Vec<Point> {
    let mut points: Vec<Point> = Vec::new();
    let mut subpaths = 0;
    path.flatten(tolerance, |el| match el {
        PathEl::MoveTo(p) => {
            subpaths += 1;
            if subpaths == 1 {
                points.push(p);
            }
        }
        PathEl::LineTo(p) if subpaths == 1 => points.push(p),
        PathEl::ClosePath if subpaths == 1 => {
            if let Some(&first) = points.first() {
                points.push(first);
            }
        }
        _ => {}
    });
    if subpaths > 1 {
        log::warn!("only drawing the first of {subpaths} subpaths");
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape as _};

    #[test]
    fn closed_rect() {
        let p: BezPath = Rect::new(0., 0., 10., 10.).path_elements(0.01).collect();
        let points = first_polyline(&p, TOLERANCE);
        assert_eq!(points.len(), 5);
        assert_eq!(points.first(), points.last());
    }

    #[test]
    fn second_subpath_is_dropped() {
        let mut p = BezPath::new();
        p.move_to((0., 0.));
        p.line_to((10., 0.));
        p.move_to((20., 0.));
        p.line_to((30., 0.));
        assert_eq!(
            first_polyline(&p, TOLERANCE),
            vec![Point::new(0., 0.), Point::new(10., 0.)]
        );
    }
}
