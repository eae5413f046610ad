//! Port layout evaluation.
//!
//! Computes where each port of a group sits, in the element's local
//! coordinates (origin at the element's top-left corner).

use super::{GroupLayoutArgs, PortArgs, PortLayout, PortLayoutKind};
use kurbo::{Point, Rect, Size, Vec2};

/// Default angular step of the `ellipse` layout, in degrees.
const ELLIPSE_STEP: f64 = 20.0;

/// Computed placement of one port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortTransform {
    pub position: Point,
    /// Rotation in degrees.
    pub angle: f64,
}

/// Effective arguments of one port: its own values over the group's.
#[derive(Debug, Clone, Copy, Default)]
struct Resolved {
    x: Option<f64>,
    y: Option<f64>,
    dx: f64,
    dy: f64,
    dr: f64,
    angle: Option<f64>,
    compensate_rotation: bool,
}

impl Resolved {
    fn new(group: &GroupLayoutArgs, port: &PortArgs) -> Self {
        Self {
            x: port.x.or(group.x),
            y: port.y.or(group.y),
            dx: port.dx.or(group.dx).unwrap_or(0.0),
            dy: port.dy.or(group.dy).unwrap_or(0.0),
            dr: port.dr.or(group.dr).unwrap_or(0.0),
            angle: port.angle.or(group.angle),
            compensate_rotation: port
                .compensate_rotation
                .or(group.compensate_rotation)
                .unwrap_or(false),
        }
    }

    /// Explicit `x`, `y` and `angle` win over the computed placement.
    fn transform(&self, computed: Point, computed_angle: f64) -> PortTransform {
        PortTransform {
            position: Point::new(
                self.x.unwrap_or(computed.x),
                self.y.unwrap_or(computed.y),
            ),
            angle: self.angle.unwrap_or(computed_angle),
        }
    }
}

/// Lay out the ports of one group on an element of the given size.
///
/// Returns one transform per entry of `ports`, in order. Parameters that do
/// not apply to the group's layout kind are ignored.
pub fn layout_ports(layout: &PortLayout, ports: &[&PortArgs], size: Size) -> Vec<PortTransform> {
    let bbox = Rect::from_origin_size(Point::ORIGIN, size);
    let resolved: Vec<Resolved> = ports
        .iter()
        .map(|port| Resolved::new(&layout.args, port))
        .collect();

    match layout.name {
        PortLayoutKind::Absolute => resolved
            .iter()
            .map(|args| args.transform(Point::ORIGIN, 0.0))
            .collect(),
        PortLayoutKind::Left => line_layout(&resolved, bbox.origin(), Point::new(bbox.x0, bbox.y1)),
        PortLayoutKind::Right => line_layout(
            &resolved,
            Point::new(bbox.x1, bbox.y0),
            Point::new(bbox.x1, bbox.y1),
        ),
        PortLayoutKind::Top => line_layout(&resolved, bbox.origin(), Point::new(bbox.x1, bbox.y0)),
        PortLayoutKind::Bottom => line_layout(
            &resolved,
            Point::new(bbox.x0, bbox.y1),
            Point::new(bbox.x1, bbox.y1),
        ),
        PortLayoutKind::Line => {
            let start = layout.args.start.unwrap_or(bbox.origin());
            let end = layout.args.end.unwrap_or(Point::new(bbox.x1, bbox.y1));
            line_layout(&resolved, start, end)
        }
        PortLayoutKind::EllipseSpread => {
            let count = resolved.len().max(1) as f64;
            let start = layout.args.start_angle.unwrap_or(0.0);
            let step = layout.args.step.unwrap_or(360.0 / count);
            ellipse_layout(&resolved, bbox, |index| start + index * step)
        }
        PortLayoutKind::Ellipse => {
            let count = resolved.len() as f64;
            let start = layout.args.start_angle.unwrap_or(0.0);
            let step = layout.args.step.unwrap_or(ELLIPSE_STEP);
            ellipse_layout(&resolved, bbox, |index| {
                start + (index + 0.5 - count / 2.0) * step
            })
        }
    }
}

fn line_layout(resolved: &[Resolved], start: Point, end: Point) -> Vec<PortTransform> {
    let count = resolved.len() as f64;
    resolved
        .iter()
        .enumerate()
        .map(|(index, args)| {
            let ratio = (index as f64 + 0.5) / count;
            let point = start.lerp(end, ratio) + Vec2::new(args.dx, args.dy);
            args.transform(point.round(), 0.0)
        })
        .collect()
}

fn ellipse_layout(
    resolved: &[Resolved],
    bbox: Rect,
    angle_at: impl Fn(f64) -> f64,
) -> Vec<PortTransform> {
    let center = bbox.center();
    let rx = bbox.width() / 2.0;
    let ry = bbox.height() / 2.0;

    resolved
        .iter()
        .enumerate()
        .map(|(index, args)| {
            let theta = angle_at(index as f64).to_radians();
            // Angles run clockwise from the top of the ellipse.
            let mut point = center + Vec2::new(theta.sin() * rx, -theta.cos() * ry);
            point += Vec2::new(args.dx, args.dy);
            if args.dr != 0.0 {
                let radial = point - center;
                if radial.hypot() > 0.0 {
                    point += radial.normalize() * args.dr;
                }
            }

            let rotation = if args.compensate_rotation {
                let tangent = Vec2::new(theta.cos() * rx, theta.sin() * ry);
                -tangent.atan2().to_degrees()
            } else {
                0.0
            };
            args.transform(point.round(), rotation)
        })
        .collect()
}
