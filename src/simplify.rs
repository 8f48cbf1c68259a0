//! Track simplification.
//!
//! Recorded tracks carry a point every few meters. Before a track can be
//! followed turn by turn it is reduced with Ramer-Douglas-Peucker so that
//! only real direction changes remain as vertices.

use crate::geo::{Coordinate, LocalFrame};

/// Ramer-Douglas-Peucker line simplification.
///
/// Keeps the endpoints and every vertex that lies more than `tolerance_m`
/// off the chord of the span it splits. Around 10 m removes GPS jitter
/// but keeps turns at street corners.
pub fn rdp_simplify(points: &[Coordinate], tolerance_m: f64) -> Vec<Coordinate> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut spans = vec![(0, points.len() - 1)];
    while let Some((first, last)) = spans.pop() {
        if last - first < 2 {
            continue;
        }
        let (split, offset) = (first + 1..last)
            .map(|i| (i, offset_from_chord(&points[i], &points[first], &points[last])))
            .fold((first, f64::NEG_INFINITY), |far, cur| if cur.1 > far.1 { cur } else { far });

        if offset > tolerance_m {
            keep[split] = true;
            spans.push((first, split));
            spans.push((split, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}

/// Meters from `p` to the line through `a` and `b`.
///
/// When `a` and `b` coincide (a closed loop) this is the distance to `a`.
fn offset_from_chord(p: &Coordinate, a: &Coordinate, b: &Coordinate) -> f64 {
    let frame = LocalFrame::spanning(a, b);
    let (bx, by) = frame.offset(b);
    let (px, py) = frame.offset(p);

    let chord = bx.hypot(by);
    if chord < 1e-3 {
        return px.hypot(py);
    }
    (px * by - py * bx).abs() / chord
}
