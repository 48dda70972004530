//! Badge anchor ordering: builds a clockwise tour over region midpoints and
//! assigns each region the corner pointing away from its tour predecessor.
//!
//! O(n²) in the number of regions, which stays in the tens per image. All
//! functions here work with pure geometry.

use crate::models::{AnchorCorner, PlacementResult, Rect};

/// Quadrant of a point relative to another, numbered clockwise from
/// top-right. Boundary ties fall into the lower-numbered quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Quadrant {
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
    TopLeft = 4,
}

fn quadrant(from: (f32, f32), to: (f32, f32)) -> Quadrant {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    if dx >= 0.0 && dy <= 0.0 {
        Quadrant::TopRight
    } else if dx >= 0.0 && dy >= 0.0 {
        Quadrant::BottomRight
    } else if dy >= 0.0 {
        Quadrant::BottomLeft
    } else {
        Quadrant::TopLeft
    }
}

/// Slope of the segment from `from` to `to`, with vertical alignment mapped
/// to +∞ when the target is above or level and −∞ when below.
fn slope(from: (f32, f32), to: (f32, f32)) -> f32 {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    if dx == 0.0 {
        if dy <= 0.0 { f32::INFINITY } else { f32::NEG_INFINITY }
    } else {
        dy / dx
    }
}

fn distance_sq(from: (f32, f32), to: (f32, f32)) -> f32 {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    dx * dx + dy * dy
}

/// Picks the index of the remaining region that comes next in the tour
/// relative to `current`: lowest quadrant first, then ascending slope, then
/// ascending squared distance.
fn next_in_tour(current: (f32, f32), remaining: &[(usize, (f32, f32))]) -> usize {
    let mut best = 0;
    for i in 1..remaining.len() {
        let a = remaining[i].1;
        let b = remaining[best].1;
        let key_a = (quadrant(current, a), slope(current, a), distance_sq(current, a));
        let key_b = (quadrant(current, b), slope(current, b), distance_sq(current, b));
        let ord = key_a
            .0
            .cmp(&key_b.0)
            .then(key_a.1.total_cmp(&key_b.1))
            .then(key_a.2.total_cmp(&key_b.2));
        if ord.is_lt() {
            best = i;
        }
    }
    best
}

fn corner_for(q: Quadrant) -> AnchorCorner {
    match q {
        Quadrant::TopRight => AnchorCorner::TopRight,
        Quadrant::BottomRight => AnchorCorner::BottomRight,
        Quadrant::BottomLeft => AnchorCorner::BottomLeft,
        Quadrant::TopLeft => AnchorCorner::TopLeft,
    }
}

fn corner_point(rect: &Rect, corner: AnchorCorner) -> (f32, f32) {
    match corner {
        AnchorCorner::TopRight => (rect.right, rect.top),
        AnchorCorner::BottomRight => (rect.right, rect.bottom),
        AnchorCorner::BottomLeft => (rect.left, rect.bottom),
        AnchorCorner::TopLeft => (rect.left, rect.top),
    }
}

/// Assigns each region a badge anchor corner, index-aligned to the input.
///
/// The tour starts at region 0 and greedily follows the quadrant/slope/
/// distance ordering; each region then anchors at the corner matching the
/// quadrant of its midpoint relative to its tour predecessor (the first
/// region's predecessor is the last). Deterministic for a fixed input set.
pub fn assign_anchors(rects: &[Rect]) -> Vec<PlacementResult> {
    if rects.is_empty() {
        return Vec::new();
    }

    let midpoints: Vec<(f32, f32)> = rects.iter().map(Rect::midpoint).collect();

    // Greedy clockwise tour over midpoints, carrying original indices.
    let mut remaining: Vec<(usize, (f32, f32))> =
        midpoints.iter().copied().enumerate().skip(1).collect();
    let mut tour: Vec<usize> = vec![0];
    let mut current = midpoints[0];
    while !remaining.is_empty() {
        let pick = next_in_tour(current, &remaining);
        let (index, midpoint) = remaining.swap_remove(pick);
        tour.push(index);
        current = midpoint;
    }

    // Corner from the quadrant relative to the previous tour element, with
    // wraparound. Results go back into the caller's input order.
    let mut results = vec![
        PlacementResult {
            x: 0.0,
            y: 0.0,
            corner: AnchorCorner::TopRight,
        };
        rects.len()
    ];
    for (pos, &index) in tour.iter().enumerate() {
        let prev = tour[(pos + tour.len() - 1) % tour.len()];
        let corner = corner_for(quadrant(midpoints[prev], midpoints[index]));
        let (x, y) = corner_point(&rects[index], corner);
        results[index] = PlacementResult { x, y, corner };
    }
    results
}
