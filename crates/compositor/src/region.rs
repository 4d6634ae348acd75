//! Rectangle sets in surface-local logical coordinates

use smithay::utils::{Logical, Point, Rectangle, Size};

/// A set of non-overlapping rectangles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rectangle<i32, Logical>>,
}

fn is_empty_rect(rect: &Rectangle<i32, Logical>) -> bool {
    rect.size.w <= 0 || rect.size.h <= 0
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rectangle<i32, Logical>) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    /// Region covering `(0, 0, size)`
    pub fn from_size(size: Size<i32, Logical>) -> Self {
        Self::from_rect(Rectangle::from_size(size))
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rectangle<i32, Logical>] {
        &self.rects
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Add `rect`, keeping the stored pieces disjoint
    pub fn union_rect(&mut self, rect: Rectangle<i32, Logical>) {
        if is_empty_rect(&rect) {
            return;
        }
        let mut pieces = vec![rect];
        for existing in &self.rects {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| piece.subtract_rect(*existing))
                .filter(|piece| !is_empty_rect(piece))
                .collect();
            if pieces.is_empty() {
                return;
            }
        }
        self.rects.extend(pieces);
    }

    pub fn union(&mut self, other: &Region) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    pub fn subtract_rect(&mut self, rect: Rectangle<i32, Logical>) {
        if is_empty_rect(&rect) {
            return;
        }
        self.rects = self
            .rects
            .drain(..)
            .flat_map(|existing| existing.subtract_rect(rect))
            .filter(|piece| !is_empty_rect(piece))
            .collect();
    }

    pub fn subtract(&mut self, other: &Region) {
        for rect in &other.rects {
            self.subtract_rect(*rect);
        }
    }

    pub fn intersect_rect(&mut self, rect: Rectangle<i32, Logical>) {
        self.rects = self
            .rects
            .iter()
            .filter_map(|existing| existing.intersection(rect))
            .filter(|piece| !is_empty_rect(piece))
            .collect();
    }

    pub fn translate(&mut self, offset: Point<i32, Logical>) {
        for rect in &mut self.rects {
            rect.loc += offset;
        }
    }

    pub fn contains(&self, point: Point<i32, Logical>) -> bool {
        self.rects.iter().any(|rect| rect.contains(point))
    }

    /// Smallest rectangle covering the region
    pub fn extents(&self) -> Option<Rectangle<i32, Logical>> {
        let mut rects = self.rects.iter();
        let first = *rects.next()?;
        let (mut x1, mut y1) = (first.loc.x, first.loc.y);
        let (mut x2, mut y2) = (first.loc.x + first.size.w, first.loc.y + first.size.h);
        for rect in rects {
            x1 = x1.min(rect.loc.x);
            y1 = y1.min(rect.loc.y);
            x2 = x2.max(rect.loc.x + rect.size.w);
            y2 = y2.max(rect.loc.y + rect.size.h);
        }
        Some(Rectangle::new((x1, y1).into(), (x2 - x1, y2 - y1).into()))
    }

    /// Covered area in square logical pixels
    pub fn area(&self) -> i64 {
        self.rects
            .iter()
            .map(|rect| rect.size.w as i64 * rect.size.h as i64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Logical> {
        Rectangle::new((x, y).into(), (w, h).into())
    }

    #[test]
    fn union_of_overlapping_rects_counts_area_once() {
        let mut region = Region::from_rect(rect(0, 0, 10, 10));
        region.union_rect(rect(5, 5, 10, 10));

        assert_eq!(region.area(), 175);
        assert_eq!(region.extents(), Some(rect(0, 0, 15, 15)));
    }

    #[test]
    fn union_ignores_empty_rects() {
        let mut region = Region::new();
        region.union_rect(rect(3, 3, 0, 10));
        region.union_rect(rect(3, 3, 10, -1));

        assert!(region.is_empty());
        assert_eq!(region.extents(), None);
    }

    #[test]
    fn subtract_leaves_shrink_delta() {
        let mut region = Region::from_size((200, 100).into());
        region.subtract_rect(rect(0, 0, 150, 100));

        assert_eq!(region.area(), 50 * 100);
        assert!(region.contains((160, 50).into()));
        assert!(!region.contains((10, 50).into()));
    }

    #[test]
    fn intersect_clips_to_rect() {
        let mut region = Region::from_rect(rect(0, 0, 100, 100));
        region.intersect_rect(rect(50, 50, 100, 100));

        assert_eq!(region.rects(), &[rect(50, 50, 50, 50)]);
    }

    #[test]
    fn translate_moves_every_rect() {
        let mut region = Region::from_rect(rect(0, 0, 10, 10));
        region.union_rect(rect(20, 0, 10, 10));
        region.translate((5, 7).into());

        assert!(region.contains((5, 7).into()));
        assert!(region.contains((25, 7).into()));
        assert!(!region.contains((0, 0).into()));
    }

    fn small_rect() -> impl Strategy<Value = Rectangle<i32, Logical>> {
        (0i32..16, 0i32..16, -2i32..10, -2i32..10).prop_map(|(x, y, w, h)| rect(x, y, w, h))
    }

    proptest! {
        /// Stored pieces never overlap and cover exactly the points of the inputs
        #[test]
        fn union_and_subtract_match_point_sets(
            added in prop::collection::vec(small_rect(), 0..6),
            removed in prop::collection::vec(small_rect(), 0..3),
        ) {
            let mut region = Region::new();
            for rect in &added {
                region.union_rect(*rect);
            }
            for rect in &removed {
                region.subtract_rect(*rect);
            }

            let mut covered = 0i64;
            for x in 0..26 {
                for y in 0..26 {
                    let point = Point::from((x, y));
                    let expected = added.iter().any(|r| r.contains(point)) && !removed.iter().any(|r| r.contains(point));
                    prop_assert_eq!(region.contains(point), expected, "point {:?}", point);
                    let hits = region.rects().iter().filter(|r| r.contains(point)).count();
                    prop_assert!(hits <= 1, "point {:?} covered {} times", point, hits);
                    covered += i64::from(expected);
                }
            }
            prop_assert_eq!(region.area(), covered);
        }
    }
}
