use serde::{Deserialize, Serialize};

/// Screen rectangle in pixels, as handed out by the rendering layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn contains_y(&self, y: i32) -> bool {
        y >= self.y && y <= self.bottom()
    }

    /// Whether the vertical span of this rect intersects the band `[y, y + h]`.
    pub fn intersects_band(&self, y: i32, h: i32) -> bool {
        self.y <= y + h && y <= self.bottom()
    }

    /// Smallest rect covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.w == 0 && self.h == 0 {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            w: self.right().max(other.right()) - x,
            h: self.bottom().max(other.bottom()) - y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_intersection() {
        let r = Rect::new(0, 10, 5, 10);
        assert!(r.intersects_band(0, 10));
        assert!(r.intersects_band(15, 100));
        assert!(!r.intersects_band(21, 5));
        assert!(!r.intersects_band(0, 9));
    }

    #[test]
    fn union_of_empty_takes_other() {
        let r = Rect::default().union(&Rect::new(3, 4, 5, 6));
        assert_eq!(r, Rect::new(3, 4, 5, 6));
        let u = r.union(&Rect::new(0, 0, 1, 1));
        assert_eq!(u, Rect::new(0, 0, 8, 10));
    }
}
