//! Frame geometry in normalized device coordinates. A wallpaper cell is a
//! `Quad` of four corners in triangle-strip order; the world builds one per
//! disposition and a slightly inset copy for the photograph itself.

use tileconfig::Disposition;

/// Padding between the frame border and the photograph, in physical pixels.
pub const FRAME_PADDING_PX: f32 = 2.0;

/// Four NDC corners stored as `[blx, bly, brx, bry, tlx, tly, trx, try]`,
/// the triangle-strip order the draw path consumes directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [f32; 8]);

impl Quad {
    /// The full-screen quad, used by the dim overlay and placeholder state.
    pub const FULL_SCREEN: Quad = Quad([-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);

    /// Maps a grid disposition to NDC corners. `cell_w`/`cell_h` are the
    /// dimensions of one grid cell (2.0 divided by the column/row count).
    pub fn from_disposition(disposition: &Disposition, cell_w: f32, cell_h: f32) -> Quad {
        let left = -1.0 + disposition.x as f32 * cell_w;
        let right = -1.0 + (disposition.x + disposition.w) as f32 * cell_w;
        let top = 1.0 - disposition.y as f32 * cell_h;
        let bottom = 1.0 - (disposition.y + disposition.h) as f32 * cell_h;
        Quad([left, bottom, right, bottom, left, top, right, top])
    }

    /// Insets the quad by [`FRAME_PADDING_PX`] on every side, converted from
    /// pixels to NDC with the current surface size.
    pub fn with_padding(&self, screen_w: u32, screen_h: u32) -> Quad {
        let px_w = FRAME_PADDING_PX / screen_w as f32;
        let px_h = FRAME_PADDING_PX / screen_h as f32;
        let v = self.0;
        Quad([
            v[0] + px_w,
            v[1] + px_h,
            v[2] - px_w,
            v[3] + px_h,
            v[4] + px_w,
            v[5] - px_h,
            v[6] - px_w,
            v[7] - px_h,
        ])
    }

    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    pub fn height(&self) -> f32 {
        self.0[5] - self.0[1]
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.0[2] - self.width() / 2.0,
            self.0[5] - self.height() / 2.0,
        )
    }

    pub fn on_left_screen_edge(&self) -> bool {
        self.0[4] == -1.0
    }

    pub fn on_right_screen_edge(&self) -> bool {
        self.0[6] == 1.0
    }

    pub fn on_top_screen_edge(&self) -> bool {
        self.0[5] == 1.0
    }

    pub fn on_bottom_screen_edge(&self) -> bool {
        self.0[1] == -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_maps_to_ndc() {
        // Top-left 1x1 cell in a 2x4 grid.
        let d = Disposition { x: 0, y: 0, w: 1, h: 1 };
        let quad = Quad::from_disposition(&d, 1.0, 0.5);
        assert_eq!(quad.0, [-1.0, 0.5, 0.0, 0.5, -1.0, 1.0, 0.0, 1.0]);
        assert!(quad.on_left_screen_edge());
        assert!(quad.on_top_screen_edge());
        assert!(!quad.on_right_screen_edge());
        assert!(!quad.on_bottom_screen_edge());
    }

    #[test]
    fn full_cell_span_touches_every_edge() {
        let d = Disposition { x: 0, y: 0, w: 2, h: 4 };
        let quad = Quad::from_disposition(&d, 1.0, 0.5);
        assert!(quad.on_left_screen_edge());
        assert!(quad.on_right_screen_edge());
        assert!(quad.on_top_screen_edge());
        assert!(quad.on_bottom_screen_edge());
        assert_eq!(quad.width(), 2.0);
        assert_eq!(quad.height(), 2.0);
        assert_eq!(quad.center(), (0.0, 0.0));
    }

    #[test]
    fn padding_insets_all_corners() {
        let quad = Quad::FULL_SCREEN.with_padding(100, 200);
        let px_w = FRAME_PADDING_PX / 100.0;
        let px_h = FRAME_PADDING_PX / 200.0;
        assert_eq!(quad.0[0], -1.0 + px_w);
        assert_eq!(quad.0[1], -1.0 + px_h);
        assert_eq!(quad.0[2], 1.0 - px_w);
        assert_eq!(quad.0[5], 1.0 - px_h);
        assert!(quad.width() < 2.0);
    }
}
