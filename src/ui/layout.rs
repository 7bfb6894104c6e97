/// Size assumed for an image whose header has not been read yet.
pub const DEFAULT_SIZE: (u32, u32) = (1000, 1414);

/// Widest the vertical strip gets, in pixels.
const STRIP_MAX_WIDTH: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Integer size used to request a texture for this rect.
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.w.round().max(1.0) as u32, self.h.round().max(1.0) as u32)
    }
}

fn sanitize((w, h): (u32, u32)) -> (f32, f32) {
    if w == 0 || h == 0 {
        (DEFAULT_SIZE.0 as f32, DEFAULT_SIZE.1 as f32)
    } else {
        (w as f32, h as f32)
    }
}

/// Lays out the images of one page side by side, fit and centred in the
/// window. `sizes` are natural sizes in reading order; the first image ends
/// up rightmost. Every image is scaled to the height of the first one.
pub fn center_page(sizes: &[(u32, u32)], (win_w, win_h): (u32, u32)) -> Vec<Rect> {
    let Some(&first) = sizes.first() else {
        return Vec::new();
    };
    let (win_w, win_h) = (win_w as f32, win_h as f32);
    let row_h = sanitize(first).1;
    let row_w: f32 = sizes
        .iter()
        .map(|&size| {
            let (w, h) = sanitize(size);
            w * row_h / h
        })
        .sum();

    let scale = (win_w / row_w).min(win_h / row_h);
    let scaled_w = row_w * scale;
    let scaled_h = row_h * scale;
    let x0 = ((win_w - scaled_w) * 0.5).round();
    let y0 = ((win_h - scaled_h) * 0.5).round();

    let mut rects = vec![Rect::default(); sizes.len()];
    let mut x = x0;
    for (rect, &size) in rects.iter_mut().zip(sizes).rev() {
        let (w, h) = sanitize(size);
        let width = (w * scaled_h / h).round();
        *rect = Rect { x, y: y0, w: width, h: scaled_h.round() };
        x += width;
    }
    rects
}

/// One image of the vertical strip at y = 0, horizontally centred.
pub fn strip_slice(size: (u32, u32), (win_w, _): (u32, u32)) -> Rect {
    let (w, h) = sanitize(size);
    let strip_w = STRIP_MAX_WIDTH.min(win_w as f32 * 0.8);
    Rect {
        x: ((win_w as f32 - strip_w) * 0.5).round(),
        y: 0.0,
        w: strip_w.round(),
        h: (h * strip_w / w).round(),
    }
}
