use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ui::layout::Rect;

pub const BG_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Handle to an uploaded texture, valid until destroyed.
pub type TextureId = u32;

pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Owns every texture the surface can draw. Textures are only created and
/// destroyed from the consumer thread; the mutex serializes that access.
#[derive(Default)]
pub struct TextureStore {
    next_id: TextureId,
    textures: HashMap<TextureId, Texture>,
}

pub type SharedTextures = Arc<Mutex<TextureStore>>;

impl TextureStore {
    pub fn shared() -> SharedTextures {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn create(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> TextureId {
        debug_assert_eq!(rgba.len(), width as usize * height as usize * 4);
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.textures.insert(id, Texture { width, height, rgba });
        id
    }

    pub fn destroy(&mut self, id: TextureId) -> bool {
        self.textures.remove(&id).is_some()
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }
}

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Unpack softbuffer u32 into (r, g, b).
fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

/// Nearest-neighbour stretch of `texture` onto `rect`, clipped to the frame.
pub fn draw_texture(dst: &mut [u32], dst_w: u32, dst_h: u32, texture: &Texture, rect: Rect) {
    if rect.w <= 0.0 || rect.h <= 0.0 || texture.width == 0 || texture.height == 0 {
        return;
    }

    let dx_start = rect.x.max(0.0) as u32;
    let dy_start = rect.y.max(0.0) as u32;
    let dx_end = ((rect.x + rect.w).ceil().max(0.0) as u32).min(dst_w);
    let dy_end = ((rect.y + rect.h).ceil().max(0.0) as u32).min(dst_h);

    let sx_scale = texture.width as f32 / rect.w;
    let sy_scale = texture.height as f32 / rect.h;

    for dy in dy_start..dy_end {
        let sy = ((dy as f32 - rect.y) * sy_scale) as u32;
        if sy >= texture.height {
            continue;
        }
        for dx in dx_start..dx_end {
            let sx = ((dx as f32 - rect.x) * sx_scale) as u32;
            if sx >= texture.width {
                continue;
            }

            let si = (sy as usize * texture.width as usize + sx as usize) * 4;
            let di = dy as usize * dst_w as usize + dx as usize;
            let src = &texture.rgba[si..si + 4];

            let sa = src[3] as u32;
            if sa == 255 {
                dst[di] = rgb(src[0], src[1], src[2]);
            } else if sa > 0 {
                let inv = 255 - sa;
                let (dr, dg, db) = unpack_rgb(dst[di]);
                let r = ((src[0] as u32 * sa + dr as u32 * inv) / 255) as u8;
                let g = ((src[1] as u32 * sa + dg as u32 * inv) / 255) as u8;
                let b = ((src[2] as u32 * sa + db as u32 * inv) / 255) as u8;
                dst[di] = rgb(r, g, b);
            }
        }
    }
}
