use std::collections::HashSet;
use std::mem;
use std::time::Instant;
use winit::event::MouseButton;
use winit::keyboard::NamedKey;

use crate::cache::{CacheKey, MediaCache};
use crate::commands::{Command, OutputEvent};
use crate::error::CommandError;
use crate::library::{Library, Position};
use crate::loader::MediaPool;
use crate::paging::ViewMode;
use crate::ui::layout::{self, Rect};
use crate::ui::render::{draw_texture, rgb, SharedTextures, TextureId, TextureStore, BG_COLOR};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How many positions past the selection get their page type probed early.
const TYPE_PREFETCH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollConfig {
    /// Pixels per page key in the vertical strip.
    pub step: f32,
    /// Pixels per second while a scroll key is held.
    pub speed: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self { step: 200.0, speed: 1000.0 }
    }
}

/// One image placed for this frame. Preloaded images are fetched but not drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub image: usize,
    pub rect: Rect,
    pub preload: bool,
}

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

pub struct ViewerState {
    pub library: Library,
    pool: MediaPool,
    cache: MediaCache,
    textures: SharedTextures,

    pub window_size: (u32, u32),
    /// Pixel offset of the selected image from the top of the window in the
    /// vertical strip. Zero or negative once limits are fixed.
    vertical_offset: f32,
    scroll: ScrollConfig,

    last_visible: Vec<usize>,
    events: Vec<OutputEvent>,
    quit: bool,
    pub last_frame: Instant,

    // Track which keys are currently held
    pub keys_down: HashSet<NamedKey>,
    pub chars_down: HashSet<char>,

    // Track keys that were just pressed this frame
    pub keys_pressed: HashSet<NamedKey>,
    pub chars_pressed: HashSet<char>,
}

impl ViewerState {
    pub fn new(pool: MediaPool, mode: ViewMode, window_size: (u32, u32), scroll: ScrollConfig) -> Self {
        let textures = TextureStore::shared();
        Self {
            library: Library::new(mode),
            pool,
            cache: MediaCache::new(SharedTextures::clone(&textures)),
            textures,
            window_size,
            vertical_offset: 0.0,
            scroll,
            last_visible: Vec::new(),
            events: Vec::new(),
            quit: false,
            last_frame: Instant::now(),
            keys_down: HashSet::new(),
            chars_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            chars_pressed: HashSet::new(),
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Output lines produced since the last call.
    pub fn take_events(&mut self) -> Vec<OutputEvent> {
        mem::take(&mut self.events)
    }

    pub fn is_key_pressed_named(&self, k: NamedKey) -> bool {
        self.keys_pressed.contains(&k)
    }

    pub fn is_char_pressed(&self, c: char) -> bool {
        self.chars_pressed.contains(&c)
    }

    pub fn is_key_down_named(&self, k: NamedKey) -> bool {
        self.keys_down.contains(&k)
    }

    pub fn is_char_down(&self, c: char) -> bool {
        self.chars_down.contains(&c)
    }

    /// A scroll key is held and the strip keeps moving.
    pub fn is_scrolling(&self) -> bool {
        self.library.mode() == ViewMode::Vertical && self.scroll_dir() != 0
    }

    fn scroll_dir(&self) -> i32 {
        if self.is_key_down_named(NamedKey::ArrowDown) || self.is_char_down('j') {
            -1
        } else if self.is_key_down_named(NamedKey::ArrowUp) || self.is_char_down('k') {
            1
        } else {
            0
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Parses and runs one protocol line. Errors are logged and leave the
    /// state untouched.
    pub fn execute_line(&mut self, line: &str) {
        let result = line.parse::<Command>().and_then(|command| self.execute(command));
        if let Err(e) = result {
            log::warn!("{}", e);
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        log::debug!("Executing {:?}", command);
        match command {
            Command::AddImages { tag, paths } => {
                let report = self.library.add_images(tag, &paths);
                for skipped in &report.skipped {
                    log::warn!("{}", skipped);
                }
                if report.added > 0 {
                    log::info!(
                        "Added {} images to tag {} ({} tags)",
                        report.added,
                        tag,
                        self.library.tag_keys().count()
                    );
                    self.fix_vertical_limits();
                }
            }
            Command::GotoTag(tag) => {
                if self.library.goto_tag(tag)? {
                    self.selection_moved();
                }
            }
            Command::RemoveTag(tag) => {
                let before = self.library.selection();
                self.library.remove_tag(tag)?;
                if self.library.selection() != before {
                    self.selection_moved();
                }
            }
            Command::GotoOffset(offset) => self.goto_offset(offset),
            Command::ChangeMode(mode) => self.change_mode(mode),
            Command::Quit => self.quit = true,
        }
        Ok(())
    }

    fn selection_moved(&mut self) {
        self.vertical_offset = 0.0;
        self.fix_vertical_limits();
    }

    fn select(&mut self, pos: Position) -> bool {
        if self.library.set_selection(pos) {
            self.vertical_offset = 0.0;
            true
        } else {
            false
        }
    }

    pub fn change_mode(&mut self, mode: ViewMode) {
        if !self.library.set_mode(mode) {
            return;
        }
        log::info!("Switched to {} mode", mode);
        self.events.push(OutputEvent::CurrentMode(mode));
        self.selection_moved();
    }

    /// Moves `pages` pages forward or backward, stopping at the first
    /// boundary.
    pub fn goto_offset(&mut self, pages: i32) {
        for _ in 0..pages.unsigned_abs() {
            if !self.advance_current(pages.signum()) {
                break;
            }
        }
    }

    /// One page in `dir`. Reports `last_in_dir` when already at the end.
    pub fn advance_current(&mut self, dir: i32) -> bool {
        let Some(start) = self.library.selection() else {
            return false;
        };
        if self.library.mode() == ViewMode::Vertical && self.vertical_offset < 0.0 && dir < 1 {
            // back to the top of the current image first
            self.vertical_offset = 0.0;
            return false;
        }

        let next = self.library.advance_page(start, dir);
        self.select(next);
        self.fix_vertical_limits();

        if self.library.selection() == Some(start) {
            self.events.push(OutputEvent::LastInDir(dir.signum()));
            return false;
        }
        true
    }

    pub fn toggle_invert(&mut self) {
        let Some(pos) = self.library.selection() else {
            return;
        };
        self.library.toggle_invert(pos);
        let entry = self.library.image(self.library.image_at(pos));
        log::debug!("Pairing flipped at {} (invert={})", entry.path.display(), entry.invert);
    }

    pub fn click(&mut self, button: MouseButton) {
        match button {
            MouseButton::Left => {
                self.advance_current(1);
            }
            MouseButton::Right => {
                self.advance_current(-1);
            }
            MouseButton::Middle => self.toggle_invert(),
            _ => {}
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.window_size == (width, height) {
            return;
        }
        self.window_size = (width, height);
        self.fix_vertical_limits();
    }

    // ------------------------------------------------------------------
    // Vertical strip
    // ------------------------------------------------------------------

    /// Moves the strip by `offset` pixels, positive towards the start.
    pub fn vertical_scroll(&mut self, offset: f32) {
        if self.library.mode() != ViewMode::Vertical {
            return;
        }
        let start = (self.library.selection(), self.vertical_offset);
        self.vertical_offset += offset;
        self.fix_vertical_limits();

        if offset != 0.0 && start == (self.library.selection(), self.vertical_offset) {
            self.events.push(OutputEvent::LastInDir(if offset < 0.0 { 1 } else { -1 }));
        }
    }

    /// Keeps the strip from leaving blank space below the last image or above
    /// the first one, and reselects the topmost visible image.
    fn fix_vertical_limits(&mut self) {
        if self.library.mode() != ViewMode::Vertical {
            return;
        }
        let mut strip = self.vertical_strip();
        let Some(last) = strip.last() else {
            return;
        };

        let bottom = last.1.bottom();
        let win_h = self.window_size.1 as f32;
        if bottom < win_h {
            self.vertical_offset -= bottom - win_h;
            strip = self.vertical_strip();
        }

        let Some(&(first_pos, first_rect)) = strip.first() else {
            return;
        };
        self.library.set_selection(first_pos);
        self.vertical_offset = if first_rect.y > 0.0 { 0.0 } else { first_rect.y };
    }

    /// Images of the strip overlapping the window, top to bottom. The last
    /// image of the collection is always kept so the limits can be fixed
    /// after scrolling past it.
    fn vertical_strip(&mut self) -> Vec<(Position, Rect)> {
        let Some(mut pos) = self.library.selection() else {
            return Vec::new();
        };
        let win_h = self.window_size.1 as f32;
        let mut offset_y = self.vertical_offset.round();

        let mut prev = self.library.advance(pos, -1);
        while offset_y > 0.0 && prev != pos {
            pos = prev;
            offset_y -= self.strip_slice(pos).h;
            prev = self.library.advance(pos, -1);
        }

        let mut strip = Vec::new();
        while offset_y < win_h {
            let mut rect = self.strip_slice(pos);
            rect.y = offset_y;
            let next = self.library.advance(pos, 1);
            let last = next == pos;
            if rect.bottom() > 0.0 || last {
                strip.push((pos, rect));
            }
            offset_y += rect.h;
            if last {
                break;
            }
            pos = next;
        }
        strip
    }

    fn strip_slice(&mut self, pos: Position) -> Rect {
        let image = self.library.image_at(pos);
        layout::strip_slice(self.image_size(image), self.window_size)
    }

    // ------------------------------------------------------------------
    // Frame assembly
    // ------------------------------------------------------------------

    fn image_size(&mut self, image: usize) -> (u32, u32) {
        self.library.request_probe(image, &self.pool);
        self.library.natural_size(image)
    }

    /// Placements of the page holding `pos`, in reading order.
    fn center_page(&mut self, pos: Position) -> Vec<(Position, Rect)> {
        if self.library.mode() == ViewMode::Vertical {
            return vec![(pos, self.strip_slice(pos))];
        }
        let positions: Vec<Position> = self
            .library
            .page_range(pos)
            .map(|index| Position::new(pos.tag, index))
            .collect();
        let sizes: Vec<(u32, u32)> = positions
            .iter()
            .map(|&p| {
                let image = self.library.image_at(p);
                self.image_size(image)
            })
            .collect();
        positions
            .into_iter()
            .zip(layout::center_page(&sizes, self.window_size))
            .collect()
    }

    /// Everything to draw this frame plus the neighbouring pages to preload.
    pub fn render_data(&mut self) -> Vec<Placement> {
        let Some(selection) = self.library.selection() else {
            return Vec::new();
        };
        let visible = if self.library.mode() == ViewMode::Vertical {
            self.vertical_strip()
        } else {
            self.center_page(selection)
        };
        let (Some(&(first, _)), Some(&(last, _))) = (visible.first(), visible.last()) else {
            return Vec::new();
        };

        let mut placements: Vec<Placement> = visible
            .into_iter()
            .map(|(pos, rect)| Placement {
                image: self.library.image_at(pos),
                rect,
                preload: false,
            })
            .collect();

        for (start, dir) in [(first, -1), (last, 1)] {
            let neighbour = self.library.advance_page(start, dir);
            if neighbour == start {
                continue;
            }
            for (pos, rect) in self.center_page(neighbour) {
                placements.push(Placement {
                    image: self.library.image_at(pos),
                    rect,
                    preload: true,
                });
            }
        }
        placements
    }

    /// Probes the page types of the next few positions so pairing is settled
    /// before they come into view.
    fn preload_types(&mut self) {
        if self.library.mode() != ViewMode::Manga {
            return;
        }
        let Some(mut pos) = self.library.selection() else {
            return;
        };
        for _ in 0..TYPE_PREFETCH {
            let next = self.library.advance(pos, 1);
            if next == pos {
                return;
            }
            pos = next;
            let image = self.library.image_at(pos);
            self.library.request_probe(image, &self.pool);
        }
    }

    /// Texture for `image` at `size`. Nothing is decoded before the natural
    /// size is known.
    fn texture(&mut self, image: usize, size: (u32, u32)) -> TextureId {
        self.library.request_probe(image, &self.pool);
        if !self.library.image_mut(image).natural_size.ready() {
            return self.cache.placeholder();
        }
        self.cache.get(&self.pool, CacheKey::new(image, size), self.library.path(image))
    }

    /// Resolves this frame: textures to draw with their rects. Sweeps the
    /// cache and reports a change of visible images.
    pub fn frame(&mut self) -> Vec<(TextureId, Rect)> {
        self.library.poll_classifications();
        self.preload_types();

        let mut draws = Vec::new();
        let mut visible = Vec::new();
        for placement in self.render_data() {
            let texture = self.texture(placement.image, placement.rect.pixel_size());
            if placement.preload {
                continue;
            }
            draws.push((texture, placement.rect));
            visible.push(placement.image);
        }
        self.cache.sweep();

        if visible != self.last_visible {
            let paths = visible.iter().map(|&i| self.library.path(i).to_path_buf()).collect();
            self.events.push(OutputEvent::CurrentImage(paths));
            self.last_visible = visible;
        }
        draws
    }

    /// Run the per-frame input logic. Returns true if the app should quit.
    pub fn update(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.is_char_pressed('q') {
            self.quit = true;
        }

        // Pages run right to left: Left and Space go forward.
        let vertical = self.library.mode() == ViewMode::Vertical;
        let forward = self.is_key_pressed_named(NamedKey::Space)
            || self.is_key_pressed_named(NamedKey::ArrowLeft);
        let backward = self.is_key_pressed_named(NamedKey::Backspace)
            || self.is_key_pressed_named(NamedKey::ArrowRight);
        if forward {
            if vertical {
                self.vertical_scroll(-self.scroll.step);
            } else {
                self.advance_current(1);
            }
        }
        if backward {
            if vertical {
                self.vertical_scroll(self.scroll.step);
            } else {
                self.advance_current(-1);
            }
        }

        if vertical {
            let dir = self.scroll_dir();
            if dir != 0 {
                self.vertical_scroll(dir as f32 * self.scroll.speed * dt);
            }
        }

        if self.is_char_pressed('m') {
            self.change_mode(ViewMode::Manga);
        }
        if self.is_char_pressed('s') {
            self.change_mode(ViewMode::Single);
        }
        if self.is_char_pressed('v') {
            self.change_mode(ViewMode::Vertical);
        }
        if self.is_char_pressed('r') {
            self.toggle_invert();
        }
        if self.is_char_pressed('c') {
            self.events.push(OutputEvent::ChangeChapter);
        }
        if self.is_char_pressed('i') {
            self.events.push(OutputEvent::GetInfo);
        }

        // Clear per-frame input state
        self.keys_pressed.clear();
        self.chars_pressed.clear();

        self.quit
    }

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    pub fn render(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let draws = self.frame();

        frame.fill(rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]));
        let store = self.textures.lock().unwrap();
        for (id, rect) in draws {
            match store.get(id) {
                Some(texture) => draw_texture(frame, fb_w, fb_h, texture, rect),
                None => log::debug!("Texture {} vanished before drawing", id),
            }
        }
    }

    /// Releases every texture and joins the workers.
    pub fn shutdown(&mut self) {
        log::debug!(
            "Releasing {} cached textures, dropping {} queued jobs",
            self.cache.len(),
            self.pool.queued()
        );
        self.cache.clear();
        self.pool.shutdown();
        log::info!("Viewer shut down, {} textures left", self.textures.lock().unwrap().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ClassifyConfig;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn images(dir: &TempDir, names: &[&str], size: (u32, u32)) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                RgbaImage::from_pixel(size.0, size.1, Rgba([200, 200, 200, 255]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect()
    }

    fn viewer(mode: ViewMode, window: (u32, u32)) -> ViewerState {
        let pool = MediaPool::new(1, ClassifyConfig::default(), || {});
        ViewerState::new(pool, mode, window, ScrollConfig::default())
    }

    fn add(state: &mut ViewerState, tag: i32, paths: &[PathBuf]) {
        state
            .execute(Command::AddImages { tag, paths: paths.to_vec() })
            .unwrap();
    }

    /// Blocks until every known image has its size and type.
    fn settle(state: &mut ViewerState, count: usize) {
        for image in 0..count {
            state.library.request_probe(image, &state.pool);
            let entry = state.library.image_mut(image);
            entry.natural_size.get().unwrap();
            entry.page_type.get().unwrap();
        }
    }

    #[test]
    fn goto_offset_at_the_end_reports_last_in_dir() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png", "b.png", "c.png"], (60, 100));
        let mut state = viewer(ViewMode::Single, (800, 600));
        add(&mut state, 1, &paths[..2]);
        add(&mut state, 2, &paths[2..]);

        state.execute_line("goto_offset(2)");
        assert_eq!(state.library.selection(), Some(Position::new(2, 0)));
        assert!(state.take_events().is_empty());

        state.execute_line("goto_offset(1)");
        assert_eq!(state.library.selection(), Some(Position::new(2, 0)));
        assert_eq!(state.take_events(), vec![OutputEvent::LastInDir(1)]);

        state.execute_line("goto_offset(-5)");
        assert_eq!(state.library.selection(), Some(Position::new(1, 0)));
        assert_eq!(state.take_events(), vec![OutputEvent::LastInDir(-1)]);
    }

    #[test]
    fn mode_change_is_reported_once() {
        let mut state = viewer(ViewMode::Manga, (800, 600));
        state.execute_line("change_mode(manga)");
        assert!(state.take_events().is_empty());

        state.execute_line("change_mode(single)");
        state.execute_line("change_mode(single)");
        state.execute_line("change_mode(sideways)");
        assert_eq!(state.take_events(), vec![OutputEvent::CurrentMode(ViewMode::Single)]);
        assert_eq!(state.library.mode(), ViewMode::Single);
    }

    #[test]
    fn bad_commands_leave_state_alone() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png"], (60, 100));
        let mut state = viewer(ViewMode::Manga, (800, 600));
        add(&mut state, 1, &paths);

        assert_eq!(state.execute(Command::GotoTag(4)), Err(CommandError::UnknownTag(4)));
        assert_eq!(state.execute(Command::RemoveTag(4)), Err(CommandError::UnknownTag(4)));
        state.execute_line("explode()");
        assert_eq!(state.library.selection(), Some(Position::new(1, 0)));
        assert!(!state.should_quit());

        state.execute_line("quit");
        assert!(state.should_quit());
    }

    #[test]
    fn visible_images_are_reported_on_change() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png", "b.png", "c.png", "d.png"], (60, 100));
        let mut state = viewer(ViewMode::Manga, (800, 600));
        add(&mut state, 1, &paths);
        settle(&mut state, 4);

        let draws = state.frame();
        assert_eq!(draws.len(), 2);
        // reading order is right to left
        assert!(draws[0].1.x > draws[1].1.x);
        assert_eq!(
            state.take_events(),
            vec![OutputEvent::CurrentImage(paths[..2].to_vec())]
        );

        state.frame();
        assert!(state.take_events().is_empty());

        state.execute_line("goto_offset(1)");
        state.frame();
        assert_eq!(
            state.take_events(),
            vec![OutputEvent::CurrentImage(paths[2..].to_vec())]
        );
    }

    #[test]
    fn neighbouring_page_is_preloaded() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png", "b.png", "c.png"], (60, 100));
        let mut state = viewer(ViewMode::Single, (800, 600));
        add(&mut state, 1, &paths);
        state.execute_line("goto_offset(1)");
        settle(&mut state, 3);

        let placements = state.render_data();
        let preloaded: Vec<usize> = placements.iter().filter(|p| p.preload).map(|p| p.image).collect();
        assert_eq!(placements.iter().filter(|p| !p.preload).count(), 1);
        assert_eq!(preloaded, vec![0, 2]);

        state.frame();
        assert_eq!(state.cache.len(), 3);
    }

    #[test]
    fn nothing_is_decoded_before_the_size_is_known() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png"], (60, 100));
        let idle = MediaPool::new(0, ClassifyConfig::default(), || {});
        let mut state = ViewerState::new(idle, ViewMode::Single, (800, 600), ScrollConfig::default());
        add(&mut state, 1, &paths);

        let draws = state.frame();
        assert_eq!(draws, vec![(state.cache.placeholder(), draws[0].1)]);
        assert_eq!(state.cache.len(), 0);
        assert_eq!(state.pool.queued(), 1, "only the probe is queued");
    }

    #[test]
    fn vertical_scroll_is_clamped() {
        let dir = TempDir::new().unwrap();
        // each image becomes a 600x600 slice in a 1000x500 window
        let paths = images(&dir, &["a.png", "b.png", "c.png"], (100, 100));
        let mut state = viewer(ViewMode::Vertical, (1000, 500));
        add(&mut state, 1, &paths);
        settle(&mut state, 3);

        state.vertical_scroll(200.0);
        assert_eq!(state.vertical_offset, 0.0);
        assert_eq!(state.take_events(), vec![OutputEvent::LastInDir(-1)]);

        state.vertical_scroll(-700.0);
        assert_eq!(state.library.selection(), Some(Position::new(1, 1)));
        assert_eq!(state.vertical_offset, -100.0);

        state.vertical_scroll(-10_000.0);
        assert_eq!(state.library.selection(), Some(Position::new(1, 2)));
        assert_eq!(state.vertical_offset, -100.0);
        assert!(state.take_events().is_empty());

        state.vertical_scroll(-10.0);
        assert_eq!(state.vertical_offset, -100.0);
        assert_eq!(state.take_events(), vec![OutputEvent::LastInDir(1)]);

        // backward page first snaps to the top of the current image
        assert!(!state.advance_current(-1));
        assert_eq!(state.vertical_offset, 0.0);
        assert_eq!(state.library.selection(), Some(Position::new(1, 2)));
    }

    #[test]
    fn manga_mode_probes_ahead_across_tags() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..15).map(|i| format!("{:02}.png", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let paths = images(&dir, &names, (60, 100));

        let idle = MediaPool::new(0, ClassifyConfig::default(), || {});
        let mut state = ViewerState::new(idle, ViewMode::Manga, (800, 600), ScrollConfig::default());
        add(&mut state, 1, &paths[..8]);
        add(&mut state, 2, &paths[8..]);

        state.frame();
        let probed: Vec<bool> = (0..15)
            .map(|i| state.library.image(i).natural_size.has_value())
            .collect();
        // the selection plus the next ten positions, running into tag 2
        assert!(probed[..=10].iter().all(|&p| p), "{:?}", probed);
        assert!(probed[11..].iter().all(|&p| !p), "{:?}", probed);
        assert_eq!(state.pool.queued(), 11);
    }

    #[test]
    fn single_mode_probes_only_what_it_shows_and_preloads() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..15).map(|i| format!("{:02}.png", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let paths = images(&dir, &names, (60, 100));

        let idle = MediaPool::new(0, ClassifyConfig::default(), || {});
        let mut state = ViewerState::new(idle, ViewMode::Single, (800, 600), ScrollConfig::default());
        add(&mut state, 1, &paths[..8]);
        add(&mut state, 2, &paths[8..]);

        state.frame();
        // the visible page and the next one
        assert_eq!(state.pool.queued(), 2);
        assert!(state.library.image(1).natural_size.has_value());
        assert!(!state.library.image(2).natural_size.has_value());
    }

    #[test]
    fn held_scroll_key_moves_the_strip() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png", "b.png", "c.png"], (100, 100));
        let mut state = viewer(ViewMode::Vertical, (1000, 500));
        add(&mut state, 1, &paths);
        settle(&mut state, 3);
        assert!(!state.is_scrolling());

        state.chars_down.insert('j');
        assert!(state.is_scrolling());
        state.last_frame = Instant::now() - Duration::from_millis(100);
        state.update();
        // 1000 px/s for at least 100 ms
        assert!(
            (-120.0..=-100.0).contains(&state.vertical_offset),
            "offset {}",
            state.vertical_offset
        );
        assert_eq!(state.library.selection(), Some(Position::new(1, 0)));

        state.chars_down.clear();
        state.keys_down.insert(NamedKey::ArrowUp);
        state.last_frame = Instant::now() - Duration::from_millis(300);
        state.update();
        assert_eq!(state.vertical_offset, 0.0);
        state.keys_down.clear();

        state.chars_down.insert('j');
        state.change_mode(ViewMode::Manga);
        assert!(!state.is_scrolling());
        state.last_frame = Instant::now() - Duration::from_millis(100);
        state.update();
        assert_eq!(state.vertical_offset, 0.0);
        assert_eq!(state.library.selection(), Some(Position::new(1, 0)));
    }

    #[test]
    fn keys_emit_side_channel_events() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png", "b.png"], (60, 100));
        let mut state = viewer(ViewMode::Single, (800, 600));
        add(&mut state, 1, &paths);

        state.chars_pressed.extend(['c', 'i', 'r']);
        assert!(!state.update());
        assert_eq!(state.take_events(), vec![OutputEvent::ChangeChapter, OutputEvent::GetInfo]);
        assert!(state.library.image(0).invert);

        state.keys_pressed.insert(NamedKey::ArrowLeft);
        state.update();
        assert_eq!(state.library.selection(), Some(Position::new(1, 1)));

        state.click(MouseButton::Right);
        assert_eq!(state.library.selection(), Some(Position::new(1, 0)));

        state.chars_pressed.insert('q');
        assert!(state.update());
    }

    #[test]
    fn shutdown_releases_textures() {
        let dir = TempDir::new().unwrap();
        let paths = images(&dir, &["a.png"], (60, 100));
        let mut state = viewer(ViewMode::Single, (800, 600));
        add(&mut state, 1, &paths);
        settle(&mut state, 1);
        state.frame();
        // the texture arrives asynchronously; force it
        let key = CacheKey::new(0, state.render_data()[0].rect.pixel_size());
        state.cache.get_or_fetch(&state.pool, key, &paths[0]).get().unwrap();
        assert_eq!(state.textures.lock().unwrap().len(), 2);

        state.shutdown();
        assert_eq!(state.textures.lock().unwrap().len(), 1, "only the placeholder is left");
        assert_eq!(state.pool.queued(), 0);
    }
}
