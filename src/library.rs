use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{CommandError, LoadError};
use crate::lazy::Lazy;
use crate::loader::{probe_natural_size, MediaPool};
use crate::paging::{compute_page_starts, PageType, ViewMode};
use crate::ui::layout::DEFAULT_SIZE;

pub struct ImageEntry {
    pub path: PathBuf,
    /// Soft-deleted; the index stays reserved for this path.
    pub removed: bool,
    pub natural_size: Lazy<(u32, u32)>,
    pub page_type: Lazy<PageType>,
    /// User override flipping how the surrounding run is paired.
    pub invert: bool,
}

impl ImageEntry {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
            natural_size: Lazy::unset(),
            page_type: Lazy::unset(),
            invert: false,
        }
    }
}

#[derive(Default)]
struct Tag {
    images: Vec<usize>,
    page_starts: Vec<usize>,
    dirty: bool,
}

/// A selected image: tag key and index inside that tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub tag: i32,
    pub index: usize,
}

impl Position {
    pub fn new(tag: i32, index: usize) -> Self {
        Self { tag, index }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct AddReport {
    pub added: usize,
    pub skipped: Vec<CommandError>,
}

/// Images grouped into tags, plus the current selection and view mode.
///
/// Owned by the consumer thread. Page starts are cached per tag and
/// recomputed on demand after anything that can change pairing.
pub struct Library {
    images: Vec<ImageEntry>,
    by_path: HashMap<PathBuf, usize>,
    tags: BTreeMap<i32, Tag>,
    selection: Option<Position>,
    mode: ViewMode,
}

impl Library {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            images: Vec::new(),
            by_path: HashMap::new(),
            tags: BTreeMap::new(),
            selection: None,
            mode,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Returns false when `mode` is already active.
    pub fn set_mode(&mut self, mode: ViewMode) -> bool {
        if mode == self.mode {
            return false;
        }
        self.mode = mode;
        for tag in self.tags.values_mut() {
            tag.dirty = true;
        }
        true
    }

    /// `None` means nothing is selected.
    pub fn selection(&self) -> Option<Position> {
        self.selection
    }

    /// Returns false if `pos` is already selected or does not exist.
    pub fn set_selection(&mut self, pos: Position) -> bool {
        if self.selection == Some(pos) || !self.contains(pos) {
            return false;
        }
        self.selection = Some(pos);
        true
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.tags.get(&pos.tag).is_some_and(|t| pos.index < t.images.len())
    }

    pub fn image(&self, index: usize) -> &ImageEntry {
        &self.images[index]
    }

    pub fn image_mut(&mut self, index: usize) -> &mut ImageEntry {
        &mut self.images[index]
    }

    /// Image index at `pos`. `pos` must exist.
    pub fn image_at(&self, pos: Position) -> usize {
        self.tags[&pos.tag].images[pos.index]
    }

    pub fn tag_images(&self, tag: i32) -> Option<&[usize]> {
        self.tags.get(&tag).map(|t| t.images.as_slice())
    }

    pub fn tag_keys(&self) -> impl Iterator<Item = i32> + '_ {
        self.tags.keys().copied()
    }

    /// Adds existing, not yet present paths to `tag` and re-sorts it by path.
    /// A path that was soft-removed comes back under its old index.
    pub fn add_images(&mut self, tag: i32, paths: &[PathBuf]) -> AddReport {
        let mut report = AddReport::default();
        let selected_image = self
            .selection
            .filter(|pos| pos.tag == tag)
            .map(|pos| self.image_at(pos));

        let mut fresh = Vec::new();
        for path in paths {
            if !path.exists() {
                report.skipped.push(CommandError::NotFound(path.clone()));
                continue;
            }
            let index = match self.by_path.get(path) {
                Some(&index) if self.images[index].removed => {
                    self.images[index].removed = false;
                    index
                }
                Some(_) => {
                    report.skipped.push(CommandError::AlreadyPresent(path.clone()));
                    continue;
                }
                None => {
                    let index = self.images.len();
                    self.images.push(ImageEntry::new(path.clone()));
                    self.by_path.insert(path.clone(), index);
                    index
                }
            };
            fresh.push(index);
        }

        report.added = fresh.len();
        if fresh.is_empty() {
            return report;
        }

        let images = &self.images;
        let entry = self.tags.entry(tag).or_default();
        entry.images.extend(fresh);
        entry.images.sort_by(|&a, &b| images[a].path.cmp(&images[b].path));
        entry.dirty = true;

        if self.selection.is_none() {
            self.selection = Some(Position::new(tag, 0));
        } else if let Some(image) = selected_image {
            if let Some(index) = entry.images.iter().position(|&i| i == image) {
                self.selection = Some(Position::new(tag, index));
            }
        }
        report
    }

    pub fn goto_tag(&mut self, tag: i32) -> Result<bool, CommandError> {
        if !self.tags.contains_key(&tag) {
            return Err(CommandError::UnknownTag(tag));
        }
        Ok(self.set_selection(Position::new(tag, 0)))
    }

    /// Soft-removes every image of `tag`. If it held the selection, the
    /// selection moves to the next tag, else the previous, else nowhere.
    pub fn remove_tag(&mut self, tag: i32) -> Result<(), CommandError> {
        let removed = self.tags.remove(&tag).ok_or(CommandError::UnknownTag(tag))?;
        for index in removed.images {
            self.images[index].removed = true;
        }

        if self.selection.is_some_and(|pos| pos.tag == tag) {
            let next = self
                .tags
                .range((Excluded(tag), Unbounded))
                .next()
                .or_else(|| self.tags.range(..tag).next_back())
                .map(|(&key, _)| key);
            self.selection = next.map(|key| Position::new(key, 0));
        }
        Ok(())
    }

    pub fn toggle_invert(&mut self, pos: Position) {
        if !self.contains(pos) {
            return;
        }
        let image = self.image_at(pos);
        self.images[image].invert = !self.images[image].invert;
        self.mark_dirty(image);
    }

    fn mark_dirty(&mut self, image: usize) {
        for tag in self.tags.values_mut() {
            if tag.images.contains(&image) {
                tag.dirty = true;
            }
        }
    }

    /// Asks the pool for size and page type unless already requested.
    pub fn request_probe(&mut self, image: usize, pool: &MediaPool) {
        let entry = &mut self.images[image];
        if entry.natural_size.has_value() {
            return;
        }
        let (size, page_type) = pool.submit_probe(&entry.path);
        entry.natural_size = size;
        entry.page_type = page_type;
    }

    /// Picks up classifications that arrived since the last call and
    /// invalidates the page starts of the tags they belong to.
    pub fn poll_classifications(&mut self) {
        for tag in self.tags.values_mut() {
            for &image in &tag.images {
                let page_type = &mut self.images[image].page_type;
                if page_type.is_pending() && page_type.ready() {
                    tag.dirty = true;
                }
            }
        }
    }

    /// Natural size, or a default while unknown. If the asynchronous probe
    /// was cancelled the header is read on the spot.
    pub fn natural_size(&mut self, image: usize) -> (u32, u32) {
        let entry = &mut self.images[image];
        if entry.natural_size.error() == Some(&LoadError::Cancelled) {
            match probe_natural_size(&entry.path) {
                Ok(size) => entry.natural_size = Lazy::from_value(size),
                Err(e) => {
                    log::warn!("{}", e);
                    entry.natural_size = Lazy::from_value(DEFAULT_SIZE);
                }
            }
        }
        entry.natural_size.get_or(DEFAULT_SIZE)
    }

    pub fn path(&self, image: usize) -> &Path {
        &self.images[image].path
    }

    fn page_starts(&mut self, tag: i32) -> &[usize] {
        let images = &mut self.images;
        let mode = self.mode;
        let Some(entry) = self.tags.get_mut(&tag) else {
            return &[];
        };
        if entry.dirty || entry.page_starts.len() != entry.images.len() {
            let types: Vec<PageType> = entry
                .images
                .iter()
                .map(|&i| images[i].page_type.get_or(PageType::Normal))
                .collect();
            let inverts: Vec<bool> = entry.images.iter().map(|&i| images[i].invert).collect();
            entry.page_starts = compute_page_starts(&types, &inverts, mode);
            entry.dirty = false;
        }
        &entry.page_starts
    }

    /// Index of the first image on the page holding `pos`.
    pub fn page_start(&mut self, pos: Position) -> usize {
        self.page_starts(pos.tag).get(pos.index).copied().unwrap_or(pos.index)
    }

    /// Indices of every image on the page holding `pos`.
    pub fn page_range(&mut self, pos: Position) -> Range<usize> {
        let starts = self.page_starts(pos.tag);
        let Some(&start) = starts.get(pos.index) else {
            return pos.index..pos.index + 1;
        };
        let end = (start + 1..starts.len())
            .find(|&i| starts[i] != start)
            .unwrap_or(starts.len());
        start..end
    }

    /// One image forward or backward, crossing into the neighbouring tag at
    /// either end. Returns `pos` unchanged at the ends of the collection.
    pub fn advance(&self, pos: Position, dir: i32) -> Position {
        let Some(images) = self.tag_images(pos.tag) else {
            return pos;
        };
        let next = pos.index as i64 + dir.signum() as i64;
        if dir == 0 || (0..images.len() as i64).contains(&next) {
            return Position::new(pos.tag, next as usize);
        }

        let neighbour = if dir > 0 {
            self.tags.range((Excluded(pos.tag), Unbounded)).next()
        } else {
            self.tags.range(..pos.tag).next_back()
        };
        match neighbour {
            Some((&tag, _)) if dir > 0 => Position::new(tag, 0),
            Some((&tag, entry)) => Position::new(tag, entry.images.len() - 1),
            None => pos,
        }
    }

    /// Start of the next or previous page. Entering another tag lands on the
    /// page holding its first (forward) or last (backward) image. Returns
    /// `pos` unchanged at the ends of the collection.
    pub fn advance_page(&mut self, pos: Position, dir: i32) -> Position {
        if dir == 0 || !self.contains(pos) {
            return pos;
        }
        let initial = self.page_start(pos);
        let mut current = pos;
        loop {
            let next = self.advance(current, dir);
            if next == current {
                return pos;
            }
            let start = self.page_start(next);
            if next.tag != current.tag || start != initial {
                return Position::new(next.tag, start);
            }
            current = next;
        }
    }
}
