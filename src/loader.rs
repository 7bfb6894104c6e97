use image::imageops::FilterType;
use image::RgbaImage;
use crossbeam_channel::{bounded, Sender};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{LoadError, LoadResult};
use crate::lazy::Lazy;
use crate::paging::PageType;

// ---------------------------------------------------------------------------
// Decoded image data (CPU side, before upload)
// ---------------------------------------------------------------------------

pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }
}

fn decode_image(path: &Path) -> LoadResult<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| decode_error(path, e))
}

fn rescale(img: &RgbaImage, (width, height): (u32, u32)) -> DecodedImage {
    let width = width.max(1);
    let height = height.max(1);
    let resized = if img.dimensions() == (width, height) {
        img.clone()
    } else {
        image::imageops::resize(img, width, height, FilterType::Triangle)
    };
    DecodedImage {
        rgba_bytes: resized.into_raw(),
        width,
        height,
    }
}

/// Reads only the header. Used directly as the synchronous fallback when the
/// asynchronous probe is gone.
pub fn probe_natural_size(path: &Path) -> LoadResult<(u32, u32)> {
    image::image_dimensions(path).map_err(|e| decode_error(path, e))
}

fn decode_error(path: &Path, e: image::ImageError) -> LoadError {
    LoadError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Page-type classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyConfig {
    /// Width above this fraction of the height is a standalone spread.
    pub wide_ratio: f32,
    /// Greyscale column variance below this marks a uniform margin.
    pub variance_threshold: u32,
    /// How many columns inward to look while both sides look uniform.
    pub sample_depth: u32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            wide_ratio: 0.8,
            variance_threshold: 500,
            sample_depth: 20,
        }
    }
}

impl ClassifyConfig {
    pub fn is_wide(&self, (width, height): (u32, u32)) -> bool {
        width as f32 > height as f32 * self.wide_ratio
    }
}

fn column_variance(rgba: &[u8], width: u32, height: u32, x: u32) -> u32 {
    let grey = |y: u32| {
        let i = (y as usize * width as usize + x as usize) * 4;
        (rgba[i] as u32 + rgba[i + 1] as u32 + rgba[i + 2] as u32) / 3
    };
    let h = height as u64;
    let mean = (0..height).map(|y| grey(y) as u64).sum::<u64>() / h;
    let sq = (0..height)
        .map(|y| {
            let d = grey(y) as i64 - mean as i64;
            (d * d) as u64
        })
        .sum::<u64>();
    (sq / h) as u32
}

/// Guesses which half of a spread a page is from its edge columns: the edge
/// next to the spine tends to be a flat margin.
pub fn classify_page(rgba: &[u8], width: u32, height: u32, config: &ClassifyConfig) -> PageType {
    if config.is_wide((width, height)) {
        return PageType::StandaloneWide;
    }
    if width < 2 || height == 0 {
        return PageType::Normal;
    }

    let max_depth = config.sample_depth.max(1).min(width / 2);
    let mut var_left = 0;
    let mut var_right = 0;

    for depth in 0..max_depth {
        var_left = var_left.max(column_variance(rgba, width, height, depth));
        var_right = var_right.max(column_variance(rgba, width, height, width - 1 - depth));

        let flat_left = var_left < config.variance_threshold;
        let flat_right = var_right < config.variance_threshold;
        match (flat_left, flat_right) {
            (true, true) => continue,
            (true, false) => return PageType::ForceRight,
            (false, true) => return PageType::ForceLeft,
            (false, false) => return PageType::Normal,
        }
    }

    PageType::Normal
}

// ---------------------------------------------------------------------------
// Job queue (shared between the consumer and worker threads via Mutex + Condvar)
// ---------------------------------------------------------------------------

enum Job {
    Decode {
        path: PathBuf,
        target: (u32, u32),
        pixels: Sender<LoadResult<DecodedImage>>,
        size: Sender<LoadResult<(u32, u32)>>,
        page_type: Sender<LoadResult<PageType>>,
    },
    Probe {
        path: PathBuf,
        size: Sender<LoadResult<(u32, u32)>>,
        page_type: Sender<LoadResult<PageType>>,
    },
}

#[derive(Default)]
struct JobQueue {
    jobs: VecDeque<Job>,
    stop: bool,
}

type SharedQueue = Arc<(Mutex<JobQueue>, Condvar)>;

/// Fixed set of decode threads fed from one deque. Metadata probes go to the
/// head, decodes to the tail, and workers always pop the head.
pub struct MediaPool {
    shared: SharedQueue,
    workers: Vec<JoinHandle<()>>,
}

impl MediaPool {
    /// `notify` runs on the worker thread after every finished job.
    pub fn new<F>(num_threads: usize, config: ClassifyConfig, notify: F) -> Self
    where
        F: Fn() + Clone + Send + 'static,
    {
        let shared: SharedQueue = Arc::new((Mutex::new(JobQueue::default()), Condvar::new()));
        let workers = (0..num_threads)
            .map(|id| {
                let shared = Arc::clone(&shared);
                let notify = notify.clone();
                thread::Builder::new()
                    .name(format!("media-worker-{id}"))
                    .spawn(move || worker_loop(shared, config, notify))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("Failed to spawn media worker: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();
        log::debug!("Started {} media workers", workers.len());

        Self { shared, workers }
    }

    /// Queues a decode of `path` scaled to `target`, behind any pending
    /// probes. `transform` runs on the pixels when the consumer first reads
    /// them.
    pub fn submit_decode<U>(
        &self,
        path: &Path,
        target: (u32, u32),
        transform: impl FnOnce(DecodedImage) -> U + 'static,
    ) -> (Lazy<DecodedImage, U>, Lazy<(u32, u32)>, Lazy<PageType>) {
        let (pixels_tx, pixels_rx) = bounded(1);
        let (size_tx, size_rx) = bounded(1);
        let (type_tx, type_rx) = bounded(1);
        self.push(
            Job::Decode {
                path: path.to_path_buf(),
                target,
                pixels: pixels_tx,
                size: size_tx,
                page_type: type_tx,
            },
            false,
        );
        (
            Lazy::with_transform(pixels_rx, transform),
            Lazy::pending(size_rx),
            Lazy::pending(type_rx),
        )
    }

    pub fn submit_probe(&self, path: &Path) -> (Lazy<(u32, u32)>, Lazy<PageType>) {
        let (size_tx, size_rx) = bounded(1);
        let (type_tx, type_rx) = bounded(1);
        self.push(
            Job::Probe {
                path: path.to_path_buf(),
                size: size_tx,
                page_type: type_tx,
            },
            true,
        );
        (Lazy::pending(size_rx), Lazy::pending(type_rx))
    }

    fn push(&self, job: Job, priority: bool) {
        let (lock, cvar) = &*self.shared;
        let mut queue = lock.lock().unwrap();
        if queue.stop {
            // dropping the job disconnects its channels
            return;
        }
        if priority {
            queue.jobs.push_front(job);
        } else {
            queue.jobs.push_back(job);
        }
        cvar.notify_one();
    }

    pub fn queued(&self) -> usize {
        self.shared.0.lock().unwrap().jobs.len()
    }

    /// Stops the workers and waits for them. Queued jobs are dropped, so their
    /// results report [`LoadError::Cancelled`].
    pub fn shutdown(&mut self) {
        {
            let (lock, cvar) = &*self.shared;
            let mut queue = lock.lock().unwrap();
            queue.stop = true;
            queue.jobs.clear();
            cvar.notify_all();
        }
        let count = self.workers.len();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("A media worker panicked");
            }
        }
        if count > 0 {
            log::debug!("Joined {} media workers", count);
        }
    }
}

impl Drop for MediaPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Background workers
// ---------------------------------------------------------------------------

fn worker_loop<F: Fn()>(shared: SharedQueue, config: ClassifyConfig, notify: F) {
    loop {
        // Wait for work
        let job = {
            let (lock, cvar) = &*shared;
            let mut queue = lock.lock().unwrap();
            loop {
                if queue.stop {
                    return;
                }
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                queue = cvar.wait(queue).unwrap();
            }
        };

        run_job(job, &config);
        notify();
    }
}

fn run_job(job: Job, config: &ClassifyConfig) {
    // Send errors only mean the consumer stopped caring.
    match job {
        Job::Decode { path, target, pixels, size, page_type } => match decode_image(&path) {
            Ok(img) => {
                let (w, h) = img.dimensions();
                let _ = size.send(Ok((w, h)));
                let _ = page_type.send(Ok(classify_page(img.as_raw(), w, h, config)));
                log::debug!("Decoded {} ({}x{} -> {}x{})", path.display(), w, h, target.0, target.1);
                let _ = pixels.send(Ok(rescale(&img, target)));
            }
            Err(e) => {
                log::warn!("{}", e);
                let _ = size.send(Err(e.clone()));
                let _ = page_type.send(Err(e.clone()));
                let _ = pixels.send(Err(e));
            }
        },
        Job::Probe { path, size, page_type } => {
            let natural = match probe_natural_size(&path) {
                Ok(natural) => natural,
                Err(e) => {
                    log::warn!("{}", e);
                    let _ = size.send(Err(e.clone()));
                    let _ = page_type.send(Err(e));
                    return;
                }
            };
            let _ = size.send(Ok(natural));

            let classified = if config.is_wide(natural) {
                Ok(PageType::StandaloneWide)
            } else {
                decode_image(&path).map(|img| {
                    let (w, h) = img.dimensions();
                    classify_page(img.as_raw(), w, h, config)
                })
            };
            if let Err(e) = &classified {
                log::warn!("{}", e);
            }
            let _ = page_type.send(classified);
        }
    }
}
