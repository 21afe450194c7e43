//! Background image loading.
//!
//! Loads run in two stages: worker threads decode a small preview first
//! (announcing dimensions, orientation and a thumbnail), then the full
//! bitmap, bounded by the image-quality setting. Results come back over
//! a channel and are applied to [`Image`] entities when the host drains
//! the loader. A generation counter keeps only the latest request
//! relevant; decoded full bitmaps land in a byte-budgeted LRU cache so
//! navigating back to a recent image skips the decode.

use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Sender};
use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::metadata::Orientation as ExifOrientation;
use image::{
    AnimationDecoder, DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader,
    RgbaImage,
};
use lru::LruCache;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Image, ImageId, ImageList, Orientation};

/// Longest side of the preview decode, in pixels.
pub const PREVIEW_SIZE: u32 = 256;
const DEFAULT_CACHE_MB: usize = 128;

fn bitmap_cache_bytes() -> usize {
    std::env::var("RSTTO_CACHE_MB")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .map(|mb| mb * 1024 * 1024)
        .unwrap_or(DEFAULT_CACHE_MB * 1024 * 1024)
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no frames in {path}")]
    Empty { path: PathBuf },
}

/// Result of a load stage, applied to the matching [`Image`] on drain.
pub enum LoadEvent {
    Prepared {
        id: ImageId,
        generation: u64,
        width: u32,
        height: u32,
        orientation: Orientation,
        has_alpha: bool,
        thumbnail: Arc<RgbaImage>,
    },
    Updated {
        id: ImageId,
        generation: u64,
        pixbuf: Arc<RgbaImage>,
        has_alpha: bool,
    },
    Failed {
        id: ImageId,
        generation: u64,
        error: LoadError,
    },
}

struct PreviewRequest {
    id: ImageId,
    path: PathBuf,
    generation: u64,
}

struct FullRequest {
    id: ImageId,
    path: PathBuf,
    generation: u64,
    max_size: u32,
}

struct CacheEntry {
    pixbuf: Arc<RgbaImage>,
    has_alpha: bool,
    bytes: usize,
    /// Quality bound the entry was decoded at. A different bound is a
    /// cache miss.
    max_size: u32,
}

pub(crate) struct BitmapCache {
    max_bytes: usize,
    bytes: usize,
    entries: LruCache<ImageId, CacheEntry>,
}

impl BitmapCache {
    fn new(max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(2048).unwrap();
        Self {
            max_bytes,
            bytes: 0,
            entries: LruCache::new(capacity),
        }
    }

    fn get(&mut self, id: ImageId, max_size: u32) -> Option<(Arc<RgbaImage>, bool)> {
        match self.entries.get(&id) {
            Some(entry) if entry.max_size == max_size => {
                Some((entry.pixbuf.clone(), entry.has_alpha))
            }
            _ => None,
        }
    }

    fn insert(&mut self, id: ImageId, pixbuf: Arc<RgbaImage>, has_alpha: bool, max_size: u32) {
        let bytes = (pixbuf.width() as u64)
            .saturating_mul(pixbuf.height() as u64)
            .saturating_mul(4) as usize;
        let entry = CacheEntry {
            pixbuf,
            has_alpha,
            bytes,
            max_size,
        };

        if let Some(existing) = self.entries.put(id, entry) {
            self.bytes = self.bytes.saturating_sub(existing.bytes);
        }
        self.bytes = self.bytes.saturating_add(bytes);

        while self.bytes > self.max_bytes {
            if let Some((_id, evicted)) = self.entries.pop_lru() {
                self.bytes = self.bytes.saturating_sub(evicted.bytes);
            } else {
                break;
            }
        }
    }
}

/// Two preview workers and one coalescing full-resolution worker, all
/// feeding a single event channel.
pub struct ImageLoader {
    preview_tx: Sender<PreviewRequest>,
    full_tx: Sender<FullRequest>,
    event_tx: Sender<LoadEvent>,
    event_rx: Receiver<LoadEvent>,
    generation: Arc<AtomicU64>,
    cache: Arc<Mutex<BitmapCache>>,
}

impl ImageLoader {
    pub fn new() -> Self {
        let (event_tx, event_rx) = flume::unbounded::<LoadEvent>();
        let generation = Arc::new(AtomicU64::new(0));
        let cache = Arc::new(Mutex::new(BitmapCache::new(bitmap_cache_bytes())));

        let (preview_tx, preview_rx) = flume::bounded::<PreviewRequest>(256);
        for _ in 0..2 {
            let rx = preview_rx.clone();
            let tx = event_tx.clone();
            let generation = generation.clone();
            std::thread::spawn(move || {
                while let Ok(req) = rx.recv() {
                    if req.generation != generation.load(Ordering::Acquire) {
                        continue;
                    }
                    let event = match decode_preview(&req.path, PREVIEW_SIZE) {
                        Ok(d) => LoadEvent::Prepared {
                            id: req.id,
                            generation: req.generation,
                            width: d.width,
                            height: d.height,
                            orientation: d.orientation,
                            has_alpha: d.has_alpha,
                            thumbnail: Arc::new(d.thumbnail),
                        },
                        Err(error) => LoadEvent::Failed {
                            id: req.id,
                            generation: req.generation,
                            error,
                        },
                    };
                    if req.generation != generation.load(Ordering::Acquire) {
                        continue;
                    }
                    let _ = tx.send(event);
                }
            });
        }

        // Single full-resolution worker with latest-only coalescing.
        let (full_tx, full_rx) = flume::unbounded::<FullRequest>();
        {
            let rx = full_rx;
            let tx = event_tx.clone();
            let generation = generation.clone();
            let cache = cache.clone();
            std::thread::spawn(move || {
                while let Ok(mut req) = rx.recv() {
                    while let Ok(next) = rx.try_recv() {
                        req = next;
                    }
                    if req.generation != generation.load(Ordering::Acquire) {
                        continue;
                    }
                    let event = match decode_full(&req.path, req.max_size) {
                        Ok((pixbuf, has_alpha)) => {
                            let pixbuf = Arc::new(pixbuf);
                            // Even a result that arrives late is worth
                            // caching for back-navigation.
                            cache
                                .lock()
                                .insert(req.id, pixbuf.clone(), has_alpha, req.max_size);
                            LoadEvent::Updated {
                                id: req.id,
                                generation: req.generation,
                                pixbuf,
                                has_alpha,
                            }
                        }
                        Err(error) => LoadEvent::Failed {
                            id: req.id,
                            generation: req.generation,
                            error,
                        },
                    };
                    if req.generation != generation.load(Ordering::Acquire) {
                        continue;
                    }
                    let _ = tx.send(event);
                }
            });
        }

        Self {
            preview_tx,
            full_tx,
            event_tx,
            event_rx,
            generation,
            cache,
        }
    }

    /// Start loading `image`, superseding any in-flight request.
    /// `max_size` bounds the longest side of the full decode, 0 for
    /// unbounded.
    pub fn request(&self, image: &Image, max_size: u32) {
        let generation = self
            .generation
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        let id = image.id();
        let path = image.path().to_path_buf();

        // A thumbnail kept from an earlier visit re-announces itself so
        // the stages still arrive in order.
        if let Some(thumbnail) = image.thumbnail() {
            let _ = self.event_tx.send(LoadEvent::Prepared {
                id,
                generation,
                width: image.width(),
                height: image.height(),
                orientation: image.orientation(),
                has_alpha: image.has_alpha(),
                thumbnail,
            });
        } else if self
            .preview_tx
            .try_send(PreviewRequest {
                id,
                path: path.clone(),
                generation,
            })
            .is_err()
        {
            warn!(path = %path.display(), "preview queue full, skipping");
        }

        if image.pixbuf().is_some() {
            return;
        }
        if let Some((pixbuf, has_alpha)) = self.cache.lock().get(id, max_size) {
            debug!(path = %path.display(), "bitmap cache hit");
            let _ = self.event_tx.send(LoadEvent::Updated {
                id,
                generation,
                pixbuf,
                has_alpha,
            });
            return;
        }
        let _ = self.full_tx.send(FullRequest {
            id,
            path,
            generation,
            max_size,
        });
    }

    /// Apply all pending events to their images. Returns how many were
    /// applied; stale generations are dropped.
    pub fn drain(&self, list: &ImageList) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            applied += usize::from(self.apply(list, event));
        }
        applied
    }

    /// Like [`drain`](Self::drain), but waits up to `timeout` for the
    /// first event.
    pub fn drain_blocking(&self, list: &ImageList, timeout: Duration) -> usize {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => usize::from(self.apply(list, event)) + self.drain(list),
            Err(_) => 0,
        }
    }

    fn apply(&self, list: &ImageList, event: LoadEvent) -> bool {
        let current = self.generation.load(Ordering::Acquire);
        match event {
            LoadEvent::Prepared {
                id,
                generation,
                width,
                height,
                orientation,
                has_alpha,
                thumbnail,
            } => {
                if generation != current {
                    return false;
                }
                let Some(image) = list.find_by_id(id) else {
                    return false;
                };
                // A preview that lost the race against the full decode
                // must not regress the image.
                if image.pixbuf().is_some() {
                    return false;
                }
                image.apply_prepared(width, height, orientation, has_alpha, thumbnail);
                true
            }
            LoadEvent::Updated {
                id,
                generation,
                pixbuf,
                has_alpha,
            } => {
                if generation != current {
                    return false;
                }
                let Some(image) = list.find_by_id(id) else {
                    return false;
                };
                image.apply_updated(pixbuf, has_alpha);
                true
            }
            LoadEvent::Failed {
                id,
                generation,
                error,
            } => {
                warn!("load failed: {error}");
                if generation != current {
                    return false;
                }
                let Some(image) = list.find_by_id(id) else {
                    return false;
                };
                if image.is_broken() {
                    return false;
                }
                image.mark_broken();
                true
            }
        }
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

struct PreviewDecode {
    width: u32,
    height: u32,
    orientation: Orientation,
    has_alpha: bool,
    thumbnail: RgbaImage,
}

/// Decode pixel data along with the metadata the viewer needs. The
/// bitmap stays unrotated; orientation is applied at render time.
fn decode_source(path: &Path) -> Result<(DynamicImage, Orientation, bool), LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        // Animated GIFs render as their first frame.
        let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let mut frames = decoder.into_frames();
        return match frames.next() {
            Some(frame) => {
                let frame = frame.map_err(|source| LoadError::Decode {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok((
                    DynamicImage::ImageRgba8(frame.into_buffer()),
                    Orientation::None,
                    true,
                ))
            }
            None => Err(LoadError::Empty {
                path: path.to_path_buf(),
            }),
        };
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut decoder = reader.into_decoder().map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let orientation = decoder
        .orientation()
        .unwrap_or(ExifOrientation::NoTransforms);
    let has_alpha = decoder.color_type().has_alpha();
    let img = DynamicImage::from_decoder(decoder).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((img, Orientation::from_exif(orientation), has_alpha))
}

fn decode_preview(path: &Path, max_size: u32) -> Result<PreviewDecode, LoadError> {
    let (img, orientation, has_alpha) = decode_source(path)?;
    let (orig_w, orig_h) = img.dimensions();

    let scale = if orig_w > orig_h {
        max_size as f32 / orig_w as f32
    } else {
        max_size as f32 / orig_h as f32
    };
    let thumbnail = if scale < 1.0 {
        let new_w = ((orig_w as f32 * scale) as u32).max(1);
        let new_h = ((orig_h as f32 * scale) as u32).max(1);
        img.resize_exact(new_w, new_h, FilterType::Triangle)
    } else {
        img
    }
    .to_rgba8();

    Ok(PreviewDecode {
        width: orig_w.max(1),
        height: orig_h.max(1),
        orientation,
        has_alpha,
        thumbnail,
    })
}

fn decode_full(path: &Path, max_size: u32) -> Result<(RgbaImage, bool), LoadError> {
    let (img, _orientation, has_alpha) = decode_source(path)?;
    let (orig_w, orig_h) = img.dimensions();

    let bounded = if max_size > 0 {
        let scale = if orig_w > orig_h {
            max_size as f32 / orig_w as f32
        } else {
            max_size as f32 / orig_h as f32
        };
        if scale < 1.0 {
            let new_w = ((orig_w as f32 * scale) as u32).max(1);
            let new_h = ((orig_h as f32 * scale) as u32).max(1);
            img.resize_exact(new_w, new_h, FilterType::Triangle)
        } else {
            img
        }
    } else {
        img
    };

    Ok((bounded.to_rgba8(), has_alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs::File;
    use std::io::Write;
    use std::rc::Rc;
    use std::time::Instant;

    fn write_test_png(path: &Path) {
        // Minimal valid 1x1 RGB PNG.
        let png_data: [u8; 69] = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
            0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x78,
            0xDA, 0x63, 0xF8, 0xFF, 0xFF, 0x3F, 0x00, 0x05, 0xFE, 0x02, 0xFE, 0x33, 0x12, 0x95,
            0x14, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ];
        let mut file = File::create(path).unwrap();
        file.write_all(&png_data).unwrap();
    }

    fn write_rgba_png(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        img.save(path).unwrap();
    }

    fn drain_until<F: Fn() -> bool>(loader: &ImageLoader, list: &ImageList, done: F) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() && Instant::now() < deadline {
            loader.drain_blocking(list, Duration::from_millis(200));
        }
        assert!(done(), "loader did not finish in time");
    }

    #[test]
    fn test_decode_preview_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.png");
        write_test_png(&path);

        let decoded = decode_preview(&path, PREVIEW_SIZE).unwrap();
        assert_eq!((decoded.width, decoded.height), (1, 1));
        assert_eq!(decoded.orientation, Orientation::None);
        assert!(!decoded.has_alpha);
        assert_eq!(decoded.thumbnail.dimensions(), (1, 1));
    }

    #[test]
    fn test_decode_full_honors_quality_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_rgba_png(&path, 8, 4);

        let (bounded, has_alpha) = decode_full(&path, 4).unwrap();
        assert_eq!(bounded.dimensions(), (4, 2));
        assert!(has_alpha);

        let (full, _) = decode_full(&path, 0).unwrap();
        assert_eq!(full.dimensions(), (8, 4));
    }

    #[test]
    fn test_request_and_drain_applies_both_stages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        write_rgba_png(&path, 4, 2);

        let list = ImageList::new();
        let img = list.add_file(&path).unwrap();
        let prepared = Rc::new(Cell::new(0));
        let updated = Rc::new(Cell::new(0));
        {
            let p = prepared.clone();
            img.connect_prepared(move || p.set(p.get() + 1));
            let u = updated.clone();
            img.connect_updated(move || u.set(u.get() + 1));
        }

        let loader = ImageLoader::new();
        loader.request(&img, 0);
        drain_until(&loader, &list, || img.pixbuf().is_some());

        assert_eq!((img.width(), img.height()), (4, 2));
        assert!(img.thumbnail().is_some());
        assert!(prepared.get() >= 1);
        assert_eq!(updated.get(), 1);
        assert!(!img.is_broken());
    }

    #[test]
    fn test_newer_request_supersedes_older() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.png");
        let path_b = dir.path().join("b.png");
        write_rgba_png(&path_a, 4, 4);
        write_rgba_png(&path_b, 2, 2);

        let list = ImageList::new();
        let a = list.add_file(&path_a).unwrap();
        let b = list.add_file(&path_b).unwrap();

        let loader = ImageLoader::new();
        loader.request(&a, 0);
        loader.request(&b, 0);
        drain_until(&loader, &list, || b.pixbuf().is_some());
        loader.drain_blocking(&list, Duration::from_millis(200));

        // Events for the superseded request are dropped at apply time.
        assert!(a.pixbuf().is_none());
    }

    #[test]
    fn test_unload_then_request_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        write_rgba_png(&path, 4, 2);

        let list = ImageList::new();
        let img = list.add_file(&path).unwrap();
        let loader = ImageLoader::new();
        loader.request(&img, 0);
        drain_until(&loader, &list, || img.pixbuf().is_some());

        img.unload();
        assert!(img.pixbuf().is_none());

        // With the file gone, only the cache can satisfy the reload.
        std::fs::remove_file(&path).unwrap();
        loader.request(&img, 0);
        drain_until(&loader, &list, || img.pixbuf().is_some());
        assert!(!img.is_broken());
    }

    #[test]
    fn test_missing_file_marks_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        write_test_png(&path);

        let list = ImageList::new();
        let img = list.add_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let loader = ImageLoader::new();
        loader.request(&img, 0);
        drain_until(&loader, &list, || img.is_broken());
    }

    #[test]
    fn test_cache_quality_mismatch_is_miss() {
        let mut cache = BitmapCache::new(1024 * 1024);
        let id = ImageId(7);
        let pixbuf = Arc::new(RgbaImage::new(2, 2));
        cache.insert(id, pixbuf, false, 100);

        assert!(cache.get(id, 50).is_none());
        assert!(cache.get(id, 100).is_some());
    }

    #[test]
    fn test_cache_evicts_by_byte_budget() {
        // Room for one 2x2 RGBA bitmap but not two.
        let mut cache = BitmapCache::new(20);
        cache.insert(ImageId(1), Arc::new(RgbaImage::new(2, 2)), false, 0);
        cache.insert(ImageId(2), Arc::new(RgbaImage::new(2, 2)), false, 0);

        assert!(cache.get(ImageId(1), 0).is_none());
        assert!(cache.get(ImageId(2), 0).is_some());
    }
}
