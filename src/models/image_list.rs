//! Ordered image collection and its navigator cursors.
//!
//! The list owns the [`Image`] entities; iterators are tracked through
//! weak references so list mutations can keep every outstanding cursor
//! consistent:
//! - removal before the cursor shifts it back silently (same image),
//! - removal of the current image clamps the index and fires "changed",
//! - clearing resets all cursors to 0 and fires "changed".

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use thiserror::Error;
use tracing::debug;

use crate::observers::{HandlerId, Observers};

use super::image::{is_image_path, Image, ImageId};

#[derive(Debug, Error)]
pub enum AddFileError {
    #[error("unsupported file type: {}", path.display())]
    UnsupportedType { path: PathBuf },
}

pub struct ImageList {
    images: RefCell<Vec<Rc<Image>>>,
    iters: RefCell<Vec<Weak<ImageListIter>>>,
    next_id: Cell<u64>,
}

/// Sort key used for insertion order: case-insensitive file name, full
/// path as tie breaker.
fn sort_key(path: &Path) -> (String, PathBuf) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (name, path.to_path_buf())
}

impl ImageList {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            images: RefCell::new(Vec::new()),
            iters: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        })
    }

    pub fn len(&self) -> usize {
        self.images.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.borrow().is_empty()
    }

    pub fn image_at(&self, index: usize) -> Option<Rc<Image>> {
        self.images.borrow().get(index).cloned()
    }

    pub fn index_of(&self, image: &Rc<Image>) -> Option<usize> {
        self.images
            .borrow()
            .iter()
            .position(|i| Rc::ptr_eq(i, image))
    }

    pub(crate) fn find_by_id(&self, id: ImageId) -> Option<Rc<Image>> {
        self.images
            .borrow()
            .iter()
            .find(|i| i.id() == id)
            .cloned()
    }

    /// Insert a new image in sort order. Iterators keep their current
    /// image; iterators on a previously empty list gain one and fire
    /// "changed".
    pub fn add_file(&self, path: &Path) -> Result<Rc<Image>, AddFileError> {
        if !is_image_path(path) {
            return Err(AddFileError::UnsupportedType {
                path: path.to_path_buf(),
            });
        }

        let id = ImageId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let image = Rc::new(Image::new(id, path.to_path_buf()));

        let was_empty;
        let index;
        {
            let mut images = self.images.borrow_mut();
            was_empty = images.is_empty();
            let key = sort_key(path);
            index = images.partition_point(|i| sort_key(i.path()) < key);
            images.insert(index, image.clone());
        }

        let notify = self.adjust_iters(|pos| {
            if was_empty {
                (0, true)
            } else if pos >= index {
                (pos + 1, false)
            } else {
                (pos, false)
            }
        });
        debug!(path = %path.display(), index, "added image");
        for iter in notify {
            iter.emit_changed();
        }
        Ok(image)
    }

    /// Remove one image. Returns false when the image is not in the
    /// list.
    pub fn remove(&self, image: &Rc<Image>) -> bool {
        let index;
        let new_len;
        {
            let mut images = self.images.borrow_mut();
            match images.iter().position(|i| Rc::ptr_eq(i, image)) {
                Some(i) => index = i,
                None => return false,
            }
            images.remove(index);
            new_len = images.len();
        }

        let notify = self.adjust_iters(|pos| {
            if pos > index {
                (pos - 1, false)
            } else if pos == index {
                (pos.min(new_len.saturating_sub(1)), true)
            } else {
                (pos, false)
            }
        });
        debug!(path = %image.path().display(), "removed image");
        for iter in notify {
            iter.emit_changed();
        }
        true
    }

    pub fn remove_all(&self) {
        let was_empty = {
            let mut images = self.images.borrow_mut();
            let was_empty = images.is_empty();
            images.clear();
            was_empty
        };

        let notify = self.adjust_iters(|_pos| (0, !was_empty));
        for iter in notify {
            iter.emit_changed();
        }
    }

    pub fn get_iter(self: &Rc<Self>) -> Rc<ImageListIter> {
        self.iter_at(0)
    }

    pub(crate) fn iter_at(self: &Rc<Self>, position: usize) -> Rc<ImageListIter> {
        let position = position.min(self.len().saturating_sub(1));
        let iter = Rc::new(ImageListIter {
            list: Rc::downgrade(self),
            position: Cell::new(position),
            changed: Observers::new(),
        });
        self.iters.borrow_mut().push(Rc::downgrade(&iter));
        iter
    }

    /// Apply `f(position) -> (new_position, fire_changed)` to every live
    /// iterator; returns the ones that need a "changed" emit so callers
    /// can fire after all borrows are released.
    fn adjust_iters(&self, f: impl Fn(usize) -> (usize, bool)) -> Vec<Rc<ImageListIter>> {
        let mut notify = Vec::new();
        let mut iters = self.iters.borrow_mut();
        iters.retain(|weak| match weak.upgrade() {
            Some(iter) => {
                let (pos, fire) = f(iter.position.get());
                iter.position.set(pos);
                if fire {
                    notify.push(iter);
                }
                true
            }
            None => false,
        });
        notify
    }
}

/// A cursor over an [`ImageList`]. Fires "changed" whenever it moves;
/// wraps around at both ends.
pub struct ImageListIter {
    list: Weak<ImageList>,
    position: Cell<usize>,
    changed: Observers,
}

impl ImageListIter {
    fn list_len(&self) -> usize {
        self.list.upgrade().map(|l| l.len()).unwrap_or(0)
    }

    pub fn get_image(&self) -> Option<Rc<Image>> {
        self.list.upgrade()?.image_at(self.position.get())
    }

    /// Current position, None while the list is empty.
    pub fn get_position(&self) -> Option<usize> {
        if self.list_len() == 0 {
            None
        } else {
            Some(self.position.get())
        }
    }

    pub fn set_position(&self, position: usize) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        self.position.set(position.min(len - 1));
        self.changed.emit();
    }

    pub fn next(&self) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        self.position.set((self.position.get() + 1) % len);
        self.changed.emit();
    }

    pub fn previous(&self) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        self.position.set((self.position.get() + len - 1) % len);
        self.changed.emit();
    }

    /// Position the cursor on `image`. Returns false (cursor untouched)
    /// when the image is not in the list.
    pub fn find_image(&self, image: &Rc<Image>) -> bool {
        let Some(list) = self.list.upgrade() else {
            return false;
        };
        match list.index_of(image) {
            Some(index) => {
                self.position.set(index);
                self.changed.emit();
                true
            }
            None => false,
        }
    }

    /// Independent cursor at the same position, tracked by the list
    /// like any other. None when the list is gone.
    pub fn clone_iter(&self) -> Option<Rc<ImageListIter>> {
        let list = self.list.upgrade()?;
        Some(list.iter_at(self.position.get()))
    }

    pub fn connect_changed(&self, callback: impl Fn() + 'static) -> HandlerId {
        self.changed.connect(callback)
    }

    pub fn disconnect_changed(&self, id: HandlerId) -> bool {
        self.changed.disconnect(id)
    }

    pub(crate) fn emit_changed(&self) {
        self.changed.emit();
    }
}
