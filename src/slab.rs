//! Slab allocator for trie nodes.
//!
//! Fixed-size items are carved out of naturally-aligned slabs, so the slab
//! owning any item is recovered from the item address alone by masking off
//! the low bits. Each slab keeps an intrusive free list threaded through its
//! free items; the cache keeps two doubly-linked slab lists, one for slabs
//! with at least one free item and one for full slabs.
//!
//! Item regions are optionally offset per slab (cache coloring) so that the
//! items of different slabs do not all compete for the same cache lines.

#![allow(unsafe_op_in_unsafe_fn)]

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::{self, NonNull};

use crate::{MEM_COLORING, SLAB_SIZE};

/// Smallest item size: a free item must hold the free-list link.
const SLAB_MIN_ITEM: usize = std::mem::size_of::<*mut u8>();

/// Minimum space reserved for cache coloring.
const SLAB_MIN_COLOR: usize = 32;

/// Recover the base address of the slab containing `ptr`.
///
/// Valid for any pointer returned by [`SlabCache::alloc`], because slabs are
/// `SLAB_SIZE`-aligned blocks of `SLAB_SIZE` bytes.
#[inline]
pub fn slab_base_of(ptr: *const u8) -> *const u8 {
    ((ptr as usize) & !(SLAB_SIZE - 1)) as *const u8
}

#[inline]
fn slab_layout() -> Layout {
    Layout::from_size_align(SLAB_SIZE, SLAB_SIZE).unwrap()
}

/// Slab header, at the start of every `SLAB_SIZE`-aligned block. The rest of
/// the block is divided into `items` fixed-size items.
#[repr(C)]
struct Slab {
    item_size: usize,
    prev: *mut Slab,
    next: *mut Slab,
    items: u32,
    free_items: u32,
    /// Head of the intrusive free list; each free item stores the next free
    /// item's address in its first bytes.
    head: *mut u8,
    /// First item address (header plus coloring offset).
    base: *mut u8,
}

impl Slab {
    #[inline]
    fn is_empty(&self) -> bool {
        self.free_items == self.items
    }
}

/// Counters describing a cache's current slabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabStats {
    /// Number of live slabs.
    pub slabs: usize,
    /// Total items carved across all slabs.
    pub items: usize,
    /// Items currently free.
    pub free_items: usize,
}

/// A recycling allocator for same-sized objects.
///
/// Allocation pops from the first slab with a free item, creating a new slab
/// only when none has one. Freeing pushes the item back onto its owning
/// slab's free list, found by address masking.
pub struct SlabCache {
    item_size: usize,
    color: usize,
    slabs_free: *mut Slab,
    slabs_full: *mut Slab,
}

impl SlabCache {
    /// Create a cache for items of `item_size` bytes. No memory is allocated
    /// until the first [`alloc`](Self::alloc).
    pub fn new(item_size: usize) -> Self {
        assert!(item_size > 0, "zero-sized slab items");
        // Items double as free-list links and are handed out 8-aligned.
        let item_size = (item_size.max(SLAB_MIN_ITEM) + 7) & !7;
        debug_assert!(item_size <= SLAB_SIZE - std::mem::size_of::<Slab>() - SLAB_MIN_COLOR);
        Self {
            item_size,
            color: 0,
            slabs_free: ptr::null_mut(),
            slabs_full: ptr::null_mut(),
        }
    }

    /// Allocate one item. Aborts on allocation failure.
    pub fn alloc(&mut self) -> NonNull<u8> {
        unsafe {
            if self.slabs_free.is_null() {
                self.new_slab();
            }
            let slab = self.slabs_free;
            let item = (*slab).head;
            debug_assert!(!item.is_null());
            (*slab).head = *(item as *mut *mut u8);
            (*slab).free_items -= 1;

            if (*slab).free_items == 0 {
                self.list_remove(slab);
                Self::list_insert(&mut self.slabs_full, slab);
            }
            NonNull::new_unchecked(item)
        }
    }

    /// Return `ptr` to its owning slab.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`alloc`](Self::alloc) on this cache
    /// and not freed since.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let slab = slab_base_of(ptr.as_ptr()) as *mut Slab;
        debug_assert!({
            let off = ptr.as_ptr() as usize - (*slab).base as usize;
            off % (*slab).item_size == 0
        });
        *(ptr.as_ptr() as *mut *mut u8) = (*slab).head;
        (*slab).head = ptr.as_ptr();
        (*slab).free_items += 1;

        if (*slab).free_items == 1 {
            self.list_remove(slab);
            Self::list_insert(&mut self.slabs_free, slab);
        }
    }

    /// Release every slab with no live items. Returns the number released.
    pub fn reap(&mut self) -> usize {
        let mut count = 0;
        let mut slab = self.slabs_free;
        unsafe {
            while !slab.is_null() {
                let next = (*slab).next;
                if (*slab).is_empty() {
                    self.list_remove(slab);
                    dealloc(slab as *mut u8, slab_layout());
                    count += 1;
                }
                slab = next;
            }
        }
        count
    }

    /// Current slab and item counters.
    pub fn stats(&self) -> SlabStats {
        let mut stats = SlabStats::default();
        unsafe {
            for mut slab in [self.slabs_free, self.slabs_full] {
                while !slab.is_null() {
                    stats.slabs += 1;
                    stats.items += (*slab).items as usize;
                    stats.free_items += (*slab).free_items as usize;
                    slab = (*slab).next;
                }
            }
        }
        stats
    }

    /// Bytes held by this cache's slabs.
    pub fn memory_usage(&self) -> usize {
        self.stats().slabs * SLAB_SIZE
    }

    unsafe fn new_slab(&mut self) {
        let layout = slab_layout();
        let mem = alloc(layout);
        if mem.is_null() {
            handle_alloc_error(layout);
        }
        let slab = mem as *mut Slab;

        let data_size = SLAB_SIZE - std::mem::size_of::<Slab>();
        let mut spare = data_size % self.item_size;
        if spare < SLAB_MIN_COLOR {
            spare = SLAB_MIN_COLOR;
        }
        let color = if MEM_COLORING {
            self.color = self.color.wrapping_add(std::mem::size_of::<*mut u8>());
            // keep item alignment
            (self.color % spare) & !7
        } else {
            0
        };

        let count = (data_size - color) / self.item_size;
        debug_assert!(count >= 1);
        let base = mem.add(std::mem::size_of::<Slab>() + color);

        ptr::write(
            slab,
            Slab {
                item_size: self.item_size,
                prev: ptr::null_mut(),
                next: ptr::null_mut(),
                items: count as u32,
                free_items: count as u32,
                head: base,
                base,
            },
        );

        // Thread the free list through the items; the last one terminates.
        for i in 0..count - 1 {
            let item = base.add(i * self.item_size);
            *(item as *mut *mut u8) = base.add((i + 1) * self.item_size);
        }
        *(base.add((count - 1) * self.item_size) as *mut *mut u8) = ptr::null_mut();

        Self::list_insert(&mut self.slabs_free, slab);
    }

    unsafe fn list_insert(list: &mut *mut Slab, slab: *mut Slab) {
        (*slab).prev = ptr::null_mut();
        (*slab).next = *list;
        if !(*list).is_null() {
            (**list).prev = slab;
        }
        *list = slab;
    }

    unsafe fn list_remove(&mut self, slab: *mut Slab) {
        let prev = (*slab).prev;
        let next = (*slab).next;
        if !prev.is_null() {
            (*prev).next = next;
        }
        if !next.is_null() {
            (*next).prev = prev;
        }
        if self.slabs_free == slab {
            self.slabs_free = next;
        } else if self.slabs_full == slab {
            self.slabs_full = next;
        }
    }
}

impl Drop for SlabCache {
    fn drop(&mut self) {
        unsafe {
            for head in [self.slabs_free, self.slabs_full] {
                let mut slab = head;
                while !slab.is_null() {
                    let next = (*slab).next;
                    dealloc(slab as *mut u8, slab_layout());
                    slab = next;
                }
            }
        }
        self.slabs_free = ptr::null_mut();
        self.slabs_full = ptr::null_mut();
    }
}

unsafe impl Send for SlabCache {}
unsafe impl Sync for SlabCache {}
