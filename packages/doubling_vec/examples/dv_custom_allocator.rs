//! Using a custom allocation strategy together with item copies that can fail.
//!
//! The strategy below hands out a limited number of memory blocks. We use it to show that:
//!
//! * A failed copy drops the partial copy and leaves the original untouched.
//! * A refused allocation hands the item back from `try_push()`, so it can be retried.

use std::alloc::Layout;
use std::cell::Cell;
use std::error;
use std::fmt;
use std::ptr::NonNull;

use doubling_vec::{AllocError, Allocator, DoublingVec, Error, Global, TryClone};

/// Allows a fixed number of allocations, shared with every strategy derived for copies.
#[derive(Debug)]
struct Rationed<'a> {
    remaining: &'a Cell<usize>,
}

// SAFETY: Blocks come from `Global`, we only decide whether to ask for one.
unsafe impl Allocator for Rationed<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let Some(remaining) = self.remaining.get().checked_sub(1) else {
            return Err(AllocError::new(layout));
        };

        self.remaining.set(remaining);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees, the block came from `Global`.
        unsafe {
            Global.deallocate(ptr, layout);
        }
    }

    fn for_copy(&self) -> Self {
        Self {
            remaining: self.remaining,
        }
    }
}

/// A concert ticket that cannot be duplicated once it has been scanned.
#[derive(Debug)]
struct Ticket {
    seat: u32,
    scanned: bool,
}

#[derive(Debug)]
struct AlreadyScanned(u32);

impl fmt::Display for AlreadyScanned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket for seat {} has already been scanned", self.0)
    }
}

impl error::Error for AlreadyScanned {}

impl TryClone for Ticket {
    type Error = AlreadyScanned;

    fn try_clone(&self) -> Result<Self, AlreadyScanned> {
        if self.scanned {
            return Err(AlreadyScanned(self.seat));
        }

        Ok(Self {
            seat: self.seat,
            scanned: false,
        })
    }
}

fn main() {
    let remaining = Cell::new(8);

    let mut tickets = DoublingVec::new_in(Rationed {
        remaining: &remaining,
    });

    for seat in 1..=3 {
        tickets
            .push(Ticket {
                seat,
                scanned: seat == 3,
            })
            .unwrap();
    }

    println!(
        "Holding {} tickets, {} allocations left",
        tickets.len(),
        remaining.get()
    );

    match tickets.try_clone() {
        Ok(copy) => println!("Copied {} tickets", copy.len()),
        Err(Error::ItemCopy { index, source }) => {
            println!("Copy failed at index {index}: {source}");
        }
        Err(error) => println!("Copy failed: {error}"),
    }

    // The original is untouched by the failed copy.
    println!(
        "Still holding {} tickets, first seat is {}",
        tickets.len(),
        tickets[0].seat
    );

    // Use up the remaining allocations, then try to grow.
    remaining.set(0);
    tickets
        .push(Ticket {
            seat: 4,
            scanned: false,
        })
        .unwrap();

    let fifth = Ticket {
        seat: 5,
        scanned: false,
    };

    match tickets.try_push(fifth) {
        Ok(()) => println!("Added seat 5"),
        Err(error) => {
            println!("Could not add a ticket: {error}");

            // The ticket is handed back, so we can retry once more memory is available.
            remaining.set(1);
            tickets.try_push(error.into_inner()).unwrap();
            println!("Added seat {} on retry", tickets[4].seat);
        }
    }
}
