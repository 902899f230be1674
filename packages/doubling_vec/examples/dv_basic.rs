//! Basic usage of the `doubling_vec` crate:
//!
//! * Creating a vector.
//! * Adding items.
//! * Retrieving items.
//! * Clearing and moving contents.

use doubling_vec::DoublingVec;

fn main() {
    let mut names = DoublingVec::<String>::new();

    // No memory is acquired until the first item is added. After that, the capacity doubles
    // whenever the vector runs out of room.
    names.push("Alice".to_string()).unwrap();
    names.push("Bob".to_string()).unwrap();
    names.push("Charlie".to_string()).unwrap();

    println!(
        "Vector contains {} items, with a doubling capacity of {}",
        names.len(),
        names.capacity()
    );

    // Items are accessed by index, similar to `Vec[index]`.
    println!("Item at index 1: {}", names[1]);

    // You can also modify the items in-place.
    names[0].push_str(" Smith");
    println!("Modified item: {}", names[0]);

    // Moving the contents out leaves an empty vector without storage behind.
    let mut moved = names.take();
    println!(
        "After take: moved has {} items, original has {} items and capacity {}",
        moved.len(),
        names.len(),
        names.capacity()
    );

    // Clearing drops the items but keeps the storage for reuse.
    moved.clear();
    println!(
        "After clear: {} items, capacity still {}",
        moved.len(),
        moved.capacity()
    );
}
