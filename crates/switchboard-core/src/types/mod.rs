//! Core data types shared by stores and entities.

mod item;
mod lookup;

pub use item::{Fields, Item, ItemId, ID_FIELD};
pub use lookup::Lookup;
