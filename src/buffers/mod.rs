pub mod ring;

pub use ring::{ItemHandle, ItemState, RingBuffer};
