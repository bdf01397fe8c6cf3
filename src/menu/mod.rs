//! Menu snapshot stream
//!
//! Holds the most recent decoded display and lets commands block until the
//! pump shows something new.

mod stream;

pub use stream::{MenuSnapshot, MenuStateStream};
