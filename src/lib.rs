pub use relm_core::*;
