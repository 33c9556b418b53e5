pub mod expand;
pub mod sync;
