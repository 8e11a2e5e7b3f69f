mod srt;
mod track;

pub use srt::*;
pub use track::*;
