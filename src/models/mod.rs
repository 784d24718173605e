pub mod media;
pub mod media_list;
pub mod sort;
pub mod updates;

pub use media::*;
pub use media_list::*;
pub use sort::*;
pub use updates::*;
