mod crash_loop;
mod plugin;

pub use crash_loop::*;
pub use plugin::*;
