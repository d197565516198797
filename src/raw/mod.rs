mod arena;
mod handle;
mod node;
mod raw_llrb_map;
mod size;

pub(crate) use handle::Handle;
pub(crate) use node::MAX_HEIGHT;
pub(crate) use raw_llrb_map::RawLlrbMap;
