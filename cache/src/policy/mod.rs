pub mod arc;
pub mod lru_k;

mod lru_list;

pub use arc::ArcCache;
pub use lru_k::LruKCache;
