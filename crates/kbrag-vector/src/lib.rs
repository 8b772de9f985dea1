pub mod builder;
pub mod flat;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

pub use builder::{BuildReport, IndexBuilder};
pub use flat::FlatIndex;
pub use search::LanceIndex;
pub use store::{IndexOpener, IndexStore, LanceOpener, PreloadedOpener};
pub use table::IndexMeta;
pub use writer::LanceDbIndexer;
