pub mod group_key;
pub mod line_batch;
pub mod path_entry;
pub mod registry;
pub mod tessellate;

pub use group_key::AttributeGroupKey;
pub use line_batch::LineBatch;
pub use path_entry::{DirtyFlags, PathEntry};
pub use registry::{BatchLocation, BatchRegistry, RenderSummary};
pub use tessellate::PathType;
