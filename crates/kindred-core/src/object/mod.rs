//! Domain objects as the hosting framework manages them.

mod context;
mod value;

pub use context::{default_value, AssociatedSlot, ExecutionContext, Lifecycle, ObjectState};
pub use value::{EmbeddedValue, FieldValue, ObjectId};
