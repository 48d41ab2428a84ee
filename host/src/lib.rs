pub mod types;
pub mod value;

pub use types::{Class, Type};
pub use value::Value;
pub use value::record::{Map, Object};
pub use value::sequence::{Seq, SeqKind};
