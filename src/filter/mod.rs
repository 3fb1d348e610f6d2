pub mod types;
pub mod error;
pub mod filter_where;
pub mod filter_order;
pub mod projection;

pub use error::FilterError;
pub use projection::Projection;
pub use types::*;
