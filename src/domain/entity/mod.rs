pub mod data_type;
pub mod value;
pub mod column;
pub mod table;
pub mod model;

pub use data_type::{DataType, Constraint};
pub use value::{Value, ValueError};
pub use column::Column;
pub use table::{Table, Row, TableError};
pub use model::Entity;
