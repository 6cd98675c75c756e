pub mod filter;
pub mod builder;
pub mod page;
pub mod spec;
pub mod options;

pub use filter::{FilterCondition, FilterOperator, SortDirection};
pub use builder::{Boolean, Clause, OrderBy, Query, SelectItem, TrashedScope};
pub use page::{Page, Paginated};
pub use spec::{Dimension, FilterError, FilterSpec, Filters, RESERVED_KEYS};
pub use options::{Conditions, ListOptions, PaginationOptions, DEFAULT_PER_PAGE};
