//! Domain types and rules for the promo-code administration service.
//!
//! Storage backends implement [`repository::Repository`]; the HTTP layer only
//! talks to those traits and to the partner limit rules in [`limits`].
pub mod limits;
pub mod repository;
pub mod types;

pub use limits::LimitError;
pub use repository::{EmployeeRepository, Entity, Repository, RepositoryError};
pub use types::{
    Employee, Partner, PartnerPromoCodeLimit, Role, SetPartnerPromoCodeLimitRequest,
};
