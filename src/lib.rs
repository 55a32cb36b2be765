//! Treants: Member Collections and Dataset Aggregation
//!
//! Ordered collections of filesystem-backed members (treants, sims, groups) with
//! lazy, cached resolution of member handles and aggregation of the named datasets
//! each member stores.

pub mod aggregate;
pub mod collection;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod member;
pub mod membership;
pub mod resolver;
pub mod types;

pub use aggregate::{Aggregated, DatasetAggregator, DuplicateNamePolicy, IndexBy, IndexKey, KeyMode};
pub use collection::{MemberCollection, MemberSource};
pub use error::{CollectionError, StorageError};
pub use member::Member;
pub use types::{MemberId, MemberKind, MemberRecord};
