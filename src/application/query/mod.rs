//! Dynamic content query composition.

mod builder;
mod filter;
mod plan;

pub use builder::{
    ContentQueryBuilder, DEFAULT_FULLTEXT_FIELD_CAP, DEFAULT_FULLTEXT_THRESHOLD, PlanOutcome,
    QueryTuning, ResolvedType, SearchStrategy, compose_plan,
};
pub use filter::{
    ContentFilter, FilterParseError, FixedColumn, OneOrMany, SortDirection, SortKey,
};
pub use plan::{
    ContentQueryPlan, ExtensionJoin, LatePredicate, OrderKey, Ordering, Page, Predicate,
    Projection, SearchClause, Stage,
};
