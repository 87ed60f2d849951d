//! Composes [`ContentQueryPlan`]s from caller filters.
//!
//! Composition runs in two steps. [`ContentQueryBuilder::build`] performs the
//! lookups a plan depends on (type of an id, the type's schema, corpus size for
//! keyword searches). [`compose_plan`] is the pure remainder and is where the
//! ordering of predicates, joins and pagination is decided.

use time::OffsetDateTime;
use tracing::debug;

use crate::application::repos::{
    ContentStore, ContentTypeRegistry, CustomFieldRegistry, RepoError,
};
use crate::domain::entities::{ContentTypeRecord, CustomFieldDef};
use crate::domain::identifiers::validate_identifier;
use crate::domain::types::{ContentTypeId, FieldStorageKind};

use super::filter::{ContentFilter, FixedColumn, SortDirection, SortKey};
use super::plan::{
    ContentQueryPlan, ExtensionJoin, LatePredicate, OrderKey, Ordering, Page, Predicate,
    Projection, SearchClause, Stage,
};

pub const DEFAULT_FULLTEXT_THRESHOLD: u64 = 10;
pub const DEFAULT_FULLTEXT_FIELD_CAP: usize = 15;

#[derive(Debug, Clone, Copy)]
pub struct QueryTuning {
    /// Types with more rows than this use ranked full-text search.
    pub fulltext_threshold: u64,
    /// Upper bound on custom fields taking part in a full-text match.
    pub fulltext_field_cap: usize,
}

impl Default for QueryTuning {
    fn default() -> Self {
        Self {
            fulltext_threshold: DEFAULT_FULLTEXT_THRESHOLD,
            fulltext_field_cap: DEFAULT_FULLTEXT_FIELD_CAP,
        }
    }
}

/// Content type together with its registered fields and their storage kinds.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub record: ContentTypeRecord,
    pub fields: Vec<(CustomFieldDef, Option<FieldStorageKind>)>,
}

impl ResolvedType {
    pub fn field_defs(&self) -> Vec<CustomFieldDef> {
        self.fields.iter().map(|(field, _)| field.clone()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    FullText,
    Pattern,
    TitleOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Plan(ContentQueryPlan),
    /// The filter references an id or type that does not exist.
    NoResults,
}

pub struct ContentQueryBuilder<'a> {
    store: &'a dyn ContentStore,
    types: &'a dyn ContentTypeRegistry,
    fields: &'a dyn CustomFieldRegistry,
    tuning: QueryTuning,
}

impl<'a> ContentQueryBuilder<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        types: &'a dyn ContentTypeRegistry,
        fields: &'a dyn CustomFieldRegistry,
        tuning: QueryTuning,
    ) -> Self {
        Self {
            store,
            types,
            fields,
            tuning,
        }
    }

    pub async fn build(
        &self,
        filter: &ContentFilter,
        projection: Projection,
        now: OffsetDateTime,
    ) -> Result<PlanOutcome, RepoError> {
        let type_id = match (filter.type_id, filter.id) {
            (Some(type_id), _) => Some(type_id),
            (None, Some(id)) => match self.store.type_of(id).await? {
                Some(type_id) => Some(type_id),
                None => {
                    debug!(content_id = id, "content id has no row; short-circuiting");
                    return Ok(PlanOutcome::NoResults);
                }
            },
            (None, None) => None,
        };

        let resolved = match type_id {
            Some(type_id) => match self.resolve_type(type_id).await? {
                Some(resolved) => Some(resolved),
                None => {
                    debug!(type_id, "content type does not resolve; short-circuiting");
                    return Ok(PlanOutcome::NoResults);
                }
            },
            None => None,
        };

        let strategy = match (filter.keyword(), filter.type_id, resolved.is_some()) {
            (None, _, _) => None,
            (Some(_), Some(type_id), _) => {
                let corpus = self.store.count_of_type(type_id).await?;
                if corpus > self.tuning.fulltext_threshold {
                    Some(SearchStrategy::FullText)
                } else {
                    Some(SearchStrategy::Pattern)
                }
            }
            (Some(_), None, true) => Some(SearchStrategy::Pattern),
            (Some(_), None, false) => Some(SearchStrategy::TitleOnly),
        };

        compose_plan(
            filter,
            resolved.as_ref(),
            strategy,
            projection,
            now,
            self.tuning,
        )
        .map(PlanOutcome::Plan)
    }

    pub async fn resolve_type(
        &self,
        type_id: ContentTypeId,
    ) -> Result<Option<ResolvedType>, RepoError> {
        let Some(record) = self.types.resolve(type_id).await? else {
            return Ok(None);
        };
        let fields = self
            .fields
            .fields_for(record.custom_field_group_id)
            .await?
            .into_iter()
            .map(|field| {
                let kind = self.fields.storage_kind(&field.field_type);
                (field, kind)
            })
            .collect();
        Ok(Some(ResolvedType { record, fields }))
    }
}

/// Build a plan from a filter and the already-resolved lookups.
pub fn compose_plan(
    filter: &ContentFilter,
    resolved: Option<&ResolvedType>,
    strategy: Option<SearchStrategy>,
    projection: Projection,
    now: OffsetDateTime,
    tuning: QueryTuning,
) -> Result<ContentQueryPlan, RepoError> {
    let extension = resolved.map(extension_join).transpose()?;
    let search = search_clause(filter, resolved, strategy, tuning);
    let predicates = fixed_predicates(filter, now);
    let late = late_predicates(filter, resolved);
    let ordering = ordering(filter, resolved, strategy)?;

    let page = match projection {
        Projection::Count => None,
        Projection::Full => filter.limit.map(|limit| Page {
            limit,
            offset: filter.offset.unwrap_or(0),
        }),
    };

    Ok(ContentQueryPlan {
        projection,
        extension,
        search,
        predicates,
        late,
        ordering,
        page,
    })
}

fn extension_join(resolved: &ResolvedType) -> Result<ExtensionJoin, RepoError> {
    let table = validate_identifier(&resolved.record.system_name)
        .map_err(|err| RepoError::invalid_input(err.to_string()))?
        .to_string();
    for (field, _) in &resolved.fields {
        validate_identifier(&field.name).map_err(|err| RepoError::invalid_input(err.to_string()))?;
    }
    Ok(ExtensionJoin {
        table,
        fields: resolved.field_defs(),
    })
}

fn search_clause(
    filter: &ContentFilter,
    resolved: Option<&ResolvedType>,
    strategy: Option<SearchStrategy>,
    tuning: QueryTuning,
) -> Option<SearchClause> {
    let keyword = filter.keyword()?.to_string();
    let strategy = strategy?;

    let clause = match (strategy, resolved) {
        (SearchStrategy::FullText, Some(resolved)) => SearchClause::FullText {
            keyword,
            fields: resolved
                .fields
                .iter()
                .filter(|(_, kind)| kind.is_some_and(FieldStorageKind::is_text_like))
                .take(tuning.fulltext_field_cap)
                .map(|(field, _)| field.name.clone())
                .collect(),
        },
        (SearchStrategy::Pattern, Some(resolved)) => SearchClause::Pattern {
            keyword,
            fields: resolved
                .fields
                .iter()
                .map(|(field, _)| field.name.clone())
                .collect(),
        },
        _ => SearchClause::Pattern {
            keyword,
            fields: Vec::new(),
        },
    };
    Some(clause)
}

fn fixed_predicates(filter: &ContentFilter, now: OffsetDateTime) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    if let Some(start) = filter.start_date {
        predicates.push(Predicate::CreatedFrom(start));
    }
    if let Some(end) = filter.end_date {
        predicates.push(Predicate::CreatedUntil(end));
    }
    if let Some(type_id) = filter.type_id {
        predicates.push(Predicate::TypeIs(type_id));
    }
    if let Some(id) = filter.id {
        predicates.push(Predicate::IdIs(id));
    }
    if let Some(is_standard) = filter.is_standard {
        predicates.push(Predicate::IsStandard(is_standard));
    }
    if let Some(title) = filter.title.as_ref() {
        predicates.push(Predicate::TitleContains(title.clone()));
    }
    if let Some(author) = filter.author.as_ref() {
        predicates.push(Predicate::AuthorIn(author.to_vec()));
    }
    if let Some(topic) = filter.topic.as_ref() {
        predicates.push(Predicate::TopicIn(topic.to_vec()));
    }
    if !filter.allow_future {
        predicates.push(Predicate::PublishedBefore(now));
    }

    predicates
}

fn late_predicates(filter: &ContentFilter, resolved: Option<&ResolvedType>) -> Vec<LatePredicate> {
    let mut late = Vec::new();

    if let Some(author_like) = filter.author_like.as_ref() {
        late.push(LatePredicate::AuthorLike(author_like.clone()));
    }

    if let Some(resolved) = resolved {
        let table = resolved.record.system_name.as_str();
        for (field, _) in &resolved.fields {
            let Some(value) = filter.field_filter(table, &field.name) else {
                continue;
            };
            if value.is_empty() {
                late.push(LatePredicate::FieldBlank {
                    field: field.name.clone(),
                });
            } else {
                late.push(LatePredicate::FieldContains {
                    field: field.name.clone(),
                    value: value.to_string(),
                });
            }
        }
    }

    late
}

fn ordering(
    filter: &ContentFilter,
    resolved: Option<&ResolvedType>,
    strategy: Option<SearchStrategy>,
) -> Result<Ordering, RepoError> {
    if filter.sort_dir == Some(SortDirection::Random) {
        return Ok(Ordering {
            key: OrderKey::Random,
            descending: false,
            stage: Stage::Inner,
        });
    }

    let ranked = strategy == Some(SearchStrategy::FullText);
    let requested = match filter.sort.clone() {
        Some(SortKey::Relevance) if !ranked => None,
        other => other,
    };
    let key = match requested {
        Some(key) => key,
        None if ranked => SortKey::Relevance,
        None => SortKey::Fixed(FixedColumn::Id),
    };
    let descending = filter.sort_dir != Some(SortDirection::Asc);

    let (key, stage) = match key {
        SortKey::Fixed(column) => (OrderKey::Fixed(column), Stage::Inner),
        SortKey::Relevance => (OrderKey::Relevance, Stage::Outer),
        SortKey::AuthorUsername => (OrderKey::AuthorUsername, Stage::Outer),
        SortKey::Field(name) => {
            if !resolved.is_some_and(|resolved| resolved.has_field(&name)) {
                return Err(RepoError::invalid_input(format!(
                    "cannot sort by unknown field `{name}`"
                )));
            }
            (OrderKey::Field(name), Stage::Outer)
        }
    };

    Ok(Ordering {
        key,
        descending,
        stage,
    })
}
