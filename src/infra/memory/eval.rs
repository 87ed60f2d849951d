//! Two-stage evaluation of [`ContentQueryPlan`]s over [`MemoryState`].

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::application::query::{
    ContentQueryPlan, FixedColumn, LatePredicate, OrderKey, Page, Predicate, SearchClause, Stage,
};
use crate::application::repos::{ContentRow, RepoError};
use crate::domain::types::ContentId;

use super::{MemoryState, StoredContent};

/// Inner-stage candidate: fixed row plus search relevance.
struct Candidate<'a> {
    content: &'a StoredContent,
    relevance: Option<f64>,
}

pub(super) fn evaluate(
    state: &MemoryState,
    plan: &ContentQueryPlan,
) -> Result<Vec<ContentRow>, RepoError> {
    let touches_extension = plan.searches_extension() || plan.needs_extension_join();
    let extension = match &plan.extension {
        Some(join) if touches_extension => Some(state.tables.get(&join.table).ok_or_else(|| {
            RepoError::from_persistence(format!("relation \"{}\" does not exist", join.table))
        })?),
        _ => None,
    };
    let ext_row = |id: ContentId| extension.and_then(|rows| rows.get(&id));

    let mut inner: Vec<Candidate<'_>> = Vec::new();
    for content in state.contents.values() {
        if !plan.predicates.iter().all(|predicate| matches(predicate, content)) {
            continue;
        }
        let relevance = match &plan.search {
            None => None,
            Some(search) => match search_score(search, content, ext_row(content.id)) {
                Some(score) => search.is_ranked().then_some(score),
                None => continue,
            },
        };
        inner.push(Candidate { content, relevance });
    }

    if plan.ordering.stage == Stage::Inner {
        sort_inner(&mut inner, &plan.ordering.key, plan.ordering.descending);
        apply_page(&mut inner, plan.inner_page());
    }

    let mut rows: Vec<ContentRow> = Vec::with_capacity(inner.len());
    for candidate in inner {
        let content = candidate.content;
        let user = state.users.get(&content.author_id);
        let ext = ext_row(content.id);

        let passes = plan.late.iter().all(|late| match late {
            LatePredicate::AuthorLike(pattern) => {
                user.is_some_and(|user| contains_ci(&user.username, pattern))
            }
            LatePredicate::FieldContains { field, value } => ext
                .and_then(|row| row.get(field))
                .and_then(value_text)
                .is_some_and(|text| contains_ci(&text, value)),
            LatePredicate::FieldBlank { field } => ext
                .and_then(|row| row.get(field))
                .and_then(value_text)
                .is_none_or(|text| text.is_empty()),
        });
        if !passes {
            continue;
        }

        let content_type = state.types.get(&content.type_id);
        let link = content.link_id.and_then(|id| state.links.get(&id));
        let extension = if plan.needs_extension_join() {
            ext.cloned().unwrap_or_default()
        } else {
            Map::new()
        };

        rows.push(ContentRow {
            id: content.id,
            link_id: content.link_id,
            type_id: content.type_id,
            is_standard: content.is_standard,
            title: content.title.clone(),
            author_id: content.author_id,
            created_at: content.created_at,
            modified_at: content.modified_at,
            hits: content.hits,
            privileges: content.privileges.iter().copied().collect(),
            topics: content.topics.iter().copied().collect(),
            author_username: user.map(|user| user.username.clone()),
            author_first_name: user.map(|user| user.first_name.clone()),
            author_last_name: user.map(|user| user.last_name.clone()),
            author_email: user.map(|user| user.email.clone()),
            type_name: content_type.map(|record| record.display_name.clone()),
            template: content_type.map(|record| record.template.clone()),
            url_path: link.map(|link| link.url_path.clone()),
            relevance: candidate.relevance,
            extension,
        });
    }

    if plan.ordering.stage == Stage::Outer {
        sort_outer(&mut rows, &plan.ordering.key, plan.ordering.descending);
        apply_page(&mut rows, plan.outer_page());
    }

    Ok(rows)
}

fn matches(predicate: &Predicate, content: &StoredContent) -> bool {
    match predicate {
        Predicate::CreatedFrom(start) => content.created_at >= *start,
        Predicate::CreatedUntil(end) => content.created_at <= *end,
        Predicate::TypeIs(type_id) => content.type_id == *type_id,
        Predicate::IdIs(id) => content.id == *id,
        Predicate::IsStandard(flag) => content.is_standard == *flag,
        Predicate::TitleContains(title) => contains_ci(&content.title, title),
        Predicate::AuthorIn(authors) => authors.contains(&content.author_id),
        Predicate::TopicIn(topics) => topics.iter().any(|topic| content.topics.contains(topic)),
        Predicate::PublishedBefore(now) => content.created_at <= *now,
    }
}

/// `None` when the row does not match; otherwise its rank (always 0 for pattern matches).
fn search_score(
    search: &SearchClause,
    content: &StoredContent,
    ext: Option<&Map<String, Value>>,
) -> Option<f64> {
    let keyword = search.keyword();
    let field_texts: Vec<String> = search
        .fields()
        .iter()
        .filter_map(|field| ext.and_then(|row| row.get(field)).and_then(value_text))
        .collect();

    match search {
        SearchClause::Pattern { .. } => {
            let hit = contains_ci(&content.title, keyword)
                || field_texts.iter().any(|text| contains_ci(text, keyword));
            hit.then_some(0.0)
        }
        SearchClause::FullText { .. } => {
            let rank = text_rank(&field_texts.join(" "), keyword);
            if rank > 0.0 || contains_ci(&content.title, keyword) {
                Some(rank)
            } else {
                None
            }
        }
    }
}

/// Term-frequency rank; zero unless every query term occurs in the document.
fn text_rank(document: &str, query: &str) -> f64 {
    let words = tokenize(document);
    if words.is_empty() {
        return 0.0;
    }
    let terms = tokenize(query);
    if terms.is_empty() {
        return 0.0;
    }
    let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for word in &words {
        *frequency.entry(word.as_str()).or_default() += 1;
    }
    let mut hits = 0usize;
    for term in &terms {
        match frequency.get(term.as_str()) {
            Some(count) => hits += count,
            None => return 0.0,
        }
    }
    hits as f64 / (1.0 + words.len() as f64).ln().max(1.0)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn fixed_cmp(column: FixedColumn, left: &StoredContent, right: &StoredContent) -> CmpOrdering {
    match column {
        FixedColumn::Id => left.id.cmp(&right.id),
        FixedColumn::Date => left.created_at.cmp(&right.created_at),
        FixedColumn::Modified => left.modified_at.cmp(&right.modified_at),
        FixedColumn::Title => left.title.cmp(&right.title),
        FixedColumn::Hits => left.hits.cmp(&right.hits),
        FixedColumn::Author => left.author_id.cmp(&right.author_id),
        FixedColumn::Type => left.type_id.cmp(&right.type_id),
        FixedColumn::IsStandard => left.is_standard.cmp(&right.is_standard),
    }
}

fn directed(ordering: CmpOrdering, descending: bool) -> CmpOrdering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn sort_inner(candidates: &mut [Candidate<'_>], key: &OrderKey, descending: bool) {
    match key {
        OrderKey::Random => candidates.sort_by_cached_key(|_| Uuid::new_v4()),
        OrderKey::Fixed(column) => candidates.sort_by(|left, right| {
            directed(
                fixed_cmp(*column, left.content, right.content)
                    .then(left.content.id.cmp(&right.content.id)),
                descending,
            )
        }),
        OrderKey::Relevance | OrderKey::AuthorUsername | OrderKey::Field(_) => {}
    }
}

fn sort_outer(rows: &mut [ContentRow], key: &OrderKey, descending: bool) {
    match key {
        OrderKey::Relevance => rows.sort_by(|left, right| {
            let rank = left
                .relevance
                .unwrap_or(0.0)
                .total_cmp(&right.relevance.unwrap_or(0.0));
            directed(rank.then(left.id.cmp(&right.id)), descending)
        }),
        OrderKey::AuthorUsername => rows.sort_by(|left, right| {
            directed(
                nulls_last(
                    left.author_username.as_deref(),
                    right.author_username.as_deref(),
                )
                .then(left.id.cmp(&right.id)),
                descending,
            )
        }),
        OrderKey::Field(field) => rows.sort_by(|left, right| {
            directed(
                value_cmp(left.extension.get(field), right.extension.get(field))
                    .then(left.id.cmp(&right.id)),
                descending,
            )
        }),
        OrderKey::Fixed(_) | OrderKey::Random => {}
    }
}

/// Ascending order with nulls after every value, as Postgres sorts by default.
fn nulls_last<T: Ord>(left: Option<T>, right: Option<T>) -> CmpOrdering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => CmpOrdering::Less,
        (None, Some(_)) => CmpOrdering::Greater,
        (None, None) => CmpOrdering::Equal,
    }
}

fn value_cmp(left: Option<&Value>, right: Option<&Value>) -> CmpOrdering {
    let left = left.filter(|value| !value.is_null());
    let right = right.filter(|value| !value.is_null());
    match (left, right) {
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&right.as_f64().unwrap_or(0.0)),
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (left, right) => nulls_last(left.and_then(value_text), right.and_then(value_text)),
    }
}

fn apply_page<T>(items: &mut Vec<T>, page: Option<Page>) {
    let Some(page) = page else {
        return;
    };
    let offset = (page.offset as usize).min(items.len());
    items.drain(..offset);
    items.truncate(page.limit as usize);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rank_requires_every_term() {
        assert!(text_rank("rust async runtime", "async rust") > 0.0);
        assert_eq!(text_rank("rust async runtime", "async python"), 0.0);
        assert_eq!(text_rank("", "rust"), 0.0);
    }

    #[test]
    fn value_ordering_puts_nulls_last_and_compares_numbers() {
        assert_eq!(value_cmp(Some(&json!(2)), Some(&json!(10))), CmpOrdering::Less);
        assert_eq!(value_cmp(Some(&json!("b")), Some(&json!("a"))), CmpOrdering::Greater);
        assert_eq!(value_cmp(None, Some(&json!("a"))), CmpOrdering::Greater);
        assert_eq!(value_cmp(Some(&Value::Null), None), CmpOrdering::Equal);
    }

    #[test]
    fn pages_clamp_to_available_items() {
        let mut items = vec![1, 2, 3, 4, 5];
        apply_page(&mut items, Some(Page { limit: 2, offset: 1 }));
        assert_eq!(items, vec![2, 3]);

        let mut items = vec![1, 2];
        apply_page(&mut items, Some(Page { limit: 5, offset: 4 }));
        assert!(items.is_empty());
    }
}
