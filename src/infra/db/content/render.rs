//! Renders [`ContentQueryPlan`]s into Postgres SQL.
//!
//! The inner stage reads `content c` (plus `se` when custom fields are
//! searched) and is wrapped as `i` by the outer stage, which joins users `u`,
//! content types `ct`, links `l` and the extension table `ext`.

use sqlx::{Postgres, QueryBuilder};

use crate::application::query::{
    ContentQueryPlan, FixedColumn, LatePredicate, OrderKey, Ordering, Page, Predicate,
    SearchClause, Stage,
};
use crate::domain::identifiers::quote_identifier;

use super::super::util::like_pattern;

const INNER_COLUMNS: &str = "c.id, c.link_id, c.type_id, c.is_standard, c.title, c.author_id, \
     c.created_at, c.modified_at, c.hits, c.privileges";

const OUTER_COLUMNS: &str = "i.id, i.link_id, i.type_id, i.is_standard, i.title, i.author_id, \
     i.created_at, i.modified_at, i.hits, i.privileges, i.relevance, \
     u.username AS author_username, u.first_name AS author_first_name, \
     u.last_name AS author_last_name, u.email AS author_email, \
     ct.display_name AS type_name, ct.template AS template, l.url_path AS url_path, \
     ARRAY(SELECT tm.topic_id FROM topic_maps tm WHERE tm.content_id = i.id ORDER BY tm.topic_id) AS topics";

/// Full row query for a plan.
pub fn render_select(plan: &ContentQueryPlan) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(OUTER_COLUMNS);
    if plan.needs_extension_join() {
        qb.push(", to_jsonb(ext) AS extension");
    } else {
        qb.push(", NULL::jsonb AS extension");
    }
    qb.push(" FROM (");
    push_inner(&mut qb, plan);
    qb.push(") i");
    qb.push(" LEFT JOIN users u ON u.id = i.author_id");
    qb.push(" LEFT JOIN content_types ct ON ct.id = i.type_id");
    qb.push(" LEFT JOIN links l ON l.id = i.link_id");
    push_extension_join(&mut qb, plan);
    push_late(&mut qb, plan);

    qb.push(" ORDER BY ");
    push_order(&mut qb, &plan.ordering, "i");
    if let Some(page) = plan.outer_page() {
        push_page(&mut qb, page);
    }
    qb
}

/// `COUNT(*)` over the same row set `render_select` returns, without pagination.
pub fn render_count(plan: &ContentQueryPlan) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM (");
    push_inner(&mut qb, plan);
    qb.push(") i");
    if plan.needs_users_join() {
        qb.push(" LEFT JOIN users u ON u.id = i.author_id");
    }
    push_extension_join(&mut qb, plan);
    push_late(&mut qb, plan);
    qb
}

fn push_inner(qb: &mut QueryBuilder<'static, Postgres>, plan: &ContentQueryPlan) {
    let counting = plan.is_counting();
    let searches_extension = plan.searches_extension();

    qb.push("SELECT ");
    if counting {
        qb.push("c.id, c.author_id");
    } else {
        qb.push(INNER_COLUMNS);
        qb.push(", ");
        push_relevance(qb, plan.search.as_ref(), searches_extension);
        qb.push(" AS relevance");
    }
    qb.push(" FROM content c");
    if searches_extension {
        if let Some(join) = &plan.extension {
            qb.push(" LEFT JOIN ");
            qb.push(quote_identifier(&join.table));
            qb.push(" se ON se.content_id = c.id");
        }
    }

    qb.push(" WHERE 1=1");
    for predicate in &plan.predicates {
        push_predicate(qb, predicate);
    }
    if let Some(search) = &plan.search {
        qb.push(" AND ");
        push_search(qb, search, searches_extension);
    }

    if !counting && plan.ordering.stage == Stage::Inner {
        qb.push(" ORDER BY ");
        push_order(qb, &plan.ordering, "c");
        if let Some(page) = plan.inner_page() {
            push_page(qb, page);
        }
    }
}

fn push_predicate(qb: &mut QueryBuilder<'static, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::CreatedFrom(start) => {
            qb.push(" AND c.created_at >= ");
            qb.push_bind(*start);
        }
        Predicate::CreatedUntil(end) => {
            qb.push(" AND c.created_at <= ");
            qb.push_bind(*end);
        }
        Predicate::TypeIs(type_id) => {
            qb.push(" AND c.type_id = ");
            qb.push_bind(*type_id);
        }
        Predicate::IdIs(id) => {
            qb.push(" AND c.id = ");
            qb.push_bind(*id);
        }
        Predicate::IsStandard(flag) => {
            qb.push(" AND c.is_standard = ");
            qb.push_bind(*flag);
        }
        Predicate::TitleContains(title) => {
            qb.push(" AND c.title ILIKE ");
            qb.push_bind(like_pattern(title));
        }
        Predicate::AuthorIn(authors) => {
            qb.push(" AND c.author_id = ANY(");
            qb.push_bind(authors.clone());
            qb.push(")");
        }
        Predicate::TopicIn(topics) => {
            qb.push(
                " AND EXISTS (SELECT 1 FROM topic_maps tm WHERE tm.content_id = c.id AND tm.topic_id = ANY(",
            );
            qb.push_bind(topics.clone());
            qb.push("))");
        }
        Predicate::PublishedBefore(now) => {
            qb.push(" AND c.created_at <= ");
            qb.push_bind(*now);
        }
    }
}

/// `to_tsvector` document over the searched custom fields of `se`.
fn push_document(qb: &mut QueryBuilder<'static, Postgres>, fields: &[String]) {
    qb.push("to_tsvector('simple', concat_ws(' '");
    for field in fields {
        qb.push(", se.");
        qb.push(quote_identifier(field));
        qb.push("::text");
    }
    qb.push("))");
}

fn push_relevance(
    qb: &mut QueryBuilder<'static, Postgres>,
    search: Option<&SearchClause>,
    searches_extension: bool,
) {
    match search {
        Some(SearchClause::FullText { keyword, fields }) if searches_extension => {
            qb.push("ts_rank(");
            push_document(qb, fields);
            qb.push(", plainto_tsquery('simple', ");
            qb.push_bind(keyword.clone());
            qb.push("))::float8");
        }
        Some(SearchClause::FullText { .. }) => {
            qb.push("0::float8");
        }
        _ => {
            qb.push("NULL::float8");
        }
    }
}

fn push_search(
    qb: &mut QueryBuilder<'static, Postgres>,
    search: &SearchClause,
    searches_extension: bool,
) {
    let pattern = like_pattern(search.keyword());
    match search {
        SearchClause::FullText { keyword, fields } if searches_extension => {
            qb.push("(");
            push_document(qb, fields);
            qb.push(" @@ plainto_tsquery('simple', ");
            qb.push_bind(keyword.clone());
            qb.push(") OR c.title ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        SearchClause::Pattern { fields, .. } if searches_extension => {
            qb.push("(c.title ILIKE ");
            qb.push_bind(pattern.clone());
            for field in fields {
                qb.push(" OR se.");
                qb.push(quote_identifier(field));
                qb.push("::text ILIKE ");
                qb.push_bind(pattern.clone());
            }
            qb.push(")");
        }
        _ => {
            qb.push("c.title ILIKE ");
            qb.push_bind(pattern);
        }
    }
}

fn push_extension_join(qb: &mut QueryBuilder<'static, Postgres>, plan: &ContentQueryPlan) {
    if !plan.needs_extension_join() {
        return;
    }
    if let Some(join) = &plan.extension {
        qb.push(" LEFT JOIN ");
        qb.push(quote_identifier(&join.table));
        qb.push(" ext ON ext.content_id = i.id");
    }
}

fn push_late(qb: &mut QueryBuilder<'static, Postgres>, plan: &ContentQueryPlan) {
    if plan.late.is_empty() {
        return;
    }
    qb.push(" WHERE 1=1");
    for late in &plan.late {
        match late {
            LatePredicate::AuthorLike(pattern) => {
                qb.push(" AND u.username ILIKE ");
                qb.push_bind(like_pattern(pattern));
            }
            LatePredicate::FieldContains { field, value } => {
                qb.push(" AND ext.");
                qb.push(quote_identifier(field));
                qb.push("::text ILIKE ");
                qb.push_bind(like_pattern(value));
            }
            LatePredicate::FieldBlank { field } => {
                let column = quote_identifier(field);
                qb.push(" AND (ext.");
                qb.push(&column);
                qb.push(" IS NULL OR ext.");
                qb.push(&column);
                qb.push("::text = '')");
            }
        }
    }
}

/// Order clause; `alias` is `c` inside the inner stage and `i` outside it.
fn push_order(qb: &mut QueryBuilder<'static, Postgres>, ordering: &Ordering, alias: &str) {
    let direction = if ordering.descending { "DESC" } else { "ASC" };
    match &ordering.key {
        OrderKey::Random => {
            qb.push("random()");
            return;
        }
        OrderKey::Fixed(column) => {
            qb.push(format!("{alias}.{} {direction}", column.column()));
        }
        OrderKey::Relevance => {
            qb.push(format!("{alias}.relevance {direction}"));
        }
        OrderKey::AuthorUsername => {
            qb.push(format!("u.username {direction}"));
        }
        OrderKey::Field(field) => {
            qb.push(format!("ext.{} {direction}", quote_identifier(field)));
        }
    }
    if ordering.key != OrderKey::Fixed(FixedColumn::Id) {
        qb.push(format!(", {alias}.id {direction}"));
    }
}

fn push_page(qb: &mut QueryBuilder<'static, Postgres>, page: Page) {
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(page.limit));
    qb.push(" OFFSET ");
    qb.push_bind(i64::from(page.offset));
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::query::{ExtensionJoin, Projection};
    use crate::domain::entities::CustomFieldDef;

    fn plan() -> ContentQueryPlan {
        ContentQueryPlan {
            projection: Projection::Full,
            extension: Some(ExtensionJoin {
                table: "articles".into(),
                fields: vec![
                    CustomFieldDef {
                        name: "body".into(),
                        field_type: "textarea".into(),
                    },
                    CustomFieldDef {
                        name: "rating".into(),
                        field_type: "number".into(),
                    },
                ],
            }),
            search: None,
            predicates: vec![
                Predicate::TypeIs(1),
                Predicate::PublishedBefore(datetime!(2024-01-01 00:00 UTC)),
            ],
            late: vec![],
            ordering: Ordering::by_id_desc(),
            page: Some(Page {
                limit: 10,
                offset: 20,
            }),
        }
    }

    #[test]
    fn fixed_sort_paginates_inside_the_subquery() {
        let sql = render_select(&plan()).sql().to_string();

        assert!(sql.contains(
            "FROM content c WHERE 1=1 AND c.type_id = $1 AND c.created_at <= $2 \
             ORDER BY c.id DESC LIMIT $3 OFFSET $4) i"
        ));
        assert!(sql.contains("LEFT JOIN \"articles\" ext ON ext.content_id = i.id"));
        assert!(sql.contains("to_jsonb(ext) AS extension"));
        assert!(sql.ends_with("ORDER BY i.id DESC"));
    }

    #[test]
    fn field_sort_paginates_after_the_join() {
        let mut plan = plan();
        plan.ordering = Ordering {
            key: OrderKey::Field("rating".into()),
            descending: false,
            stage: Stage::Outer,
        };
        let sql = render_select(&plan).sql().to_string();

        assert!(sql.contains("c.created_at <= $2) i"));
        assert!(sql.ends_with("ORDER BY ext.\"rating\" ASC, i.id ASC LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn topics_use_exists_to_avoid_duplicates() {
        let mut plan = plan();
        plan.predicates.push(Predicate::TopicIn(vec![3, 4]));
        let sql = render_select(&plan).sql().to_string();

        assert!(sql.contains(
            "EXISTS (SELECT 1 FROM topic_maps tm WHERE tm.content_id = c.id AND tm.topic_id = ANY($3))"
        ));
        assert!(!sql.contains("JOIN topic_maps"));
    }

    #[test]
    fn fulltext_search_ranks_and_falls_back_to_title() {
        let mut plan = plan();
        plan.search = Some(SearchClause::FullText {
            keyword: "rust".into(),
            fields: vec!["body".into()],
        });
        plan.ordering = Ordering {
            key: OrderKey::Relevance,
            descending: true,
            stage: Stage::Outer,
        };
        let sql = render_select(&plan).sql().to_string();

        assert!(sql.contains(
            "ts_rank(to_tsvector('simple', concat_ws(' ', se.\"body\"::text)), plainto_tsquery('simple', $1))::float8 AS relevance"
        ));
        assert!(sql.contains("LEFT JOIN \"articles\" se ON se.content_id = c.id"));
        assert!(sql.contains("@@ plainto_tsquery('simple', $4) OR c.title ILIKE $5)"));
        assert!(sql.contains("ORDER BY i.relevance DESC, i.id DESC LIMIT $6 OFFSET $7"));
    }

    #[test]
    fn pattern_search_covers_title_and_every_field() {
        let mut plan = plan();
        plan.search = Some(SearchClause::Pattern {
            keyword: "50%".into(),
            fields: vec!["body".into(), "rating".into()],
        });
        let sql = render_select(&plan).sql().to_string();

        assert!(sql.contains(
            "(c.title ILIKE $3 OR se.\"body\"::text ILIKE $4 OR se.\"rating\"::text ILIKE $5)"
        ));
        assert!(sql.contains("NULL::float8 AS relevance"));
    }

    #[test]
    fn count_skips_joins_it_does_not_need() {
        let mut plan = plan();
        plan.projection = Projection::Count;
        plan.page = None;
        let sql = render_count(&plan).sql().to_string();

        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM (SELECT c.id, c.author_id FROM content c WHERE 1=1 \
             AND c.type_id = $1 AND c.created_at <= $2) i"
        );
    }

    #[test]
    fn count_joins_for_late_filters() {
        let mut plan = plan();
        plan.projection = Projection::Count;
        plan.page = None;
        plan.late = vec![
            LatePredicate::AuthorLike("ada".into()),
            LatePredicate::FieldBlank {
                field: "body".into(),
            },
        ];
        let sql = render_count(&plan).sql().to_string();

        assert!(sql.contains("LEFT JOIN users u ON u.id = i.author_id"));
        assert!(sql.contains("LEFT JOIN \"articles\" ext ON ext.content_id = i.id"));
        assert!(sql.ends_with(
            "WHERE 1=1 AND u.username ILIKE $3 AND (ext.\"body\" IS NULL OR ext.\"body\"::text = '')"
        ));
    }

    #[test]
    fn random_order_is_applied_in_both_stages() {
        let mut plan = plan();
        plan.ordering = Ordering {
            key: OrderKey::Random,
            descending: false,
            stage: Stage::Inner,
        };
        plan.predicates.retain(|predicate| matches!(predicate, Predicate::TypeIs(_)));
        let sql = render_select(&plan).sql().to_string();

        assert!(sql.contains("ORDER BY random() LIMIT $2 OFFSET $3) i"));
        assert!(sql.ends_with("ORDER BY random()"));
    }
}
