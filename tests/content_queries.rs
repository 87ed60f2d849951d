//! Query, count and search behaviour of the content service over the in-memory backend.

mod common;

use std::collections::BTreeSet;

use folio::application::content::CreateContent;
use folio::application::query::{ContentFilter, OneOrMany, SortDirection, SortKey};
use folio::application::repos::{ContentStore, InsertContentParams};
use serde_json::json;
use time::{Duration, OffsetDateTime};

use common::{ARTICLES, WIDE, WIDE_FIELDS, article, fixture, wide_field, with_field};

fn days_ago(days: i64) -> Option<OffsetDateTime> {
    Some(OffsetDateTime::now_utc() - Duration::days(days))
}

#[tokio::test]
async fn count_matches_query_length() {
    let fx = fixture();
    for title in ["One", "Two", "Three"] {
        fx.create(article(title)).await;
    }

    let filter = ContentFilter::of_type(ARTICLES);
    let rows = fx.service.query(&filter).await.expect("query");
    assert_eq!(rows.len(), 3);
    assert_eq!(fx.service.count(&filter).await.expect("count"), 3);

    let empty = ContentFilter {
        title: Some("nothing like this".to_string()),
        ..ContentFilter::of_type(ARTICLES)
    };
    assert!(fx.service.query(&empty).await.expect("query").is_empty());
    assert_eq!(fx.service.count(&empty).await.expect("count"), 0);
}

#[tokio::test]
async fn counting_mode_returns_a_number() {
    let fx = fixture();
    fx.create(article("Counted")).await;

    let filter = ContentFilter::of_type(ARTICLES);
    let outcome = fx.service.query_with(&filter, true).await.expect("count");
    assert_eq!(outcome.count(), 1);
    assert!(outcome.into_contents().is_empty());
}

#[tokio::test]
async fn unknown_type_yields_no_results() {
    let fx = fixture();
    let filter = ContentFilter::of_type(99);
    assert!(fx.service.query(&filter).await.expect("query").is_empty());
    assert_eq!(fx.service.count(&filter).await.expect("count"), 0);
}

#[tokio::test]
async fn small_corpus_uses_case_insensitive_substring_search() {
    let fx = fixture();
    let hit = fx
        .create(with_field(article("Crustaceans"), "body", "Meet Ferris the crab"))
        .await;
    fx.create(with_field(article("Snakes"), "body", "Nothing to see"))
        .await;
    let titled = fx.create(article("Ferris wheels")).await;

    let filter = ContentFilter {
        keyword: Some("FERRIS".to_string()),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&filter).await.expect("query");
    let ids: BTreeSet<_> = rows.iter().map(|row| row.id).collect();

    assert_eq!(ids, BTreeSet::from([hit, titled]));
    assert!(rows.iter().all(|row| row.relevance.is_none()));
    assert_eq!(fx.service.count(&filter).await.expect("count"), 2);
}

#[tokio::test]
async fn large_corpus_uses_ranked_full_text_search() {
    let fx = fixture();
    for index in 0..11 {
        fx.create(with_field(
            article(&format!("Filler {index}")),
            "body",
            "plain words only",
        ))
        .await;
    }
    let strong = fx
        .create(with_field(article("Strong"), "body", "crab crab crab"))
        .await;
    let weak = fx
        .create(with_field(
            article("Weak"),
            "body",
            "a crab among many other quite ordinary words here",
        ))
        .await;

    let filter = ContentFilter {
        keyword: Some("crab".to_string()),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&filter).await.expect("query");

    assert_eq!(
        rows.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![strong, weak]
    );
    assert!(rows.iter().all(|row| row.relevance.is_some_and(|score| score > 0.0)));
    assert_eq!(fx.service.count(&filter).await.expect("count"), 2);
}

#[tokio::test]
async fn relevance_sort_is_dropped_for_substring_search() {
    let fx = fixture();
    let older = fx.create(article("Crab one")).await;
    let newer = fx.create(article("Crab two")).await;

    let filter = ContentFilter {
        keyword: Some("crab".to_string()),
        sort: Some(SortKey::Relevance),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&filter).await.expect("query");

    assert_eq!(
        rows.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![newer, older]
    );
}

fn wide_item(title: &str) -> CreateContent {
    CreateContent {
        title: Some(title.to_string()),
        ..CreateContent::new(WIDE, 1)
    }
}

#[tokio::test]
async fn full_text_search_ignores_fields_past_the_cap() {
    let fx = fixture();
    for index in 0..11 {
        fx.create(wide_item(&format!("Row {index}"))).await;
    }
    let last = wide_field(WIDE_FIELDS - 1);
    fx.create(with_field(wide_item("Tail"), &last, "needle")).await;
    let first = wide_field(0);
    let found = fx.create(with_field(wide_item("Head"), &first, "needle")).await;

    let filter = ContentFilter {
        keyword: Some("needle".to_string()),
        ..ContentFilter::of_type(WIDE)
    };
    let rows = fx.service.query(&filter).await.expect("query");

    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![found]);
}

#[tokio::test]
async fn substring_search_covers_every_field() {
    let fx = fixture();
    let last = wide_field(WIDE_FIELDS - 1);
    let found = fx.create(with_field(wide_item("Tail"), &last, "needle")).await;

    let filter = ContentFilter {
        keyword: Some("needle".to_string()),
        ..ContentFilter::of_type(WIDE)
    };
    let rows = fx.service.query(&filter).await.expect("query");

    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![found]);
}

#[tokio::test]
async fn pagination_over_fixed_sort_returns_requested_window() {
    let fx = fixture();
    let mut ids = Vec::new();
    for day in (1..=5).rev() {
        let command = CreateContent {
            publish_at: days_ago(day),
            ..article(&format!("Day {day}"))
        };
        ids.push(fx.create(command).await);
    }

    let page = ContentFilter {
        sort: Some("date".parse().expect("sort key")),
        sort_dir: Some(SortDirection::Asc),
        limit: Some(2),
        offset: Some(1),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&page).await.expect("query");
    assert_eq!(
        rows.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![ids[1], ids[2]]
    );

    let oversized = ContentFilter {
        limit: Some(50),
        offset: None,
        ..page
    };
    assert_eq!(fx.service.query(&oversized).await.expect("query").len(), 5);
}

#[tokio::test]
async fn pagination_over_custom_field_sort_applies_after_join() {
    let fx = fixture();
    let mut by_rating = Vec::new();
    for rating in [3, 1, 5, 2, 4] {
        let id = fx
            .create(with_field(article(&format!("Rated {rating}")), "rating", rating))
            .await;
        by_rating.push((rating, id));
    }
    by_rating.sort();

    let filter = ContentFilter {
        sort: Some(SortKey::Field("rating".to_string())),
        sort_dir: Some(SortDirection::Desc),
        limit: Some(3),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&filter).await.expect("query");

    assert_eq!(
        rows.iter().map(|row| row.field("rating").cloned()).collect::<Vec<_>>(),
        vec![Some(json!(5)), Some(json!(4)), Some(json!(3))]
    );
    assert_eq!(rows[0].id, by_rating[4].1);
}

#[tokio::test]
async fn sorting_by_unregistered_field_is_rejected() {
    let fx = fixture();
    fx.create(article("Anything")).await;

    let filter = ContentFilter {
        sort: Some(SortKey::Field("colour".to_string())),
        ..ContentFilter::of_type(ARTICLES)
    };
    assert!(fx.service.query(&filter).await.is_err());
}

async fn insert_behind_the_cache(fx: &common::Fixture) {
    let now = OffsetDateTime::now_utc();
    fx.backend
        .insert_content(InsertContentParams {
            type_id: ARTICLES,
            extension_table: "articles".to_string(),
            link_id: None,
            is_standard: false,
            title: String::new(),
            author_id: 1,
            privileges: BTreeSet::new(),
            topics: BTreeSet::new(),
            created_at: now - Duration::hours(1),
            modified_at: now,
            fields: Default::default(),
        })
        .await
        .expect("direct insert");
}

#[tokio::test]
async fn list_results_are_cached_until_a_write() {
    let fx = fixture();
    fx.create(article("Cached")).await;
    let filter = ContentFilter::of_type(ARTICLES);
    assert_eq!(fx.service.query(&filter).await.expect("query").len(), 1);

    insert_behind_the_cache(&fx).await;
    assert_eq!(fx.service.query(&filter).await.expect("query").len(), 1);
    assert_eq!(fx.service.count(&filter).await.expect("count"), 2);

    fx.create(article("Invalidates")).await;
    assert_eq!(fx.service.query(&filter).await.expect("query").len(), 3);
}

#[tokio::test]
async fn random_order_is_never_cached() {
    let fx = fixture();
    fx.create(article("Shuffled")).await;
    let filter = ContentFilter {
        sort_dir: Some(SortDirection::Random),
        ..ContentFilter::of_type(ARTICLES)
    };
    assert_eq!(fx.service.query(&filter).await.expect("query").len(), 1);

    insert_behind_the_cache(&fx).await;
    assert_eq!(fx.service.query(&filter).await.expect("query").len(), 2);
}

#[tokio::test]
async fn topic_and_author_filters_select_matching_rows() {
    let fx = fixture();
    let tagged = fx
        .create(CreateContent {
            topics: vec![2],
            ..article("Tagged")
        })
        .await;
    let by_grace = fx
        .create(CreateContent {
            author_id: 2,
            ..article("Grace writes")
        })
        .await;

    let topical = ContentFilter {
        topic: Some(OneOrMany::Many(vec![2, 3])),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&topical).await.expect("query");
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![tagged]);

    let authored = ContentFilter {
        author: Some(OneOrMany::One(2)),
        ..ContentFilter::default()
    };
    let rows = fx.service.query(&authored).await.expect("query");
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![by_grace]);

    let fuzzy = ContentFilter {
        author_like: Some("GRA".to_string()),
        ..ContentFilter::of_type(ARTICLES)
    };
    assert_eq!(fx.service.count(&fuzzy).await.expect("count"), 1);
}

#[tokio::test]
async fn custom_field_filters_match_substrings_and_blanks() {
    let fx = fixture();
    let with_subtitle = fx
        .create(with_field(article("Subtitled"), "subtitle", "A Rust Story"))
        .await;
    let without = fx.create(article("Bare")).await;

    let mut contains = ContentFilter::of_type(ARTICLES);
    contains
        .fields
        .insert("articles.subtitle".to_string(), "rust".to_string());
    let rows = fx.service.query(&contains).await.expect("query");
    assert_eq!(
        rows.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![with_subtitle]
    );

    let mut blank = ContentFilter::of_type(ARTICLES);
    blank.fields.insert("subtitle".to_string(), String::new());
    let rows = fx.service.query(&blank).await.expect("query");
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![without]);
}

#[tokio::test]
async fn date_range_and_standard_flag_filter_rows() {
    let fx = fixture();
    let old = fx
        .create(CreateContent {
            publish_at: days_ago(10),
            ..article("Old")
        })
        .await;
    fx.create(CreateContent {
        publish_at: days_ago(2),
        ..article("New")
    })
    .await;
    fx.create(CreateContent {
        publish_at: days_ago(9),
        ..CreateContent::new(ARTICLES, 1)
    })
    .await;

    let filter = ContentFilter {
        end_date: days_ago(5),
        is_standard: Some(true),
        ..ContentFilter::of_type(ARTICLES)
    };
    let rows = fx.service.query(&filter).await.expect("query");
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![old]);
}

#[tokio::test]
async fn date_format_override_is_applied() {
    let fx = fixture();
    let publish_at = OffsetDateTime::now_utc() - Duration::days(3);
    let id = fx
        .create(CreateContent {
            publish_at: Some(publish_at),
            ..article("Formatted")
        })
        .await;

    let filter = ContentFilter {
        date_format: Some("%Y-%m-%d".to_string()),
        ..ContentFilter::by_id(id)
    };
    let rows = fx.service.query(&filter).await.expect("query");
    let expected = format!(
        "{:04}-{:02}-{:02}",
        publish_at.year(),
        u8::from(publish_at.month()),
        publish_at.day()
    );
    assert_eq!(rows[0].date, expected);
}
