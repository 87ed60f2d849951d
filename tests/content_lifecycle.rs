//! Create/update/delete behaviour of the content service over the in-memory backend.

mod common;

use std::collections::BTreeSet;

use folio::application::content::{ContentError, CreateContent, UpdateContent};
use folio::application::hooks::ContentEvent;
use folio::application::query::ContentFilter;
use serde_json::json;
use time::{Duration, OffsetDateTime};

use common::{ARTICLES, article, fixture, with_field};

#[tokio::test]
async fn untitled_content_is_non_standard_with_placeholder_title() {
    let fx = fixture();
    let id = fx.create(CreateContent::new(ARTICLES, 1)).await;

    let record = fx
        .service
        .get_one(id, false)
        .await
        .expect("read")
        .expect("content exists");

    assert!(!record.is_standard);
    assert_eq!(record.title, format!("Entry #{id}"));
    assert_eq!(record.link_id, None);
    assert_eq!(record.url, None);
    assert_eq!(fx.backend.link_count(), 0);
}

#[tokio::test]
async fn titled_content_gets_a_link_and_absolute_url() {
    let fx = fixture();
    let id = fx.create(article("Hello World")).await;

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert!(record.is_standard);
    assert_eq!(record.url_path.as_deref(), Some("hello-world"));
    assert_eq!(record.url.as_deref(), Some("http://localhost/hello-world"));
    assert_eq!(record.type_name.as_deref(), Some("Article"));
    assert_eq!(record.author_username.as_deref(), Some("ada"));

    let resolved = fx
        .service
        .resolve_id_by_path("/hello-world/")
        .await
        .expect("resolve");
    assert_eq!(resolved, Some(id));
}

#[tokio::test]
async fn duplicate_titles_receive_unique_paths() {
    let fx = fixture();
    let first = fx.create(article("About")).await;
    let second = fx.create(article("About")).await;

    let first = fx.service.get_one(first, false).await.expect("read").expect("first");
    let second = fx.service.get_one(second, false).await.expect("read").expect("second");

    assert_eq!(first.url_path.as_deref(), Some("about"));
    assert_eq!(second.url_path.as_deref(), Some("about-2"));
}

#[tokio::test]
async fn explicit_url_path_is_normalized() {
    let fx = fixture();
    let command = CreateContent {
        url_path: Some("/News/Launch Day/".to_string()),
        ..article("Launch")
    };
    let id = fx.create(command).await;

    let resolved = fx
        .service
        .resolve_id_by_path("news/launch-day")
        .await
        .expect("resolve");
    assert_eq!(resolved, Some(id));
}

#[tokio::test]
async fn unknown_path_resolves_to_none() {
    let fx = fixture();
    assert_eq!(
        fx.service.resolve_id_by_path("missing").await.expect("resolve"),
        None
    );
    assert_eq!(fx.service.resolve_id_by_path("/").await.expect("resolve"), None);
}

#[tokio::test]
async fn recent_publish_time_snaps_to_now() {
    let fx = fixture();
    let before = OffsetDateTime::now_utc();
    let command = CreateContent {
        publish_at: Some(before - Duration::minutes(10)),
        ..article("Recent")
    };
    let id = fx.create(command).await;

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert!(record.created_at >= before);
}

#[tokio::test]
async fn older_publish_time_is_kept() {
    let fx = fixture();
    let requested = OffsetDateTime::now_utc() - Duration::hours(2);
    let command = CreateContent {
        publish_at: Some(requested),
        ..article("Backdated")
    };
    let id = fx.create(command).await;

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(record.created_at, requested);
}

#[tokio::test]
async fn future_content_is_hidden_unless_allowed() {
    let fx = fixture();
    let command = CreateContent {
        publish_at: Some(OffsetDateTime::now_utc() + Duration::days(1)),
        ..article("Scheduled")
    };
    let id = fx.create(command).await;

    assert!(fx.service.get_one(id, false).await.expect("read").is_none());
    assert!(fx.service.get_one(id, true).await.expect("read").is_some());
}

#[tokio::test]
async fn privileges_and_topics_are_stored_as_sets() {
    let fx = fixture();
    let command = CreateContent {
        privileges: vec![3, 1, 3],
        topics: vec![2, 1, 2, 0],
        ..article("Members only")
    };
    let id = fx.create(command).await;

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(record.privileges, Some(BTreeSet::from([1, 3])));
    assert_eq!(record.topics, BTreeSet::from([1, 2]));
    assert!(!record.is_public());
}

#[tokio::test]
async fn public_group_makes_content_public() {
    let fx = fixture();
    let command = CreateContent {
        privileges: vec![4, 0],
        ..article("Everyone")
    };
    let id = fx.create(command).await;

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(record.privileges, None);
}

#[tokio::test]
async fn custom_fields_are_flattened_into_the_record() {
    let fx = fixture();
    let command = with_field(article("Review"), "rating", "4");
    let id = fx.create(with_field(command, "body", "A careful look.")).await;

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(record.field("rating"), Some(&json!(4)));
    assert_eq!(record.field("body"), Some(&json!("A careful look.")));
    assert_eq!(record.field("subtitle"), Some(&json!(null)));
}

#[tokio::test]
async fn reads_after_update_are_fresh() {
    let fx = fixture();
    let id = fx.create(with_field(article("Draft"), "body", "first")).await;
    let filter = ContentFilter::of_type(ARTICLES);

    let before = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(before.title, "Draft");
    assert_eq!(fx.service.query(&filter).await.expect("query")[0].title, "Draft");

    let mut update = UpdateContent::new(id);
    update.title = Some("Final".to_string());
    update
        .custom_fields
        .insert("body".to_string(), json!("second"));
    assert!(fx.service.update(update).await.expect("update"));

    let after = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(after.title, "Final");
    assert_eq!(after.field("body"), Some(&json!("second")));
    assert_eq!(after.url_path.as_deref(), Some("final"));
    assert_eq!(fx.service.query(&filter).await.expect("query")[0].title, "Final");
}

#[tokio::test]
async fn update_keeps_unsupplied_fields_and_own_path() {
    let fx = fixture();
    let id = fx
        .create(with_field(article("Stable"), "subtitle", "kept"))
        .await;

    let mut update = UpdateContent::new(id);
    update.title = Some("Stable".to_string());
    update.custom_fields.insert("rating".to_string(), json!(2));
    assert!(fx.service.update(update).await.expect("update"));

    let record = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(record.url_path.as_deref(), Some("stable"));
    assert_eq!(record.field("subtitle"), Some(&json!("kept")));
    assert_eq!(record.field("rating"), Some(&json!(2)));
}

#[tokio::test]
async fn update_of_missing_content_reports_false() {
    let fx = fixture();
    assert!(!fx.service.update(UpdateContent::new(404)).await.expect("update"));
}

#[tokio::test]
async fn delete_rejects_empty_and_unknown_ids() {
    let fx = fixture();
    assert!(!fx.service.delete(0).await.expect("delete"));
    assert!(!fx.service.delete(999).await.expect("delete"));
}

#[tokio::test]
async fn delete_removes_link_fixed_and_extension_rows() {
    let fx = fixture();
    let id = fx.create(with_field(article("Short lived"), "body", "bye")).await;
    assert!(fx.service.get_one(id, false).await.expect("read").is_some());
    assert_eq!(fx.backend.link_count(), 1);

    assert!(fx.service.delete(id).await.expect("delete"));

    assert_eq!(fx.backend.link_count(), 0);
    assert!(!fx.backend.has_content(id));
    assert!(fx.backend.extension_row("articles", id).is_none());
    assert!(fx.service.get_one(id, false).await.expect("read").is_none());
    assert!(!fx.service.delete(id).await.expect("second delete"));
}

#[tokio::test]
async fn delete_succeeds_when_extension_table_is_gone() {
    let fx = fixture();
    let id = fx.create(article("Orphaned")).await;
    fx.backend.drop_table("articles");

    assert!(fx.service.delete(id).await.expect("delete"));
    assert!(!fx.backend.has_content(id));
    assert_eq!(fx.backend.link_count(), 0);
}

#[tokio::test]
async fn failed_write_releases_the_allocated_link() {
    let fx = fixture();
    fx.backend.fail_next_write();

    let result = fx.service.create(article("Doomed")).await;

    assert!(matches!(result, Err(ContentError::Repo(_))));
    assert_eq!(fx.backend.link_count(), 0);
    assert!(fx.recorded_events().is_empty());
}

#[tokio::test]
async fn unknown_topic_fails_without_leaving_a_link() {
    let fx = fixture();
    let command = CreateContent {
        topics: vec![42],
        ..article("Bad topic")
    };

    let result = fx.service.create(command).await;

    assert!(matches!(result, Err(ContentError::Repo(_))));
    assert_eq!(fx.backend.link_count(), 0);
}

#[tokio::test]
async fn unknown_type_and_field_are_rejected() {
    let fx = fixture();

    let result = fx.service.create(CreateContent::new(77, 1)).await;
    assert!(matches!(result, Err(ContentError::UnknownType(77))));

    let result = fx
        .service
        .create(with_field(article("Typo"), "bdoy", "text"))
        .await;
    match result {
        Err(ContentError::UnknownField { type_id, field }) => {
            assert_eq!(type_id, ARTICLES);
            assert_eq!(field, "bdoy");
        }
        other => panic!("expected unknown field error, got {other:?}"),
    }
    assert_eq!(fx.backend.link_count(), 0);
}

#[tokio::test]
async fn lifecycle_events_reach_listeners() {
    let fx = fixture();
    let id = fx.create(article("Observed")).await;

    let mut update = UpdateContent::new(id);
    update.title = Some("Observed again".to_string());
    fx.service.update(update).await.expect("update");
    fx.service.delete(id).await.expect("delete");

    assert_eq!(
        fx.recorded_events(),
        vec![
            ContentEvent::NewContent(id),
            ContentEvent::UpdateContent(id),
            ContentEvent::DeleteContent(id),
        ]
    );
}

#[tokio::test]
async fn single_reads_count_hits_once_per_cache_fill() {
    let fx = fixture();
    let id = fx.create(article("Popular")).await;

    let first = fx.service.get_one(id, false).await.expect("read").expect("content");
    let cached = fx.service.get_one(id, false).await.expect("read").expect("content");
    assert_eq!(first, cached);

    let hits = fx.service.record_hit(id).await.expect("hit");
    assert_eq!(hits, Some(2));
    assert_eq!(fx.service.record_hit(999).await.expect("hit"), None);
}
