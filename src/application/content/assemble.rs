//! Turns storage rows into [`ContentRecord`]s.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::application::query::ExtensionJoin;
use crate::application::repos::ContentRow;
use crate::domain::entities::{ContentRecord, placeholder_title};
use crate::util::timezone::format_local;

use super::types::ContentSettings;

pub(crate) struct Assembler<'a> {
    settings: &'a ContentSettings,
    date_format: &'a str,
    extension: Option<&'a ExtensionJoin>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(
        settings: &'a ContentSettings,
        date_format: Option<&'a str>,
        extension: Option<&'a ExtensionJoin>,
    ) -> Self {
        Self {
            settings,
            date_format: date_format.unwrap_or(&settings.date_format),
            extension,
        }
    }

    pub(crate) fn assemble(&self, row: ContentRow) -> ContentRecord {
        let title = if row.is_standard {
            row.title
        } else {
            placeholder_title(row.id)
        };
        let url = row.url_path.as_deref().and_then(|path| self.url_for(path));
        let privileges: BTreeSet<_> = row.privileges.into_iter().collect();

        ContentRecord {
            id: row.id,
            link_id: row.link_id,
            date: format_local(row.created_at, self.settings.time_zone, self.date_format),
            modified_date: format_local(
                row.modified_at,
                self.settings.time_zone,
                self.date_format,
            ),
            created_at: row.created_at,
            modified_at: row.modified_at,
            author_id: row.author_id,
            author_username: row.author_username,
            author_first_name: row.author_first_name,
            author_last_name: row.author_last_name,
            author_email: row.author_email,
            type_id: row.type_id,
            type_name: row.type_name,
            is_standard: row.is_standard,
            title,
            url_path: row.url_path,
            url,
            privileges: (!privileges.is_empty()).then_some(privileges),
            topics: row.topics.into_iter().collect(),
            template: row.template,
            hits: u64::try_from(row.hits).unwrap_or(0),
            relevance: row.relevance,
            fields: self.fields(row.extension),
        }
    }

    fn url_for(&self, path: &str) -> Option<String> {
        self.settings
            .site_url
            .join(path.trim_start_matches('/'))
            .ok()
            .map(String::from)
    }

    /// Registered fields only, missing columns as `null`.
    fn fields(&self, mut extension: serde_json::Map<String, Value>) -> BTreeMap<String, Value> {
        let Some(join) = self.extension else {
            return BTreeMap::new();
        };
        join.fields
            .iter()
            .map(|field| {
                let value = extension.remove(&field.name).unwrap_or(Value::Null);
                (field.name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;
    use url::Url;

    use super::*;
    use crate::domain::entities::CustomFieldDef;

    fn row() -> ContentRow {
        let mut extension = serde_json::Map::new();
        extension.insert("body".into(), json!("Hello"));
        extension.insert("legacy".into(), json!("dropped"));
        ContentRow {
            id: 12,
            link_id: Some(3),
            type_id: 1,
            is_standard: true,
            title: "Launch".into(),
            author_id: 7,
            created_at: datetime!(2024-05-01 09:00 UTC),
            modified_at: datetime!(2024-05-02 09:00 UTC),
            hits: 4,
            privileges: vec![],
            topics: vec![5, 2],
            author_username: Some("ada".into()),
            author_first_name: None,
            author_last_name: None,
            author_email: None,
            type_name: Some("Article".into()),
            template: Some("article".into()),
            url_path: Some("news/launch".into()),
            relevance: None,
            extension,
        }
    }

    fn join() -> ExtensionJoin {
        ExtensionJoin {
            table: "articles".into(),
            fields: vec![
                CustomFieldDef {
                    name: "body".into(),
                    field_type: "textarea".into(),
                },
                CustomFieldDef {
                    name: "summary".into(),
                    field_type: "text".into(),
                },
            ],
        }
    }

    #[test]
    fn assembles_links_dates_and_fields() {
        let settings = ContentSettings {
            site_url: Url::parse("https://example.com/site/").expect("url"),
            ..ContentSettings::default()
        };
        let join = join();
        let record = Assembler::new(&settings, Some("%Y-%m-%d"), Some(&join)).assemble(row());

        assert_eq!(record.title, "Launch");
        assert_eq!(record.url.as_deref(), Some("https://example.com/site/news/launch"));
        assert_eq!(record.date, "2024-05-01");
        assert_eq!(record.modified_date, "2024-05-02");
        assert!(record.is_public());
        assert_eq!(record.topics.iter().copied().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(record.field("body"), Some(&json!("Hello")));
        assert_eq!(record.field("summary"), Some(&Value::Null));
        assert_eq!(record.field("legacy"), None);
    }

    #[test]
    fn non_standard_content_uses_placeholder_title() {
        let settings = ContentSettings::default();
        let mut row = row();
        row.is_standard = false;
        row.link_id = None;
        row.url_path = None;
        row.privileges = vec![3, 1];

        let record = Assembler::new(&settings, None, None).assemble(row);

        assert_eq!(record.title, "Entry #12");
        assert_eq!(record.url, None);
        assert_eq!(
            record.privileges,
            Some([1, 3].into_iter().collect::<BTreeSet<_>>())
        );
        assert!(record.fields.is_empty());
        assert_eq!(record.date, "May 1, 2024");
    }
}
