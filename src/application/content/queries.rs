use std::time::Instant;

use metrics::histogram;
use tracing::{debug, instrument};

use crate::application::query::{ContentFilter, PlanOutcome, Projection};
use crate::cache::{CacheKey, CachedValue};
use crate::domain::entities::ContentRecord;
use crate::domain::types::ContentId;

use super::assemble::Assembler;
use super::service::ContentService;
use super::types::{ContentError, QueryOutcome};

#[derive(Debug, Clone, Copy)]
struct ReadOptions {
    use_cache: bool,
    track_hit: bool,
}

impl ReadOptions {
    const PUBLIC: Self = Self {
        use_cache: true,
        track_hit: true,
    };

    const INTERNAL: Self = Self {
        use_cache: false,
        track_hit: false,
    };
}

impl ContentService {
    /// Fetch one content item by id.
    ///
    /// Results, including misses, are cached under `content:<id>:<flag>`.
    #[instrument(skip(self))]
    pub async fn get_one(
        &self,
        id: ContentId,
        allow_future: bool,
    ) -> Result<Option<ContentRecord>, ContentError> {
        let key = CacheKey::content(id, allow_future);
        match self.cache.get(&key) {
            Some(CachedValue::Content(record)) => return Ok(Some(*record)),
            Some(CachedValue::Empty) => return Ok(None),
            _ => {}
        }

        let filter = ContentFilter {
            allow_future,
            ..ContentFilter::by_id(id)
        };
        let found = self
            .run(&filter, Projection::Full, ReadOptions::PUBLIC)
            .await?
            .into_contents()
            .into_iter()
            .next();

        let cached = match &found {
            Some(record) => CachedValue::Content(Box::new(record.clone())),
            None => CachedValue::Empty,
        };
        self.cache.set(key, cached, self.settings.cache.single_ttl());
        Ok(found)
    }

    #[instrument(skip(self, filter))]
    pub async fn count(&self, filter: &ContentFilter) -> Result<u64, ContentError> {
        Ok(self
            .run(filter, Projection::Count, ReadOptions::PUBLIC)
            .await?
            .count())
    }

    #[instrument(skip(self, filter))]
    pub async fn query(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>, ContentError> {
        Ok(self
            .run(filter, Projection::Full, ReadOptions::PUBLIC)
            .await?
            .into_contents())
    }

    pub async fn query_with(
        &self,
        filter: &ContentFilter,
        counting: bool,
    ) -> Result<QueryOutcome, ContentError> {
        if counting {
            self.count(filter).await.map(QueryOutcome::Count)
        } else {
            self.query(filter).await.map(QueryOutcome::Contents)
        }
    }

    /// Map a link path (`news/launch`) to the content registered under it.
    #[instrument(skip(self))]
    pub async fn resolve_id_by_path(&self, path: &str) -> Result<Option<ContentId>, ContentError> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(None);
        }
        let Some(link) = self.links.find_by_path(path).await? else {
            return Ok(None);
        };
        Ok(self.store.find_id_by_link(link.id).await?)
    }

    /// Current state of a content item, bypassing cache and hit counting.
    pub(crate) async fn load_current(
        &self,
        id: ContentId,
    ) -> Result<Option<ContentRecord>, ContentError> {
        let filter = ContentFilter {
            allow_future: true,
            ..ContentFilter::by_id(id)
        };
        Ok(self
            .run(&filter, Projection::Full, ReadOptions::INTERNAL)
            .await?
            .into_contents()
            .into_iter()
            .next())
    }

    async fn run(
        &self,
        filter: &ContentFilter,
        projection: Projection,
        options: ReadOptions,
    ) -> Result<QueryOutcome, ContentError> {
        let counting = projection == Projection::Count;
        let key = (options.use_cache && !filter.is_random())
            .then(|| CacheKey::contents(filter, counting));

        if let Some(key) = &key {
            match self.cache.get(key) {
                Some(CachedValue::Empty) => return Ok(QueryOutcome::empty(counting)),
                Some(CachedValue::Contents(contents)) if !counting => {
                    return Ok(QueryOutcome::Contents(contents));
                }
                Some(CachedValue::Count(count)) if counting => {
                    return Ok(QueryOutcome::Count(count));
                }
                _ => {}
            }
        }

        if options.track_hit && !counting {
            if let Some(id) = filter.id {
                self.store.increment_hits(id).await?;
            }
        }

        let plan = match self
            .query_builder()
            .build(filter, projection, self.now())
            .await?
        {
            PlanOutcome::Plan(plan) => plan,
            PlanOutcome::NoResults => {
                self.remember(key, CachedValue::Empty, counting);
                return Ok(QueryOutcome::empty(counting));
            }
        };

        let started = Instant::now();
        if counting {
            let count = self.store.count_rows(&plan).await?;
            histogram!("folio_content_query_ms", "projection" => "count")
                .record(started.elapsed().as_secs_f64() * 1000.0);
            debug!(count, "counted content");
            self.remember(key, CachedValue::Count(count), counting);
            return Ok(QueryOutcome::Count(count));
        }

        let rows = self.store.fetch_rows(&plan).await?;
        histogram!("folio_content_query_ms", "projection" => "full")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        debug!(rows = rows.len(), "fetched content rows");
        if rows.is_empty() {
            self.remember(key, CachedValue::Empty, counting);
            return Ok(QueryOutcome::empty(counting));
        }

        let assembler = Assembler::new(
            &self.settings,
            filter.date_format.as_deref(),
            plan.extension.as_ref(),
        );
        let contents: Vec<ContentRecord> = rows
            .into_iter()
            .map(|row| assembler.assemble(row))
            .collect();
        self.remember(key, CachedValue::Contents(contents.clone()), counting);
        Ok(QueryOutcome::Contents(contents))
    }

    fn remember(&self, key: Option<CacheKey>, value: CachedValue, counting: bool) {
        let Some(key) = key else {
            return;
        };
        let ttl = if counting {
            self.settings.cache.count_ttl()
        } else {
            self.settings.cache.list_ttl()
        };
        self.cache.set(key, value, ttl);
    }
}
