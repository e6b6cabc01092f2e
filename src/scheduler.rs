//! Poll scheduler.
//!
//! One timer drives one poll cycle at a time: pick the feed that is most
//! overdue, record the attempt, fetch it and ingest its items. Cycles never
//! overlap; a cycle slower than the interval makes the next tick get skipped
//! rather than queued.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::feed::{ingest_document, FeedReader, FetchError, IngestReport};
use crate::storage::{Database, DatabaseError, Feed};

/// Why a single poll cycle was cut short. Never fatal to [`Poller::run`].
#[derive(Debug, Error)]
pub enum PollError {
    #[error("No feeds to fetch")]
    NoFeeds,

    #[error("Failed to select next feed: {0}")]
    Select(#[source] DatabaseError),

    #[error("Failed to mark feed {feed_id} as fetched: {source}")]
    MarkFetched {
        feed_id: Uuid,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        feed_id: Uuid,
        url: String,
        #[source]
        source: FetchError,
    },
}

/// What one completed cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The feed as it was selected, before being marked fetched
    pub feed: Feed,
    pub channel_title: String,
    pub ingest: IngestReport,
}

pub struct Poller {
    db: Database,
    reader: FeedReader,
    interval: Duration,
}

impl Poller {
    pub fn new(db: Database, reader: FeedReader, interval: Duration) -> Self {
        Self {
            db,
            reader,
            interval,
        }
    }

    /// Run exactly one poll cycle.
    ///
    /// The feed is marked fetched *before* the request goes out, so a feed
    /// that hangs or fails is not picked again until every other feed has
    /// had its turn.
    pub async fn poll_once(&self) -> Result<CycleReport, PollError> {
        let feed = self
            .db
            .next_feed_to_fetch()
            .await
            .map_err(PollError::Select)?
            .ok_or(PollError::NoFeeds)?;

        self.db
            .mark_feed_fetched(feed.id, Utc::now())
            .await
            .map_err(|source| PollError::MarkFetched {
                feed_id: feed.id,
                source,
            })?;

        tracing::debug!(feed_id = %feed.id, url = %feed.url, "Polling feed");

        let document = self
            .reader
            .fetch(&feed.url)
            .await
            .map_err(|source| PollError::Fetch {
                feed_id: feed.id,
                url: feed.url.clone(),
                source,
            })?;

        let ingest = ingest_document(&self.db, feed.id, &document).await;

        Ok(CycleReport {
            feed,
            channel_title: document.channel.title,
            ingest,
        })
    }

    /// Poll one feed per tick until `shutdown` resolves.
    ///
    /// The first cycle runs one full interval after the call. Cycle failures
    /// are logged and the loop moves on to the next tick. Shutdown is checked
    /// first on every wake-up and also cancels a cycle that is in flight.
    /// Only a failure to write progress to `out` ends the loop early.
    pub async fn run<W, F>(&self, out: &mut W, shutdown: F) -> std::io::Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip first tick (immediate)
        timer.tick().await;

        tracing::info!(interval = ?self.interval, "Poll scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = timer.tick() => {}
            }

            let outcome = tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, abandoning in-flight poll cycle");
                    break;
                }
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                Ok(cycle) => {
                    writeln!(out, "Ingesting posts for feed {:?}:", cycle.channel_title)?;
                    writeln!(
                        out,
                        "Added {} new posts for feed {:?}\n",
                        cycle.ingest.inserted, cycle.channel_title
                    )?;
                    out.flush()?;
                }
                Err(PollError::NoFeeds) => {
                    tracing::warn!("No feeds to poll, waiting for the next tick");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Poll cycle failed");
                }
            }
        }

        tracing::info!("Poll scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::DEFAULT_USER_AGENT;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const THREE_ITEMS: &str = r#"<rss version="2.0"><channel>
        <title>Example</title>
        <item><title>One</title><link>https://example.com/1</link><pubDate>Mon, 16 Jun 2025 10:00:00 +0000</pubDate></item>
        <item><title>Two</title><link>https://example.com/2</link><pubDate>Tue, 17 Jun 2025 10:00:00 +0000</pubDate></item>
        <item><title>Three</title><link>https://example.com/3</link><pubDate>Wed, 18 Jun 2025 10:00:00 +0000</pubDate></item>
    </channel></rss>"#;

    async fn poller(interval: Duration) -> Poller {
        let db = Database::open(":memory:").await.unwrap();
        let reader = FeedReader::new(None, DEFAULT_USER_AGENT).unwrap();
        Poller::new(db, reader, interval)
    }

    async fn add_feed(poller: &Poller, name: &str, url: &str) -> Feed {
        let user = match poller.db.get_user_by_name("alice").await.unwrap() {
            Some(user) => user,
            None => poller.db.create_user("alice").await.unwrap(),
        };
        poller.db.create_feed(name, url, user.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_poll_once_ingests_then_dedups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(THREE_ITEMS))
            .expect(2)
            .mount(&server)
            .await;

        let poller = poller(Duration::from_secs(10)).await;
        let feed = add_feed(&poller, "Example", &format!("{}/rss", server.uri())).await;
        assert!(feed.last_fetched_at.is_none());

        let first = poller.poll_once().await.unwrap();
        assert_eq!(first.feed.id, feed.id);
        assert_eq!(first.channel_title, "Example");
        assert_eq!(first.ingest.inserted, 3);

        let marked = poller.db.get_feed(feed.id).await.unwrap().unwrap();
        assert!(marked.last_fetched_at.is_some());

        let second = poller.poll_once().await.unwrap();
        assert_eq!(second.feed.id, feed.id);
        assert_eq!(second.ingest.inserted, 0);
        assert_eq!(second.ingest.duplicates, 3);
    }

    #[tokio::test]
    async fn test_feed_marked_fetched_even_when_fetch_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let poller = poller(Duration::from_secs(10)).await;
        let feed = add_feed(&poller, "Broken", &format!("{}/rss", server.uri())).await;

        let err = poller.poll_once().await.unwrap_err();
        match err {
            PollError::Fetch { feed_id, source, .. } => {
                assert_eq!(feed_id, feed.id);
                assert!(matches!(source, FetchError::HttpStatus(500)));
            }
            other => panic!("expected fetch error, got {:?}", other),
        }

        let marked = poller.db.get_feed(feed.id).await.unwrap().unwrap();
        assert!(marked.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_rotation_prefers_never_fetched_then_oldest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let poller = poller(Duration::from_secs(10)).await;
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let older = add_feed(&poller, "T1", &format!("{}/t1", server.uri())).await;
        let newer = add_feed(&poller, "T2", &format!("{}/t2", server.uri())).await;
        let never = add_feed(&poller, "Never", &format!("{}/never", server.uri())).await;
        poller.db.mark_feed_fetched(older.id, t1).await.unwrap();
        poller.db.mark_feed_fetched(newer.id, t2).await.unwrap();

        let mut order = Vec::new();
        for _ in 0..3 {
            match poller.poll_once().await {
                Err(PollError::Fetch { feed_id, .. }) => order.push(feed_id),
                other => panic!("expected fetch error, got {:?}", other),
            }
        }
        assert_eq!(order, vec![never.id, older.id, newer.id]);
    }

    #[tokio::test]
    async fn test_document_without_channel_adds_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Atom</title></feed>"#,
            ))
            .mount(&server)
            .await;

        let poller = poller(Duration::from_secs(10)).await;
        add_feed(&poller, "Atom", &format!("{}/atom", server.uri())).await;

        let cycle = poller.poll_once().await.unwrap();
        assert_eq!(cycle.channel_title, "");
        assert_eq!(cycle.ingest, IngestReport::default());
    }

    #[tokio::test]
    async fn test_no_feeds() {
        let poller = poller(Duration::from_secs(10)).await;
        assert!(matches!(poller.poll_once().await, Err(PollError::NoFeeds)));
    }

    #[tokio::test]
    async fn test_run_polls_each_tick_until_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(THREE_ITEMS))
            .mount(&server)
            .await;

        let poller = poller(Duration::from_millis(100)).await;
        add_feed(&poller, "Example", &format!("{}/rss", server.uri())).await;

        let mut out = Vec::new();
        poller
            .run(&mut out, tokio::time::sleep(Duration::from_millis(350)))
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Ingesting posts for feed \"Example\":\nAdded 3 new posts for feed \"Example\"\n\n"));
        assert!(out.contains("Added 0 new posts for feed \"Example\""));
        assert_eq!(out.matches("Added 3 new posts").count(), 1);
    }

    #[tokio::test]
    async fn test_run_survives_cycles_without_feeds() {
        let poller = poller(Duration::from_millis(20)).await;
        let mut out = Vec::new();
        poller
            .run(&mut out, tokio::time::sleep(Duration::from_millis(120)))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_aborts_in_flight_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(THREE_ITEMS)
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let poller = poller(Duration::from_millis(20)).await;
        let feed = add_feed(&poller, "Slow", &format!("{}/rss", server.uri())).await;

        let mut out = Vec::new();
        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            poller.run(&mut out, tokio::time::sleep(Duration::from_millis(300))),
        )
        .await;

        assert!(finished.is_ok(), "run did not stop on shutdown");
        assert!(out.is_empty());
        assert!(poller.db.posts_for_feed(feed.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let poller = poller(Duration::from_secs(3600)).await;
        let mut out = Vec::new();
        poller.run(&mut out, std::future::ready(())).await.unwrap();
        assert!(out.is_empty());
    }
}
