use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::feed::parser::{SyndicationDocument, SyndicationItem};
use crate::storage::{Database, DatabaseError, NewPost};

/// Layout every `<pubDate>` must follow (RFC 1123 with a numeric zone)
pub const PUB_DATE_LAYOUT: &str = "Mon, 02 Jan 2006 15:04:05 -0700";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Byte shape of a date after its weekday: `d` digit, `a` letter, `s` zone sign
const DATE_SHAPE: &[u8; 26] = b"dd aaa dddd dd:dd:dd sdddd";

#[derive(Debug, Error)]
pub enum PubDateError {
    #[error("publish date {0:?} does not start with a weekday")]
    Weekday(String),
    #[error("publish date {0:?} does not have the width of \"Mon, 02 Jan 2006 15:04:05 -0700\"")]
    Shape(String),
    #[error("publish date {value:?} does not match \"Mon, 02 Jan 2006 15:04:05 -0700\": {source}")]
    Layout {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse an item's raw publish date.
///
/// The weekday must be a valid three-letter abbreviation but is not checked
/// against the date itself; plenty of feeds get it wrong. Every other part
/// is fixed width, down to the two-digit day and the `±hhmm` zone.
///
/// ```
/// use gator::feed::parse_pub_date;
///
/// let ts = parse_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2006-01-02T22:04:05+00:00");
/// assert!(parse_pub_date("2006-01-02T15:04:05Z").is_err());
/// ```
pub fn parse_pub_date(value: &str) -> Result<DateTime<Utc>, PubDateError> {
    let value = value.trim();
    let rest = value
        .split_once(", ")
        .filter(|(day, _)| WEEKDAYS.iter().any(|w| w.eq_ignore_ascii_case(day)))
        .map(|(_, rest)| rest)
        .ok_or_else(|| PubDateError::Weekday(value.to_string()))?;

    if !has_date_shape(rest) {
        return Err(PubDateError::Shape(value.to_string()));
    }

    DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z")
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|source| PubDateError::Layout {
            value: value.to_string(),
            source,
        })
}

fn has_date_shape(rest: &str) -> bool {
    rest.len() == DATE_SHAPE.len()
        && rest.bytes().zip(DATE_SHAPE).all(|(b, &want)| match want {
            b'd' => b.is_ascii_digit(),
            b'a' => b.is_ascii_alphabetic(),
            b's' => b == b'+' || b == b'-',
            literal => b == literal,
        })
}

/// Outcome of ingesting one document for one feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Posts newly stored this cycle
    pub inserted: usize,
    /// Items already stored for this feed
    pub duplicates: usize,
    /// Items skipped because their publish date did not parse
    pub invalid_dates: usize,
    /// Items skipped because the insert failed for another reason
    pub failed: usize,
}

impl IngestReport {
    pub fn skipped(&self) -> usize {
        self.duplicates + self.invalid_dates + self.failed
    }
}

fn build_post(feed_id: Uuid, item: &SyndicationItem, published_at: DateTime<Utc>) -> NewPost {
    let now = Utc::now();
    NewPost {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: item.title.clone(),
        url: item.link.clone(),
        description: item.description.clone(),
        published_at,
        feed_id,
    }
}

/// Store every item of `document` as a post of `feed_id`, in document order.
///
/// Never fails as a whole. A bad date or a failed insert skips that item
/// only; an item whose link is already stored for the feed is skipped
/// silently. Inserts run one at a time and uniqueness is left to the
/// `(feed_id, url)` constraint, so concurrent ingestion of the same feed is
/// safe.
pub async fn ingest_document(
    db: &Database,
    feed_id: Uuid,
    document: &SyndicationDocument,
) -> IngestReport {
    let mut report = IngestReport::default();

    for item in &document.channel.items {
        let published_at = match parse_pub_date(&item.pub_date) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(
                    feed_id = %feed_id,
                    link = %item.link,
                    expected = PUB_DATE_LAYOUT,
                    error = %e,
                    "Skipping item with unparseable publish date"
                );
                report.invalid_dates += 1;
                continue;
            }
        };

        match db.insert_post(&build_post(feed_id, item, published_at)).await {
            Ok(()) => report.inserted += 1,
            Err(DatabaseError::Duplicate(_)) => {
                tracing::trace!(feed_id = %feed_id, link = %item.link, "Post already stored");
                report.duplicates += 1;
            }
            Err(e) => {
                tracing::error!(
                    feed_id = %feed_id,
                    link = %item.link,
                    title = %item.title,
                    error = %e,
                    "Failed to store post"
                );
                report.failed += 1;
            }
        }
    }

    tracing::debug!(
        feed_id = %feed_id,
        inserted = report.inserted,
        duplicates = report.duplicates,
        invalid_dates = report.invalid_dates,
        failed = report.failed,
        "Ingested document"
    );
    report
}
