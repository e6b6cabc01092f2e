use std::io::Write;

use super::{CommandError, Session};
use crate::storage::{DatabaseError, User};
use crate::util::validate_feed_url;

impl Session {
    // ========================================================================
    // Feed & Follow Commands
    // ========================================================================

    /// `addfeed <name> <url>`: register the feed and follow it right away,
    /// in one transaction.
    ///
    /// The URL is stored as typed (minus surrounding whitespace) so that
    /// `follow`/`unfollow` match on the same string.
    pub(super) async fn add_feed<W: Write>(
        &self,
        user: &User,
        name: &str,
        url: &str,
        out: &mut W,
    ) -> Result<(), CommandError> {
        validate_feed_url(url)?;
        let url = url.trim();

        let (feed, follow) = match self.db.create_feed_with_follow(name, url, user.id).await {
            Ok(created) => created,
            Err(DatabaseError::Duplicate(_)) => {
                return Err(CommandError::FeedExists(url.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(feed_id = %feed.id, url = %feed.url, user = %user.name, "Added feed");
        writeln!(out, "Feed {:?} added", feed.name)?;
        writeln!(out, "  ID:  {}", feed.id)?;
        writeln!(out, "  URL: {}", feed.url)?;
        writeln!(
            out,
            "User {} is now following the feed {:?}",
            follow.user_name, follow.feed_name
        )?;
        Ok(())
    }

    /// `feeds`: every feed, whoever added it
    pub(super) async fn feeds<W: Write>(&self, out: &mut W) -> Result<(), CommandError> {
        for feed in self.db.list_feeds_with_creators().await? {
            writeln!(out, "Name: {}", feed.name)?;
            writeln!(out, "URL: {}", feed.url)?;
            writeln!(out, "CreatedBy: {}", feed.created_by)?;
            writeln!(out)?;
        }
        Ok(())
    }

    pub(super) async fn follow<W: Write>(
        &self,
        user: &User,
        url: &str,
        out: &mut W,
    ) -> Result<(), CommandError> {
        let url = url.trim();
        let feed = self
            .db
            .get_feed_by_url(url)
            .await?
            .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))?;

        let follow = match self.db.create_feed_follow(user.id, feed.id).await {
            Ok(follow) => follow,
            Err(DatabaseError::Duplicate(_)) => {
                return Err(CommandError::AlreadyFollowing(url.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(
            out,
            "User {} is now following the feed {:?}",
            follow.user_name, follow.feed_name
        )?;
        Ok(())
    }

    pub(super) async fn following<W: Write>(
        &self,
        user: &User,
        out: &mut W,
    ) -> Result<(), CommandError> {
        let follows = self.db.feed_follows_for_user(user.id).await?;
        writeln!(
            out,
            "{} is currently following {} feed(s):",
            user.name,
            follows.len()
        )?;
        for follow in follows {
            writeln!(out, "{}", follow.feed_name)?;
        }
        Ok(())
    }

    pub(super) async fn unfollow<W: Write>(
        &self,
        user: &User,
        url: &str,
        out: &mut W,
    ) -> Result<(), CommandError> {
        let url = url.trim();
        if self.db.unfollow_feed_by_url(user.id, url).await? == 0 {
            return Err(CommandError::NotFollowing(url.to_string()));
        }
        writeln!(out, "User {} unfollowed {}", user.name, url)?;
        Ok(())
    }
}
