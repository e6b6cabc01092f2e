use std::io::Write;

use super::{CommandError, Session};
use crate::storage::User;
use crate::util::strip_control_chars;

impl Session {
    /// `browse [limit]`: newest posts across the user's followed feeds.
    ///
    /// Feed text is untrusted, so control sequences are stripped before it
    /// reaches the terminal.
    pub(super) async fn browse<W: Write>(
        &self,
        user: &User,
        limit: u32,
        out: &mut W,
    ) -> Result<(), CommandError> {
        let posts = self.db.posts_for_user(user.id, i64::from(limit)).await?;
        tracing::debug!(user = %user.name, limit, found = posts.len(), "Browsing posts");

        for post in posts {
            writeln!(out, "Title: {}", strip_control_chars(&post.title))?;
            writeln!(out, "Description: {}", strip_control_chars(&post.description))?;
            writeln!(out, "URL: {}", strip_control_chars(&post.url))?;
            writeln!(
                out,
                "Published At: {}",
                post.published_at.format("%Y-%m-%d %H:%M:%S %Z")
            )?;
            writeln!(out)?;
        }
        Ok(())
    }
}
