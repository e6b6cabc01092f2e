use std::io::Write;

use super::{CommandError, Session};
use crate::storage::DatabaseError;

impl Session {
    // ========================================================================
    // User Commands
    // ========================================================================

    /// `register <name>`: create the user, then make it current
    pub(super) async fn register<W: Write>(
        &mut self,
        name: &str,
        out: &mut W,
    ) -> Result<(), CommandError> {
        let user = match self.db.create_user(name).await {
            Ok(user) => user,
            Err(DatabaseError::Duplicate(_)) => {
                return Err(CommandError::UserExists(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        self.config.set_user(&self.config_path, &user.name)?;

        tracing::info!(user = %user.name, id = %user.id, "Registered user");
        writeln!(out, "User {:?} was created", user.name)?;
        writeln!(out, "  ID:      {}", user.id)?;
        writeln!(out, "  Created: {}", user.created_at.to_rfc3339())?;
        Ok(())
    }

    /// `login <name>`: only existing users can become current
    pub(super) async fn login<W: Write>(
        &mut self,
        name: &str,
        out: &mut W,
    ) -> Result<(), CommandError> {
        let user = self
            .db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| CommandError::UnknownUser(name.to_string()))?;
        self.config.set_user(&self.config_path, &user.name)?;

        writeln!(out, "User {:?} has been set", user.name)?;
        Ok(())
    }

    /// `reset`: wipe every user and everything hanging off them
    pub(super) async fn reset<W: Write>(&mut self, out: &mut W) -> Result<(), CommandError> {
        let removed = self.db.reset_users().await?;
        tracing::info!(users = removed, "Database reset");
        writeln!(out, "Database reset: removed {} user(s)", removed)?;
        Ok(())
    }

    /// `users`: one name per line, the current user suffixed with `(current)`
    pub(super) async fn users<W: Write>(&self, out: &mut W) -> Result<(), CommandError> {
        let current = self.config.current_user_name.as_deref();
        for user in self.db.list_users().await? {
            if Some(user.name.as_str()) == current {
                writeln!(out, "{} (current)", user.name)?;
            } else {
                writeln!(out, "{}", user.name)?;
            }
        }
        Ok(())
    }
}
