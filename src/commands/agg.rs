use std::future::Future;
use std::io::Write;
use std::time::Duration;

use super::{CommandError, Session};
use crate::feed::FeedReader;
use crate::scheduler::Poller;

impl Session {
    /// `agg <time_between_reqs>`: poll one feed per interval until `shutdown`
    pub(super) async fn agg<W, F>(
        &self,
        interval: Duration,
        out: &mut W,
        shutdown: F,
    ) -> Result<(), CommandError>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let reader = FeedReader::new(self.config.fetch_timeout(), self.config.user_agent())?;
        let poller = Poller::new(self.db.clone(), reader, interval);

        writeln!(out, "Collecting feeds every {:?}", interval)?;
        out.flush()?;

        poller.run(out, shutdown).await?;
        Ok(())
    }
}
