/*!
 * Status Watcher
 * Re-classify the object tree on every change and print one line per result
 */

use futures::{Stream, StreamExt};
use std::io::Write;
use tracing::{debug, info};

use crate::bluez::ObjectEvent;
use crate::error::WatchError;
use crate::status::{classify, format_status, Palette, Snapshot, Status};

/// Anything that can hand out a fresh managed object snapshot.
pub trait ObjectSource {
    async fn managed_objects(&self) -> Result<Snapshot, WatchError>;
}

pub struct Watcher<S, W> {
    source: S,
    out: W,
    palette: Palette,
    status: Status,
}

impl<S: ObjectSource, W: Write> Watcher<S, W> {
    pub fn new(source: S, out: W, palette: Palette) -> Self {
        Self {
            source,
            out,
            palette,
            status: Status::Undefined,
        }
    }

    /// Last status written to the output.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Fetch a snapshot, classify it and print the result.
    pub async fn refresh(&mut self) -> Result<Status, WatchError> {
        let objects = self.source.managed_objects().await?;
        let status = classify(&objects);
        debug!("Classified {} objects as {}", objects.len(), status);

        if status != self.status {
            info!("Bluetooth status: {} -> {}", self.status, status);
        }
        self.status = status;

        writeln!(self.out, "{}", format_status(status, &self.palette))?;
        self.out.flush()?;
        Ok(status)
    }

    /// Refresh once per event until the stream ends.
    pub async fn run<E>(&mut self, mut events: E) -> Result<(), WatchError>
    where
        E: Stream<Item = ObjectEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            debug!("Received {}", event.member());
            self.refresh().await?;
        }
        Ok(())
    }

    pub fn into_source(self) -> S {
        self.source
    }
}
