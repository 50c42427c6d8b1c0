//! Console presenter for the display log

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, warn};

use crate::display::log::DisplayUpdate;

/// Write every appended display line to `out` until the log is dropped
pub async fn run_console<W>(
    mut updates: broadcast::Receiver<DisplayUpdate>,
    mut out: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match updates.recv().await {
            Ok(DisplayUpdate::Appended { index, line }) => {
                out.write_all(format!("[{index}] {line}\n").as_bytes())
                    .await?;
                out.flush().await?;
            }
            Ok(DisplayUpdate::ScrollToLast { .. }) => {
                // Terminal output always shows the newest line last
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Console presenter lagged behind display log");
            }
            Err(RecvError::Closed) => {
                debug!("Display log closed, console presenter exiting");
                return Ok(());
            }
        }
    }
}
