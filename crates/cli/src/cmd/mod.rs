mod build;
mod info;
mod refresh;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use build::cmd_build;
pub use info::cmd_info;
pub use refresh::cmd_refresh;

fn runtime() -> Result<Runtime> {
  Runtime::new().context("Failed to create async runtime")
}

/// Token cancelled on the first Ctrl-C received while `rt` runs.
fn cancel_on_ctrl_c(rt: &Runtime) -> CancellationToken {
  let cancel = CancellationToken::new();
  let token = cancel.clone();
  rt.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, stopping at the next step");
      token.cancel();
    }
  });
  cancel
}
