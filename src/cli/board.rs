//! Interactive board viewer.

use crate::cli::{load_context, Globals};
use crate::error::{Error, Result};
use crate::ui::board_viewer;

pub struct ViewerOptions {
    pub globals: Globals,
}

pub fn run(options: ViewerOptions) -> Result<()> {
    if options.globals.json {
        return Err(Error::InvalidArgument(
            "kb board is interactive and has no JSON output".to_string(),
        ));
    }
    let ctx = load_context(&options.globals)?;
    if ctx.events_to_stdout {
        return Err(Error::InvalidArgument(
            "kb board cannot stream events to stdout; pass a file to --events".to_string(),
        ));
    }
    if let Some(reason) = &ctx.load.recovered {
        tracing::warn!(%reason, backup = ?ctx.load.backup_key, "stored board was unreadable");
    }
    tracing::debug!(
        store = %ctx.storage.store_dir().display(),
        loaded = ctx.load.loaded,
        reassigned = ctx.load.reassigned,
        "starting board viewer"
    );
    board_viewer::run(ctx.board, &ctx.config.display.due_label)
}
