use crate::{exec::Executor, installer::TOOL_NAME};
use anyhow::Result;
use log::debug;

/// Runs the installed selene. It must already be on `PATH`.
#[derive(Debug)]
pub(crate) struct Runner<'a> {
    executor: &'a dyn Executor,
}

impl<'a> Runner<'a> {
    pub(crate) fn new(executor: &'a dyn Executor) -> Self {
        Runner { executor }
    }

    /// `args` are passed to the shell as-is, so quoting and globbing work the way they would on a
    /// command line.
    pub(crate) fn run(&self, args: &str) -> Result<()> {
        debug!("Running {TOOL_NAME} with arguments: {args}");
        self.executor.exec(&command_line(args))
    }
}

fn command_line(args: &str) -> String {
    let args = args.trim();
    if args.is_empty() {
        TOOL_NAME.to_string()
    } else {
        format!("{TOOL_NAME} {args}")
    }
}
