//! CodeLog - 複数リポジトリの作業ログを集計するCLIツール

mod cli;
mod config;
mod dates;
mod error;
mod history;
mod logging;
mod report;
mod summary;
mod tracker;

#[cfg(test)]
mod test_support;

use anyhow::Result;

fn main() -> Result<()> {
    logging::init();
    cli::run()
}
