pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod event;
pub mod export;
pub mod ledger;
pub mod notice;
pub mod render;
pub mod settings;
pub mod status;
pub mod store;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting oli"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.olirc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    store::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open store at {}",
          data_dir.display()
        )
      })?;

  let timezone =
    datetime::resolve_timezone(
      cfg.timezone()
    );
  let today =
    datetime::today_in(timezone);
  debug!(%today, "resolved today");

  let mut session =
    app::Session::load(store, today);

  let renderer =
    render::Renderer::new(&cfg);
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let mut prompt =
    commands::Prompt::new(
      io::stdin().lock(),
      io::stderr()
    );
  let mut assume_yes =
    commands::AssumeYes;
  let confirm: &mut dyn commands::Confirm =
    if cli.yes {
      &mut assume_yes
    } else {
      &mut prompt
    };

  let mut out = io::stdout().lock();
  commands::dispatch(
    &mut session,
    &cfg,
    &renderer,
    inv,
    confirm,
    &mut out
  )?;

  info!("done");
  Ok(())
}
