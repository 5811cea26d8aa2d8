pub mod auth;
pub mod cli;
pub mod commands;
pub mod compose;
pub mod config;
pub mod datastore;
pub mod error;
pub mod lifecycle;
pub mod render;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

/// Parses the command line, loads settings, signs the caller in and runs one
/// command. `help` and `version` skip the sign-in and the datastore.
#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let mut args =
    cli::Args::parse_from(raw_args);
  cli::init_tracing(
    args.verbose,
    args.quiet
  )?;

  let settings = args.take_settings();
  debug!(?settings, "setting overrides");
  let cfg = config::Config::load(
    args.rc_file.as_deref(),
    settings
  )?;

  let inv = cli::Invocation::parse(
    &cfg,
    std::mem::take(&mut args.words)
  )?;
  info!(
    command = inv.command,
    "starting inbox"
  );
  if commands::is_builtin(inv.command) {
    return commands::dispatch_builtin(
      &inv
    );
  }

  let authorized = sign_in(
    args.user.as_deref(),
    &cfg
  )?;

  let data_dir =
    cfg.data_dir(args.data.as_deref());
  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let mut inbox =
    lifecycle::Inbox::new(store);

  let view =
    view::View::new(cfg.view_policy());
  let mut renderer =
    render::Renderer::new(&cfg);

  commands::dispatch(
    &mut inbox,
    &cfg,
    &view,
    &mut renderer,
    &authorized,
    inv
  )
}

fn sign_in(
  user_flag: Option<&str>,
  cfg: &config::Config
) -> anyhow::Result<auth::Authorized> {
  let identity = auth::resolve_identity(
    user_flag, cfg
  );
  auth::AllowList::from_config(cfg)
    .authorize(&identity)
    .context("access denied")
}
