pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod env;
pub mod filter;
pub mod notice;
pub mod persist;
pub mod render;
pub mod shell;
pub mod store;
pub mod task;
pub mod theme;

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
    "starting todo CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.todorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let prefers_dark =
    env::ambient_prefers_dark(
      cfg.get("color.scheme").as_deref(),
      std::env::var("COLORFGBG")
        .ok()
        .as_deref()
    );
  let host = env::FileEnv::open(
    &data_dir,
    prefers_dark
  )
  .with_context(|| {
    format!(
      "failed to open store at {}",
      data_dir.display()
    )
  })?;

  let mut store = store::TaskStore::open(
    host,
    clock::SystemClock
  );
  let mut theme =
    theme::ThemeState::load(
      store.persistence()
    );
  let mut renderer =
    render::Renderer::new(
      &cfg,
      theme.current()
    )?;

  let command = match cli.command {
    | Some(command) => command,
    | None => {
      let name = cfg
        .get("default.command")
        .unwrap_or_else(|| {
          "list".to_string()
        });
      debug!(command = %name, "no explicit command, using default");
      cli::Command::from_default(&name)?
    }
  };

  let stdout = io::stdout();
  commands::dispatch(
    &mut store,
    &mut theme,
    &cfg,
    &mut renderer,
    command,
    &mut stdout.lock()
  )?;

  info!("done");
  Ok(())
}
