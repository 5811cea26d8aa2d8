use std::io::{self, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::Authorized;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::FollowupTable;
use crate::error::MutationError;
use crate::lifecycle::{Inbox, Outcome};
use crate::render::Renderer;
use crate::task::{Category, TaskId};
use crate::view::View;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list", "counts", "show", "review", "approve", "dismiss", "move", "help", "version",
    ]
}

/// Exact name, or the one command the token is a prefix of.
pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Commands that run without a datastore or a signed-in user.
pub fn is_builtin(command: &str) -> bool {
    matches!(command, "help" | "version")
}

pub fn dispatch_builtin(inv: &Invocation) -> anyhow::Result<()> {
    match inv.command {
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("not a builtin command: {other}")),
    }
}

#[instrument(skip(inbox, cfg, view, renderer, auth, inv), fields(user = %auth.email()))]
pub fn dispatch(
    inbox: &mut Inbox,
    cfg: &Config,
    view: &View,
    renderer: &mut Renderer,
    auth: &Authorized,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command;

    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "list" => cmd_list(inbox, cfg, view, renderer, &inv.command_args, now),
        "counts" => cmd_counts(inbox, view, renderer),
        "show" => cmd_show(inbox, view, renderer, &inv.command_args, now),
        "review" => cmd_review(inbox, view, renderer, now),
        "approve" | "dismiss" | "move" => {
            let mut out = io::stdout().lock();
            cmd_mutation(&mut out, inbox, view, auth, command, &inv.command_args)
        }
        other if is_builtin(other) => dispatch_builtin(&inv),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(inbox, cfg, view, renderer, args, now))]
fn cmd_list(
    inbox: &mut Inbox,
    cfg: &Config,
    view: &View,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let tab: Category = match args.first() {
        Some(raw) => raw.parse().map_err(|err| anyhow!("invalid tab: {err}"))?,
        None => cfg.default_tab(),
    };

    let pending = inbox.pending()?;
    renderer.print_inbox(view, pending, tab, now)
}

#[instrument(skip(inbox, view, renderer))]
fn cmd_counts(inbox: &mut Inbox, view: &View, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command counts");

    let pending = inbox.pending()?;
    renderer.print_counts(&view.counts_by_tab(pending))
}

#[instrument(skip(inbox, view, renderer, args, now))]
fn cmd_show(
    inbox: &mut Inbox,
    view: &View,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command show");

    let raw = args.first().map(String::as_str).unwrap_or_default();
    let id = TaskId::parse(raw)?;
    let task = inbox
        .store()
        .get(&id)?
        .ok_or_else(|| anyhow!("no follow-up with id {id}"))?;

    renderer.print_task_card(view, &task, now)
}

#[instrument(skip(inbox, view, renderer, now))]
fn cmd_review(
    inbox: &mut Inbox,
    view: &View,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command review");

    let pending = inbox.pending()?;
    renderer.print_review(view, pending, now)
}

/// Mutations fail soft: a rejected request or a failed write is reported on
/// `out` and the command still succeeds. Only a broken `out` is an error.
#[instrument(skip(out, inbox, view, auth, args))]
fn cmd_mutation<W: Write, T: FollowupTable>(
    out: &mut W,
    inbox: &mut Inbox<T>,
    view: &View,
    auth: &Authorized,
    action: &str,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command {action}");

    let id = args.first().map(String::as_str);
    let category = args.get(1).map(String::as_str);
    let label = id.unwrap_or("-");

    match inbox.submit(auth, action, id, category) {
        Ok(outcome) => {
            debug!(%outcome, "mutation finished");
            writeln!(out, "{action} {label}: {outcome}")?;
            if outcome == Outcome::Applied {
                match inbox.pending() {
                    Ok(pending) => {
                        writeln!(out, "{} pending follow-up(s)", view.total_pending(pending))?
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "could not reload pending follow-ups")
                    }
                }
            }
        }
        Err(MutationError::Input(err)) => {
            warn!(error = %err, "mutation ignored");
            writeln!(out, "{action} {label}: ignored ({err})")?;
        }
        Err(err @ MutationError::Storage(_)) => {
            error!(error = %err, "mutation not applied");
            writeln!(out, "{action} {label}: not applied")?;
        }
    }

    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "inbox [options] [command] [args]\n\n\
         commands:\n  \
         list [tab]              pending follow-ups in a tab (urgent, lead, invoice, personal)\n  \
         counts                  pending follow-ups per tab\n  \
         show <id>               one follow-up with its suggested reply\n  \
         review                  pending follow-ups with a low-confidence category\n  \
         approve <id>            mark a follow-up approved\n  \
         dismiss <id>            mark a follow-up dismissed\n  \
         move <id> <category>    move a follow-up to another tab\n  \
         help | version\n\n\
         settings: --rc key=value or rc.key=value, read after ~/.inboxrc"
    );
    Ok(())
}
