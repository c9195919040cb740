use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::anyhow;
use tracing::{debug, info, instrument};

use crate::app::{Action, Session, reminder_notices};
use crate::cli::Invocation;
use crate::config::Config;
use crate::error::ValidationError;
use crate::event::{Category, EntryId, EventDraft};
use crate::export;
use crate::notice::Notice;
use crate::render::Renderer;
use crate::settings::SettingsPatch;
use crate::store::KvStore;

const ADD_USAGE: &str = "usage: oli add <engine|differential> <DATE> [NOTE...]";
const DELETE_USAGE: &str = "usage: oli delete <ID>";

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "status", "add", "history", "delete", "reset", "settings", "set", "export", "_commands",
        "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Yes/no gate in front of destructive commands.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool>;
}

/// Asks on `output` and reads one line from `input`. Anything but an
/// explicit yes declines.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        write!(self.output, "{prompt} [y/N] ")?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        debug!(prompt, "confirmation skipped");
        Ok(true)
    }
}

#[instrument(skip(session, cfg, renderer, inv, confirm, out))]
pub fn dispatch<S: KvStore, W: Write>(
    session: &mut Session<S>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    confirm: &mut dyn Confirm,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");
    renderer.write_notices(out, &session.take_notices())?;

    let (args, assume_yes) = if matches!(command, "delete" | "reset") {
        strip_yes_flag(&inv.command_args)
    } else {
        (inv.command_args.clone(), false)
    };
    let needs_confirm = !assume_yes && cfg.confirmation();
    let mut skip_confirm = AssumeYes;
    let confirm: &mut dyn Confirm = if needs_confirm {
        confirm
    } else {
        &mut skip_confirm
    };

    match command {
        "status" => cmd_status(session, renderer, out),
        "add" => cmd_add(session, renderer, &args, out),
        "history" => cmd_history(session, renderer, out),
        "delete" => cmd_delete(session, renderer, &args, confirm, out),
        "reset" => cmd_reset(session, renderer, confirm, out),
        "settings" => cmd_settings(session, cfg, renderer, out),
        "set" => cmd_set(session, renderer, &args, out),
        "export" => cmd_export(session, renderer, &args, out),
        "_commands" => {
            for name in known_command_names() {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn strip_yes_flag(args: &[String]) -> (Vec<String>, bool) {
    let mut yes = false;
    let kept = args
        .iter()
        .filter(|arg| {
            let flag = matches!(arg.as_str(), "-y" | "--yes");
            yes |= flag;
            !flag
        })
        .cloned()
        .collect();
    (kept, yes)
}

fn report<W: Write>(
    renderer: &Renderer,
    out: &mut W,
    result: Result<Vec<Notice>, ValidationError>,
) -> anyhow::Result<()> {
    let notices = match result {
        Ok(notices) => notices,
        Err(err) => {
            info!(error = %err, "input rejected");
            vec![Notice::error(err.to_string())]
        }
    };
    renderer.write_notices(out, &notices)
}

#[instrument(skip_all)]
fn cmd_status<S: KvStore, W: Write>(
    session: &Session<S>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    let state = session.state();
    let today = session.today();
    let status = session.status();
    renderer.write_dashboard(out, &status, &state.settings, state.stats(today), today)?;

    let reminders = reminder_notices(&status, &state.settings);
    if !reminders.is_empty() {
        writeln!(out)?;
        renderer.write_notices(out, &reminders)?;
    }
    Ok(())
}

#[instrument(skip_all)]
fn cmd_add<S: KvStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let Some((category, rest)) = args.split_first() else {
        return Err(anyhow!(ADD_USAGE));
    };
    let category = match category.parse::<Category>() {
        Ok(category) => category,
        Err(err) => return report(renderer, out, Err(err)),
    };
    let (date, note) = match rest.split_first() {
        Some((date, note)) => (Some(date.clone()), note.join(" ")),
        None => (None, String::new()),
    };

    let result = session.dispatch(Action::Record(EventDraft::new(category, date, note)));
    report(renderer, out, result)
}

#[instrument(skip_all)]
fn cmd_history<S: KvStore, W: Write>(
    session: &Session<S>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    let state = session.state();
    renderer.write_history(out, &state.ledger, &state.settings, session.today())
}

#[instrument(skip_all)]
fn cmd_delete<S: KvStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    args: &[String],
    confirm: &mut dyn Confirm,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");

    let [prefix] = args else {
        return Err(anyhow!(DELETE_USAGE));
    };
    let id = match session.state().ledger.resolve_prefix(prefix) {
        Ok(Some(event)) => event.id.clone(),
        // Unknown ids still go through the ledger so the no-op is reported
        // the same way everywhere.
        Ok(None) => EntryId::from(prefix.as_str()),
        Err(err) => return report(renderer, out, Err(err)),
    };

    if session.state().ledger.find(&id).is_some()
        && !confirm.confirm(&format!("Delete entry {}?", id.short()))?
    {
        return renderer.write_notices(out, &[Notice::info("nothing deleted")]);
    }

    let result = session.dispatch(Action::Remove(id));
    report(renderer, out, result)
}

#[instrument(skip_all)]
fn cmd_reset<S: KvStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    confirm: &mut dyn Confirm,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command reset");

    let count = session.state().ledger.len();
    let prompt = format!("Delete ALL {count} recorded oil changes? This cannot be undone.");
    if !confirm.confirm(&prompt)? {
        return renderer.write_notices(out, &[Notice::info("nothing deleted")]);
    }

    let result = session.dispatch(Action::Reset);
    report(renderer, out, result)
}

fn cmd_settings<S: KvStore, W: Write>(
    session: &Session<S>,
    cfg: &Config,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    renderer.write_settings(out, &session.state().settings, cfg)
}

#[instrument(skip_all)]
fn cmd_set<S: KvStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command set");

    let result = SettingsPatch::parse_assignments(args)
        .and_then(|patch| session.dispatch(Action::UpdateSettings(patch)));
    report(renderer, out, result)
}

#[instrument(skip_all)]
fn cmd_export<S: KvStore, W: Write>(
    session: &Session<S>,
    renderer: &Renderer,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command export");

    let today = session.today();
    let target = export::resolve_target(args.first().map(Path::new), today);
    let state = session.state();
    export::write_export(&state.ledger, &state.settings, today, &target)?;

    renderer.write_notices(
        out,
        &[Notice::success(format!(
            "exported {} entries to {}",
            state.ledger.len(),
            target.display()
        ))],
    )
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Usage: oli [-v|-q] [--olirc PATH] [--data DIR] [--rc KEY=VALUE] [-y] <command> [args]\n\
         \n\
         Commands:\n\
         \x20 status                         next due dates and statistics (default)\n\
         \x20 add <engine|differential> <DATE> [NOTE...]\n\
         \x20                                record an oil change; DATE is YYYY-MM-DD,\n\
         \x20                                today, yesterday or Nd (days ago)\n\
         \x20 history                        every recorded change, newest first\n\
         \x20 delete <ID>                    remove one entry (unique id prefix)\n\
         \x20 reset                          remove all recorded changes\n\
         \x20 settings                       show intervals and rc values\n\
         \x20 set KEY=VALUE...               engine=, differential= (1-365 days),\n\
         \x20                                reminder= (1, 2, 3, 7), notifications=on|off\n\
         \x20 export [PATH]                  write history as a JSON backup\n\
         \x20 version"
    )?;
    Ok(())
}
