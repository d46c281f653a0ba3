//! Slash commands, as typed into a group chat.
//!
//! `handle` never fails: every problem becomes a reply explaining it.

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use crate::config::AppConfig;
use crate::domain::{Day, ParseDayError};
use crate::format;
use crate::jobs::Notifier;
use crate::solver::GenerationError;
use crate::store::{Change, DayList, Store, StoreError};

const HELP: &str = "Hi! I manage the weekly shift rota.\n\n\
Commands:\n\
/week - show the current week\n\
/today - show today's shift\n\
/absence [Name] [day] - record an absence (e.g. /absence Fede tuesday)\n\
/preference [Name] [day] - record a preferred day (e.g. /preference Marti thursday)\n\
/clear_absence [Name] [day] - remove an absence\n\
/clear_preference [Name] [day] - remove a preferred day\n\
/regenerate - generate a new week honouring absences and preferences\n\
/state - show absences, preferences and stored weeks\n\
/help - this message\n\n\
Italian names work too: /settimana, /oggi, /assenza, /preferenza, /rigenera, /stato.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Week,
    Today,
    Regenerate,
    State,
    Edit {
        list: DayList,
        remove: bool,
        worker: String,
        day: Day,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("not a command")]
    NotACommand,
    #[error("unknown command: /{0}")]
    Unknown(String),
    #[error("usage: /{0} [Name] [day]")]
    Usage(&'static str),
    #[error(transparent)]
    Day(#[from] ParseDayError),
}

impl Command {
    /// Parses `/name args…`. A `@bot` suffix on the command name is ignored.
    ///
    /// ```
    /// use weekly_rota::commands::Command;
    ///
    /// assert_eq!(Command::parse("/week@rota_bot").unwrap(), Command::Week);
    /// assert!(Command::parse("/absence Fede").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut tokens = text.split_whitespace();
        let head = tokens
            .next()
            .and_then(|t| t.strip_prefix('/'))
            .ok_or(CommandError::NotACommand)?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        let edit = |list: DayList,
                    remove: bool,
                    usage: &'static str,
                    mut args: std::str::SplitWhitespace|
         -> Result<Command, CommandError> {
            let worker = args.next().ok_or(CommandError::Usage(usage))?.to_string();
            let day_text = args.collect::<Vec<_>>().join(" ");
            if day_text.is_empty() {
                return Err(CommandError::Usage(usage));
            }
            Ok(Command::Edit {
                list,
                remove,
                worker,
                day: day_text.parse()?,
            })
        };

        match name.as_str() {
            "start" | "help" | "aiuto" => Ok(Command::Help),
            "week" | "settimana" => Ok(Command::Week),
            "today" | "oggi" => Ok(Command::Today),
            "regenerate" | "rigenera" => Ok(Command::Regenerate),
            "state" | "stato" => Ok(Command::State),
            "absence" | "assenza" => edit(DayList::Absences, false, "absence", tokens),
            "preference" | "preferenza" => edit(DayList::Preferences, false, "preference", tokens),
            "clear_absence" => edit(DayList::Absences, true, "clear_absence", tokens),
            "clear_preference" => edit(DayList::Preferences, true, "clear_preference", tokens),
            _ => Err(CommandError::Unknown(name)),
        }
    }
}

/// Parses and runs one command, returning the reply text.
///
/// A regenerated week is also announced through `notifier`.
pub fn handle(
    store: &Store,
    config: &AppConfig,
    notifier: &dyn Notifier,
    text: &str,
    now: DateTime<Utc>,
) -> String {
    match Command::parse(text) {
        Ok(command) => execute(store, config, notifier, &command, now),
        Err(CommandError::Day(_)) => {
            "Unknown day. Use e.g. monday, tuesday, ... (Italian names work too).".to_string()
        }
        Err(CommandError::Usage(name)) => {
            format!("Usage: /{name} [Name] [day]. Example: /{name} Fede tuesday")
        }
        Err(CommandError::NotACommand | CommandError::Unknown(_)) => {
            "Unknown command. Use /help for the list of commands.".to_string()
        }
    }
}

/// Runs a parsed command against the store.
pub fn execute(
    store: &Store,
    config: &AppConfig,
    notifier: &dyn Notifier,
    command: &Command,
    now: DateTime<Utc>,
) -> String {
    match command {
        Command::Help => HELP.to_string(),
        Command::Week => match store.latest() {
            Some(record) => format::format_week_with_header(&record),
            None => "No week has been generated yet: use /regenerate.".to_string(),
        },
        Command::Today => match store.latest() {
            Some(record) => {
                let offset = config.offset().unwrap_or_else(|_| utc());
                format::format_day(&record, format::today(now, offset))
            }
            None => "No week available. Use /regenerate.".to_string(),
        },
        Command::State => format::format_state(&store.state()),
        Command::Regenerate => match store.regenerate(&config.solver) {
            Ok((record, _)) => {
                let text = format!("*New week generated:*\n\n{}", format::format_week(&record));
                notifier.announce(&text);
                text
            }
            Err(e) => failure_reply(store, &e),
        },
        Command::Edit {
            list,
            remove,
            worker,
            day,
        } => {
            let result = if *remove {
                store.remove_day(*list, worker, *day)
            } else {
                store.add_day(*list, worker, *day)
            };
            match result {
                Ok(change) => edit_reply(store, *list, change, worker, *day),
                Err(e) => failure_reply(store, &e),
            }
        }
    }
}

fn edit_reply(store: &Store, list: DayList, change: Change, worker: &str, day: Day) -> String {
    let name = store.resolve_worker(worker).unwrap_or(worker);
    match (list, change) {
        (DayList::Absences, Change::Added) => format!("Absence recorded: *{name}* -> *{day}*"),
        (DayList::Absences, Change::AlreadyPresent) => {
            format!("{name} is already marked absent on {day}.")
        }
        (DayList::Absences, Change::Removed) => format!("Absence removed: *{name}* -> *{day}*"),
        (DayList::Absences, Change::NotPresent) => {
            format!("{name} is not marked absent on {day}.")
        }
        (DayList::Preferences, Change::Added) => {
            format!("Preference saved: *{name}* -> *{day}*")
        }
        (DayList::Preferences, Change::AlreadyPresent) => {
            format!("{name} already prefers {day}.")
        }
        (DayList::Preferences, Change::Removed) => {
            format!("Preference removed: *{name}* -> *{day}*")
        }
        (DayList::Preferences, Change::NotPresent) => {
            format!("{name} has no preference for {day}.")
        }
    }
}

fn failure_reply(store: &Store, error: &StoreError) -> String {
    match error {
        StoreError::UnknownWorker(_) => {
            format!("Unknown name. Use one of: {}", store.roster().join(", "))
        }
        StoreError::Generation(GenerationError::NoFeasibleAssignment { blocked }) => format!(
            "Could not generate a week: absences leave no valid days for {}. Check the absences.",
            blocked.join(", ")
        ),
        StoreError::Generation(GenerationError::GenerationExhausted { .. }) => {
            "Could not find a valid week with the current absences and preferences. Try /regenerate again."
                .to_string()
        }
        StoreError::Io { .. } | StoreError::Json { .. } => {
            tracing::error!(error = %error, "Command failed on storage");
            "Storage error, the change was not saved.".to_string()
        }
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Announcements;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn setup() -> (Store, AppConfig, PathBuf) {
        let dir = std::env::temp_dir().join(format!("rota-cmd-{}", uuid::Uuid::new_v4()));
        let config = AppConfig {
            data_dir: dir.clone(),
            seed: Some(5),
            ..AppConfig::default()
        };
        let store = Store::open(&dir, config.roster.clone(), config.seed).unwrap();
        (store, config, dir)
    }

    fn run(store: &Store, config: &AppConfig, text: &str, now: DateTime<Utc>) -> String {
        handle(store, config, &Announcements::new(), text, now)
    }

    fn cleanup(dir: PathBuf) {
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/help").unwrap(), Command::Help);
        assert_eq!(Command::parse("/start").unwrap(), Command::Help);
        assert_eq!(Command::parse("  /STATE ").unwrap(), Command::State);
        assert_eq!(
            Command::parse("/absence fede martedì").unwrap(),
            Command::Edit {
                list: DayList::Absences,
                remove: false,
                worker: "fede".into(),
                day: Day::new(1).unwrap(),
            }
        );
        assert_eq!(
            Command::parse("/clear_preference Marti 4").unwrap(),
            Command::Edit {
                list: DayList::Preferences,
                remove: true,
                worker: "Marti".into(),
                day: Day::new(4).unwrap(),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("hello"), Err(CommandError::NotACommand));
        assert_eq!(Command::parse(""), Err(CommandError::NotACommand));
        assert_eq!(Command::parse("/dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(Command::parse("/absence"), Err(CommandError::Usage("absence")));
        assert!(matches!(Command::parse("/preference Fede funday"), Err(CommandError::Day(_))));
    }

    #[test]
    fn test_parse_italian_aliases() {
        assert_eq!(Command::parse("/settimana").unwrap(), Command::Week);
        assert_eq!(Command::parse("/oggi").unwrap(), Command::Today);
        assert_eq!(Command::parse("/rigenera").unwrap(), Command::Regenerate);
        assert_eq!(Command::parse("/stato@rota_bot").unwrap(), Command::State);
        assert_eq!(
            Command::parse("/assenza Fede martedì").unwrap(),
            Command::Edit {
                list: DayList::Absences,
                remove: false,
                worker: "Fede".into(),
                day: Day::new(1).unwrap(),
            }
        );
        assert!(matches!(
            Command::parse("/preferenza Marti giovedì").unwrap(),
            Command::Edit { list: DayList::Preferences, remove: false, .. }
        ));
        assert_eq!(Command::parse("/assenza"), Err(CommandError::Usage("absence")));
    }

    #[test]
    fn test_week_before_generation() {
        let (store, config, dir) = setup();

        let reply = run(&store, &config, "/week", Utc::now());

        assert!(reply.contains("/regenerate"));
        cleanup(dir);
    }

    #[test]
    fn test_absence_flow() {
        let (store, config, dir) = setup();

        let reply = run(&store, &config, "/absence fede tuesday", Utc::now());
        assert_eq!(reply, "Absence recorded: *Fede* -> *Tuesday*");

        let reply = run(&store, &config, "/absence Fede mar", Utc::now());
        assert_eq!(reply, "Fede is already marked absent on Tuesday.");

        let reply = run(&store, &config, "/state", Utc::now());
        assert!(reply.contains("Fede (Tuesday)"));

        let reply = run(&store, &config, "/clear_absence Fede tuesday", Utc::now());
        assert_eq!(reply, "Absence removed: *Fede* -> *Tuesday*");
        cleanup(dir);
    }

    #[test]
    fn test_unknown_inputs_get_replies() {
        let (store, config, dir) = setup();

        assert!(run(&store, &config, "/absence Nobody monday", Utc::now())
            .starts_with("Unknown name"));
        assert!(run(&store, &config, "/absence Fede someday", Utc::now())
            .starts_with("Unknown day"));
        assert!(run(&store, &config, "/preference Fede", Utc::now()).starts_with("Usage"));
        assert!(run(&store, &config, "/dance", Utc::now()).starts_with("Unknown command"));
        cleanup(dir);
    }

    #[test]
    fn test_regenerate_then_today() {
        let (store, config, dir) = setup();
        let announcements = Announcements::new();

        let reply = handle(&store, &config, &announcements, "/rigenera", Utc::now());
        assert!(reply.starts_with("*New week generated:*"));
        assert_eq!(reply.matches(", ").count(), 7);
        let announced = announcements.recent();
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].text, reply);

        // 2026-03-02 is a Monday.
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let reply = run(&store, &config, "/today", monday);
        let record = store.latest().unwrap();
        assert_eq!(
            reply,
            format!("*Shift for today (Monday):* {}", record.schedule[0].join(", "))
        );
        cleanup(dir);
    }

    #[test]
    fn test_regenerate_reports_blocked_worker() {
        let (store, config, dir) = setup();
        for day in ["tue", "wed", "thu", "fri", "sat", "sun"] {
            run(&store, &config, &format!("/absence Ros {day}"), Utc::now());
        }

        let announcements = Announcements::new();
        let reply = handle(&store, &config, &announcements, "/regenerate", Utc::now());

        assert!(reply.contains("no valid days for Ros"), "{reply}");
        assert_eq!(store.state().weeks_stored, 0);
        assert!(announcements.recent().is_empty());
        cleanup(dir);
    }
}
