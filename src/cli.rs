use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::{Context, bail};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;

use calbridge::{
    calendar::{EventDetails, EventId, EventUpdate, HostZone, NewEvent},
    permissions::{
        CALENDAR_CAPABILITIES, Capability, GrantDialog, GrantTable, PermissionBroker, RequestCode,
    },
    storage::{CalendarStore, Config},
    CalendarAccess,
};

const USAGE: &str = "\
Usage: calbridge <command> [options]

Commands:
  add      --title T [--description D] --days N --at HH:MM [--duration MIN] [--remind MIN] [--tz ZONE]
  add-at   --title T [--description D] --date YYYY/MM/DD --at HH:MM [--duration MIN] [--remind MIN] [--tz ZONE]
  update   <id> --title T [--description D] (--days N | --date YYYY/MM/DD) --at HH:MM [--duration MIN]
  delete   <id>
  show     <id> [--json]
  account
  grant
  demo";

/// Permission flows started from the command line share one code.
const CLI_REQUEST_CODE: RequestCode = RequestCode(1001);
const HOUR_MS: i64 = 60 * 60 * 1000;
const MINUTE_MS: i64 = 60 * 1000;
/// Longest accepted `--duration`: one leap year.
const MAX_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// Which scheduling flags a subcommand takes.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EventForm {
    Relative,
    Absolute,
    Update,
}

impl EventForm {
    fn command(self) -> &'static str {
        match self {
            EventForm::Relative => "add",
            EventForm::Absolute => "add-at",
            EventForm::Update => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum When {
    Relative { days: i64, at: NaiveTime },
    Absolute { date: NaiveDate, at: NaiveTime },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventArgs {
    pub title: String,
    pub description: String,
    pub when: When,
    pub duration_minutes: i64,
    pub remind: Option<u32>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(EventArgs),
    Update { id: EventId, args: EventArgs },
    Delete(EventId),
    Show { id: EventId, json: bool },
    Account,
    Grant,
    Demo,
    Help,
}

pub fn parse_command<I: IntoIterator<Item = String>>(args: I) -> Result<Command, String> {
    let mut args = args.into_iter();
    let Some(name) = args.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = args.collect();

    match name.as_str() {
        "add" => Ok(Command::Add(parse_event_args(EventForm::Relative, &rest)?)),
        "add-at" => Ok(Command::Add(parse_event_args(EventForm::Absolute, &rest)?)),
        "update" => {
            let (id, rest) = split_id(&rest)?;
            Ok(Command::Update { id, args: parse_event_args(EventForm::Update, rest)? })
        }
        "delete" => {
            let (id, rest) = split_id(&rest)?;
            reject_extra(rest)?;
            Ok(Command::Delete(id))
        }
        "show" => {
            let (id, rest) = split_id(&rest)?;
            let json = match rest {
                [] => false,
                [flag] if flag == "--json" => true,
                _ => return Err(format!("Unexpected arguments: {}", rest.join(" "))),
            };
            Ok(Command::Show { id, json })
        }
        "account" => reject_extra(&rest).map(|_| Command::Account),
        "grant" => reject_extra(&rest).map(|_| Command::Grant),
        "demo" => reject_extra(&rest).map(|_| Command::Demo),
        "--help" | "-h" | "help" => Ok(Command::Help),
        _ => Err(format!("Unknown command: {}", name)),
    }
}

pub fn usage() -> &'static str {
    USAGE
}

fn split_id(args: &[String]) -> Result<(EventId, &[String]), String> {
    let (first, rest) = args.split_first().ok_or("Missing event id")?;
    let id = first
        .parse::<i64>()
        .map_err(|_| format!("Invalid event id '{}'", first))?;
    Ok((EventId(id), rest))
}

fn reject_extra(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(format!("Unexpected arguments: {}", args.join(" ")))
    }
}

fn parse_event_args(form: EventForm, args: &[String]) -> Result<EventArgs, String> {
    let mut title = None;
    let mut description = String::new();
    let mut days = None;
    let mut date = None;
    let mut at = None;
    let mut duration_minutes = 60;
    let mut remind = None;
    let mut time_zone = None;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("Missing value for {}", flag))
        };
        let applies = match flag.as_str() {
            "--days" => form != EventForm::Absolute,
            "--date" => form != EventForm::Relative,
            "--remind" | "--tz" => form != EventForm::Update,
            _ => true,
        };
        if !applies {
            return Err(format!("{} does not take {}", form.command(), flag));
        }
        match flag.as_str() {
            "--title" => title = Some(value()?),
            "--description" => description = value()?,
            "--days" => {
                let v = value()?;
                days = Some(v.parse::<i64>().map_err(|_| format!("Invalid day offset '{}'", v))?);
            }
            "--date" => {
                let v = value()?;
                date = Some(
                    NaiveDate::parse_from_str(&v, "%Y/%m/%d")
                        .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", v))?,
                );
            }
            "--at" => {
                let v = value()?;
                at = Some(
                    NaiveTime::parse_from_str(&v, "%H:%M")
                        .map_err(|_| format!("Invalid time '{}'. Use HH:MM.", v))?,
                );
            }
            "--duration" => {
                let v = value()?;
                duration_minutes = v
                    .parse::<i64>()
                    .ok()
                    .filter(|m| (1..=MAX_DURATION_MINUTES).contains(m))
                    .ok_or_else(|| {
                        format!("Invalid duration '{}'. Use 1 to {} minutes.", v, MAX_DURATION_MINUTES)
                    })?;
            }
            "--remind" => {
                let v = value()?;
                remind = Some(v.parse::<u32>().map_err(|_| format!("Invalid reminder offset '{}'", v))?);
            }
            "--tz" => time_zone = Some(value()?),
            _ => return Err(format!("Unknown option: {}", flag)),
        }
    }

    let at = at.ok_or("Missing --at HH:MM")?;
    let when = match (days, date) {
        (Some(days), None) => When::Relative { days, at },
        (None, Some(date)) => When::Absolute { date, at },
        (Some(_), Some(_)) => return Err("Use either --days or --date, not both".to_string()),
        (None, None) => return Err("Missing --days N or --date YYYY/MM/DD".to_string()),
    };

    Ok(EventArgs {
        title: title.ok_or("Missing --title")?,
        description,
        when,
        duration_minutes,
        remind,
        time_zone,
    })
}

/// Prints the grant prompt. The answer is read by [`Session::ensure_permissions`].
struct TerminalDialog;

impl GrantDialog for TerminalDialog {
    fn show(&self, code: RequestCode, capabilities: &[Capability]) {
        let names: Vec<&str> = capabilities.iter().map(|c| c.name()).collect();
        println!("calbridge needs calendar access ({}) [request {}].", names.join(", "), code);
        print!("Grant access? [y/N] ");
        io::stdout().flush().ok();
    }
}

pub struct Session {
    config: Config,
    zone: HostZone,
    grants: Arc<GrantTable>,
    access: CalendarAccess<CalendarStore, Arc<GrantTable>>,
}

impl Session {
    pub fn open() -> anyhow::Result<Self> {
        let config = Config::load_or_create().context("loading config")?;
        let zone = config.host_zone();
        let store = CalendarStore::open(&config.store.database)
            .with_context(|| format!("opening {}", config.store.database.display()))?;
        let grants = Arc::new(config.grant_table());
        let access = CalendarAccess::new(store, Arc::clone(&grants), config.access_settings(&zone));

        tracing::info!("Session opened in zone {}", zone.id());
        Ok(Self { config, zone, grants, access })
    }

    pub async fn run(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Help => println!("{}", USAGE),
            Command::Grant => {
                if self.ensure_permissions().await? {
                    println!("Calendar access granted.");
                } else {
                    println!("Calendar access denied.");
                }
            }
            command => {
                if !self.ensure_permissions().await? {
                    bail!("calendar access was not granted");
                }
                self.run_granted(command).await?;
            }
        }
        Ok(())
    }

    async fn run_granted(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Add(args) => {
                let (start, end) = self.resolve_times(&args)?;
                let remind = args.remind.unwrap_or(self.config.calendar.default_reminder_minutes);
                let id = match &args.time_zone {
                    Some(tz) => self.access.add_event_with_reminder_in_zone(
                        &args.title, &args.description, start, end, remind, tz,
                    )?,
                    None => self.access.add_event_with_reminder(
                        &args.title, &args.description, start, end, remind,
                    )?,
                };
                println!("Created event {} ({} min reminder)", id, remind);
            }
            Command::Update { id, args } => {
                let (start, end) = self.resolve_times(&args)?;
                self.access
                    .update_event(id, &EventUpdate::new(args.title, args.description, start, end))?;
                println!("Updated event {}", id);
            }
            Command::Delete(id) => {
                self.access.delete_event(id)?;
                println!("Deleted event {}", id);
            }
            Command::Show { id, json } => {
                let details = self.access.get_event_details(id)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&details)?);
                } else {
                    println!("{}", format_details(id, &details, &self.zone));
                    for reminder in self.access.provider().reminders_for_event(id)? {
                        println!("  reminder {}: {} min before", reminder.id, reminder.minutes);
                    }
                }
            }
            Command::Account => {
                let id = self.access.get_or_create_calendar_account()?;
                println!("Calendar account {}", id);
            }
            Command::Demo => {
                run_demo(&self.access, &self.zone)?;

                println!("9. Create from a blocking worker thread");
                let store = CalendarStore::open(&self.config.store.database)?;
                let worker = CalendarAccess::new(
                    store,
                    Arc::clone(&self.grants),
                    self.config.access_settings(&self.zone),
                );
                let id = create_off_thread(worker, self.zone).await?;
                println!("   created event {}", id);
            }
            Command::Help | Command::Grant => {}
        }
        Ok(())
    }

    fn resolve_times(&self, args: &EventArgs) -> anyhow::Result<(i64, i64)> {
        let start = match args.when {
            When::Relative { days, at } => self.zone.future_date_time(days, at.hour(), at.minute())?,
            When::Absolute { date, at } => self.zone.date_time(
                date.year(),
                date.month0(),
                date.day(),
                at.hour(),
                at.minute(),
            )?,
        };
        Ok((start, event_end(start, args.duration_minutes)?))
    }

    /// Runs the grant flow if needed and persists the result.
    async fn ensure_permissions(&mut self) -> anyhow::Result<bool> {
        let broker = PermissionBroker::new(Arc::clone(&self.grants), TerminalDialog);
        let Some(request) = self.access.request_calendar_permissions(&broker, CLI_REQUEST_CODE)? else {
            return Ok(true);
        };

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        let granted = matches!(answer.trim(), "y" | "Y" | "yes");
        let results: Vec<(Capability, bool)> =
            CALENDAR_CAPABILITIES.iter().map(|c| (*c, granted)).collect();
        broker.deliver(request.code(), &results);

        let outcome = request.outcome().await?;
        self.config.record_grants(self.grants.granted());
        self.config.save().context("saving granted permissions")?;

        Ok(outcome.all_granted())
    }
}

fn event_end(start: i64, duration_minutes: i64) -> anyhow::Result<i64> {
    duration_minutes
        .checked_mul(MINUTE_MS)
        .and_then(|ms| start.checked_add(ms))
        .with_context(|| format!("a {} minute event starting at {} ends out of range", duration_minutes, start))
}

/// Runs a composite create on the blocking pool, the way async callers use
/// the facade, and awaits the new id.
async fn create_off_thread(
    access: CalendarAccess<CalendarStore, Arc<GrantTable>>,
    zone: HostZone,
) -> anyhow::Result<EventId> {
    let start = zone.future_date_time(3, 8, 0)?;
    let id = tokio::task::spawn_blocking(move || {
        access.add_event_with_reminder(
            "Butter expiry reminder",
            "Created on a worker thread",
            start,
            start + HOUR_MS,
            60,
        )
    })
    .await
    .context("calendar worker did not finish")??;
    Ok(id)
}

fn format_details(id: EventId, details: &EventDetails, host: &HostZone) -> String {
    let tz = details.time_zone.parse::<Tz>().unwrap_or(host.tz());
    let render = |millis: i64| {
        DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| millis.to_string())
    };

    let mut text = format!(
        "Event {}: {}\n  {} - {} ({}, {} min)",
        id,
        details.title,
        render(details.start_millis),
        render(details.end_millis),
        details.time_zone,
        details.duration_minutes()
    );
    if !details.description.is_empty() {
        text.push_str(&format!("\n  {}", details.description));
    }
    text
}

/// Walks through the synchronous call sites. The worker-thread create runs
/// after it from [`Session::run_granted`].
fn run_demo(access: &CalendarAccess<CalendarStore, Arc<GrantTable>>, zone: &HostZone) -> anyhow::Result<()> {
    println!("1. Event tomorrow 09:00 with a one hour reminder");
    let start = zone.future_date_time(1, 9, 0)?;
    let simple = access.add_event_with_reminder(
        "Milk expiry reminder",
        "The milk in the fridge expires tomorrow",
        start,
        start + HOUR_MS,
        60,
    )?;
    println!("   created event {}", simple);

    println!("2. Event in a week, pinned to Asia/Shanghai");
    let start = zone.future_date_time(7, 10, 0)?;
    let zoned = access.add_event_with_reminder_in_zone(
        "Bread expiry reminder",
        "",
        start,
        start + HOUR_MS,
        120,
        "Asia/Shanghai",
    )?;
    println!("   created event {}", zoned);

    println!("3. Step by step: account, event, reminder");
    let calendar = access.get_or_create_calendar_account()?;
    let start = zone.future_date_time(5, 16, 0)?;
    let stepwise = access.insert_event(
        calendar,
        NewEvent::new("Cheese check", "Inspect the cheese", start, start + HOUR_MS, zone.id()),
    )?;
    let reminder = access.add_reminder(stepwise, 60)?;
    println!("   calendar {}, event {}, reminder {}", calendar, stepwise, reminder);

    println!("4. Several reminders on one event");
    let start = zone.future_date_time(14, 10, 0)?;
    let multi = access.add_event_with_reminder("Yogurt expiry", "", start, start + HOUR_MS, 4320)?;
    let extra = access.add_reminders(multi, &[1440, 60])?;
    println!("   event {} with {} reminders", multi, extra.len() + 1);

    println!("5. Fixed date: next December 31st, 23:00");
    let next_year = zone.now().year() + 1;
    let start = zone.date_time(next_year, 11, 31, 23, 0)?;
    let fixed = access.add_event_with_reminder("Year-end pantry sweep", "", start, start + HOUR_MS, 30)?;
    println!("   created event {}", fixed);

    println!("6. Update then read back");
    let start = zone.future_date_time(2, 10, 0)?;
    access.update_event(
        simple,
        &EventUpdate::new("Milk expiry (updated)", "Moved by demo", start, start + HOUR_MS),
    )?;
    let details = access.get_event_details(simple)?;
    println!("{}", format_details(simple, &details, zone));

    println!("7. Delete (twice; the second call also succeeds)");
    access.delete_event(simple)?;
    access.delete_event(simple)?;
    println!("   deleted event {}", simple);

    println!("8. Bulk shelf-life reminders");
    for (item, shelf_life_days) in [("Milk", 7), ("Bread", 3), ("Eggs", 21)] {
        let start = zone.future_date_time(shelf_life_days - 1, 10, 0)?;
        let id = access.add_event_with_reminder(
            &format!("{} expires tomorrow", item),
            &format!("Shelf life: {} days", shelf_life_days),
            start,
            start + HOUR_MS,
            60,
        )?;
        println!("   {} -> event {}", item, id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calbridge::AccessSettings;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn no_arguments_prints_help() {
        assert_eq!(parse_command(Vec::new()), Ok(Command::Help));
    }

    #[test]
    fn parses_relative_add() {
        let command = parse_command(args("add --title Milk --days 3 --at 09:30 --remind 120")).unwrap();

        assert_eq!(
            command,
            Command::Add(EventArgs {
                title: "Milk".to_string(),
                description: String::new(),
                when: When::Relative { days: 3, at: time(9, 30) },
                duration_minutes: 60,
                remind: Some(120),
                time_zone: None,
            })
        );
    }

    #[test]
    fn parses_absolute_add_with_zone() {
        let command = parse_command(args(
            "add-at --title Bread --date 2024/11/15 --at 14:30 --duration 30 --tz Asia/Shanghai",
        ))
        .unwrap();

        let Command::Add(event) = command else {
            panic!("expected add");
        };
        assert_eq!(
            event.when,
            When::Absolute {
                date: NaiveDate::from_ymd_opt(2024, 11, 15).unwrap(),
                at: time(14, 30),
            }
        );
        assert_eq!(event.duration_minutes, 30);
        assert_eq!(event.time_zone.as_deref(), Some("Asia/Shanghai"));
    }

    #[test]
    fn negative_day_offsets_are_allowed() {
        let command = parse_command(args("add --title Late --days -1 --at 10:00")).unwrap();

        let Command::Add(event) = command else {
            panic!("expected add");
        };
        assert_eq!(event.when, When::Relative { days: -1, at: time(10, 0) });
    }

    #[test]
    fn parses_update_with_id() {
        let command = parse_command(args("update 42 --title Cheese --days 2 --at 10:00")).unwrap();

        assert!(matches!(command, Command::Update { id: EventId(42), .. }));
    }

    #[test]
    fn parses_show_json() {
        assert_eq!(
            parse_command(args("show 7 --json")),
            Ok(Command::Show { id: EventId(7), json: true })
        );
    }

    #[test]
    fn rejects_missing_time() {
        assert!(parse_command(args("add --title Milk --days 1")).is_err());
    }

    #[test]
    fn rejects_both_days_and_date() {
        let result = parse_command(args("add --title Milk --days 1 --date 2025/01/01 --at 10:00"));

        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_id_and_unknown_command() {
        assert!(parse_command(args("delete abc")).is_err());
        assert!(parse_command(args("frobnicate")).is_err());
    }

    #[test]
    fn add_takes_offsets_and_add_at_takes_dates() {
        assert!(parse_command(args("add --title Milk --date 2025/01/01 --at 10:00")).is_err());
        assert!(parse_command(args("add-at --title Milk --days 1 --at 10:00")).is_err());
    }

    #[test]
    fn update_rejects_reminder_and_zone_flags() {
        assert_eq!(
            parse_command(args("update 3 --title Milk --days 1 --at 10:00 --remind 30")),
            Err("update does not take --remind".to_string())
        );
        assert!(parse_command(args("update 3 --title Milk --days 1 --at 10:00 --tz UTC")).is_err());
        assert!(parse_command(args("update 3 --title Milk --date 2025/01/01 --at 10:00")).is_ok());
    }

    #[test]
    fn duration_is_bounded() {
        let too_long = parse_command(args(
            "add --title X --days 1 --at 10:00 --duration 9000000000000000",
        ));
        assert!(too_long.is_err());

        let longest = format!("add --title X --days 1 --at 10:00 --duration {}", MAX_DURATION_MINUTES);
        let Command::Add(event) = parse_command(args(&longest)).unwrap() else {
            panic!("expected add");
        };
        assert_eq!(event.duration_minutes, MAX_DURATION_MINUTES);
    }

    #[test]
    fn event_end_overflow_is_an_error() {
        assert_eq!(event_end(1_000, 2).unwrap(), 121_000);
        assert!(event_end(0, 9_000_000_000_000_000).is_err());
        assert!(event_end(i64::MAX - 1, 1).is_err());
    }

    #[test]
    fn worker_thread_create_lands_in_the_shared_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.db");
        let zone = HostZone::new(Tz::UTC);
        let access = CalendarAccess::new(
            CalendarStore::open(&path).unwrap(),
            Arc::new(GrantTable::unenforced()),
            AccessSettings::for_zone(zone.id()),
        );

        let id = tokio_test::block_on(create_off_thread(access, zone)).unwrap();

        let reader = CalendarAccess::new(
            CalendarStore::open(&path).unwrap(),
            GrantTable::unenforced(),
            AccessSettings::for_zone(zone.id()),
        );
        let details = reader.get_event_details(id).unwrap();
        assert_eq!(details.title, "Butter expiry reminder");
        assert_eq!(reader.provider().reminders_for_event(id).unwrap().len(), 1);
    }

    #[test]
    fn details_render_in_event_zone() {
        let details = EventDetails {
            title: "Milk".to_string(),
            description: "Fridge".to_string(),
            start_millis: 0,
            end_millis: HOUR_MS,
            time_zone: "Asia/Shanghai".to_string(),
        };

        let text = format_details(EventId(1), &details, &HostZone::new(Tz::UTC));

        assert!(text.contains("1970-01-01 08:00 - 1970-01-01 09:00 (Asia/Shanghai, 60 min)"));
        assert!(text.contains("Fridge"));
    }
}
