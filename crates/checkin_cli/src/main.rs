//! Operator CLI for event check-in.
//!
//! # Responsibility
//! - Wire seed files, config and storage into one ledger per invocation.
//! - Run the scan loop over stdin and print reports to stdout.
//!
//! Attendance lives in SQLite when `--db` is given, otherwise in a JSON
//! snapshot file that is loaded on start and merged back after mutating
//! commands, including ones that fail partway.

use checkin_core::db::open_db;
use checkin_core::{
    default_log_level, init_logging, load_snapshot, load_snapshot_if_exists, save_snapshot,
    save_snapshot_merged, to_csv, AggregationEngine, AttendanceLedger, AttendanceStore,
    BadgeCatalog, BadgeDeriver, ChapterFilter, CheckinConfig, EventId, InMemoryAttendanceStore,
    LineScanSource, ScanConfig, ScanControl, ScanDriver, ScanOutcome, SqliteAttendanceStore,
    StaticEventDirectory, StaticMemberDirectory,
};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "checkin")]
#[command(about = "QR event check-in and attendance reports")]
#[command(version)]
struct Args {
    /// SQLite attendance database
    #[arg(long, env = "CHECKIN_DB")]
    db: Option<PathBuf>,

    /// JSON attendance snapshot used when no database is given
    #[arg(long, env = "CHECKIN_SNAPSHOT", default_value = "attendance.json")]
    snapshot: PathBuf,

    /// Event directory seed (JSON)
    #[arg(long, env = "CHECKIN_EVENTS")]
    events: PathBuf,

    /// Member directory seed (JSON)
    #[arg(long, env = "CHECKIN_MEMBERS")]
    members: Option<PathBuf>,

    /// Static badge catalog (JSON)
    #[arg(long, env = "CHECKIN_CATALOG")]
    catalog: Option<PathBuf>,

    /// Runtime config (JSON); defaults apply when absent
    #[arg(long, env = "CHECKIN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for rolling log files; logging is off when unset
    #[arg(long, env = "CHECKIN_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, env = "CHECKIN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read one payload per line from stdin and check members in
    Scan {
        /// Event used for payloads that carry no event id
        #[arg(long)]
        event: Option<EventId>,
    },
    /// Print member, event and attendance totals
    Census,
    /// Write a CSV report to stdout
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },
    /// List badges for one member
    Badges {
        #[arg(long)]
        member: String,
    },
    /// Write the current attendance to a snapshot file
    ExportSnapshot { path: PathBuf },
    /// Union a snapshot file into the current attendance
    ImportSnapshot { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ReportKind {
    /// Attendees of one event
    Attendance {
        #[arg(long)]
        event: EventId,
        /// Keep attendees whose name or id contains this text (any case)
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Members ranked by events attended
    Engagement {
        #[arg(long, default_value = "all")]
        chapter: String,
    },
}

struct Context {
    config: CheckinConfig,
    members: StaticMemberDirectory,
    catalog: BadgeCatalog,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> CliResult<()> {
    if let Some(log_dir) = &args.log_dir {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &absolute(log_dir)?.to_string_lossy())?;
    }

    let config = match &args.config {
        Some(path) => CheckinConfig::load_or_default(path)?,
        None => CheckinConfig::default(),
    };
    let events = StaticEventDirectory::load(&args.events)?;
    let members = match &args.members {
        Some(path) => StaticMemberDirectory::load(path)?,
        None => StaticMemberDirectory::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => BadgeCatalog::load(path)?,
        None => BadgeCatalog::default(),
    };
    info!(
        "event=cli_start module=cli status=ok events={} command={}",
        events.len(),
        command_name(&args.command)
    );

    let context = Context {
        config,
        members,
        catalog,
    };

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    match &args.db {
        Some(db_path) => {
            let conn = open_db(db_path)?;
            let store = SqliteAttendanceStore::try_new(&conn)?;
            let ledger = AttendanceLedger::new(store, events)
                .with_retry_policy(context.config.retry);
            dispatch(&args.command, &ledger, &context, stdin.lock(), &mut stdout)
        }
        None => {
            let store = match load_snapshot_if_exists(&args.snapshot)? {
                Some(snapshot) => InMemoryAttendanceStore::from_snapshot(&snapshot),
                None => InMemoryAttendanceStore::new(),
            };
            let ledger = AttendanceLedger::new(store, events)
                .with_retry_policy(context.config.retry);
            run_with_snapshot(
                &args.command,
                &ledger,
                &context,
                &args.snapshot,
                stdin.lock(),
                &mut stdout,
            )
        }
    }
}

/// Runs one command against a snapshot-file ledger and merges the result back.
///
/// Mutating commands persist even when they fail: every check-in reported
/// before the failure is already final.
fn run_with_snapshot<S: AttendanceStore>(
    command: &Command,
    ledger: &AttendanceLedger<S, StaticEventDirectory>,
    context: &Context,
    snapshot_path: &Path,
    input: impl BufRead,
    out: &mut impl Write,
) -> CliResult<()> {
    let outcome = dispatch(command, ledger, context, input, out);
    if !command.mutates_attendance() {
        return outcome;
    }

    let persisted = persist_snapshot(ledger, snapshot_path);
    match (outcome, persisted) {
        (Ok(()), persisted) => persisted,
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(save_err)) => {
            error!("event=snapshot_persist module=cli status=error error={save_err}");
            Err(format!("{err}; attendance snapshot was not saved: {save_err}").into())
        }
    }
}

fn persist_snapshot<S: AttendanceStore>(
    ledger: &AttendanceLedger<S, StaticEventDirectory>,
    snapshot_path: &Path,
) -> CliResult<()> {
    let written = save_snapshot_merged(snapshot_path, &ledger.snapshot()?)?;
    info!(
        "event=snapshot_persist module=cli status=ok pairs={}",
        written.pair_count()
    );
    Ok(())
}

/// Runs one command, reading scans from `input` and writing results to `out`.
fn dispatch<S: AttendanceStore>(
    command: &Command,
    ledger: &AttendanceLedger<S, StaticEventDirectory>,
    context: &Context,
    input: impl BufRead,
    out: &mut impl Write,
) -> CliResult<()> {
    match command {
        Command::Scan { event } => {
            let mut scan_config = context.config.scan.clone();
            if event.is_some() {
                scan_config.event_fallback = *event;
            }
            scan(ledger, scan_config, input, out)
        }
        Command::Census => {
            let engine = AggregationEngine::new(ledger, &context.members);
            let census = engine.census()?;
            writeln!(out, "members={}", census.total_members)?;
            writeln!(out, "events={}", census.total_events)?;
            writeln!(out, "attendance={}", census.total_attendance)?;
            for summary in engine.per_event_summary()? {
                writeln!(
                    out,
                    "event {} {} ({}) attendees={}",
                    summary.event.id, summary.event.title, summary.event.date, summary.attendee_count
                )?;
            }
            Ok(())
        }
        Command::Report { kind } => {
            let engine = AggregationEngine::new(ledger, &context.members);
            let rows = match kind {
                ReportKind::Attendance { event, query } => {
                    engine.matching_attendance_report_rows(*event, query)?
                }
                ReportKind::Engagement { chapter } => {
                    engine.engagement_report_rows(&ChapterFilter::parse(chapter))?
                }
            };
            writeln!(out, "{}", to_csv(&rows)?)?;
            Ok(())
        }
        Command::Badges { member } => {
            let deriver = BadgeDeriver::new(ledger, &context.catalog)
                .with_default_icon(context.config.default_badge_icon.clone());
            for badge in deriver.derive_badges_for_member(member)? {
                writeln!(
                    out,
                    "{} {} [{}] {} {}",
                    badge.icon, badge.title, badge.id, badge.date, badge.details
                )?;
            }
            Ok(())
        }
        Command::ExportSnapshot { path } => {
            save_snapshot(path, &ledger.snapshot()?)?;
            Ok(())
        }
        Command::ImportSnapshot { path } => {
            let added = ledger.merge_snapshot(&load_snapshot(path)?)?;
            writeln!(out, "imported {added} new check-ins")?;
            Ok(())
        }
    }
}

fn scan<S: AttendanceStore>(
    ledger: &AttendanceLedger<S, StaticEventDirectory>,
    config: ScanConfig,
    input: impl BufRead,
    out: &mut impl Write,
) -> CliResult<()> {
    let mut source = LineScanSource::new(input);
    let control = ScanControl::new();
    control.enable();

    let mut driver = ScanDriver::new(ledger, config);
    let mut write_result = Ok(());
    let run_result = driver.run(&mut source, &control, |report| {
        if write_result.is_err() {
            return;
        }
        write_result = match &report.outcome {
            ScanOutcome::CheckIn {
                event_id,
                member_id,
                outcome,
            } => writeln!(
                out,
                "{} event={event_id} member={member_id} {}",
                outcome.as_str(),
                report.outcome.status_text()
            ),
            ScanOutcome::DecodeFailed(_) => {
                writeln!(out, "error {}", report.outcome.status_text())
            }
        };
    });
    let summary = run_result?;
    write_result?;

    eprintln!(
        "processed={} granted={} duplicates={} rejected={} unreadable={}",
        summary.processed,
        summary.granted,
        summary.duplicates,
        summary.rejected,
        summary.decode_failures
    );
    Ok(())
}

impl Command {
    /// Whether the command can add check-ins to the ledger.
    fn mutates_attendance(&self) -> bool {
        matches!(self, Self::Scan { .. } | Self::ImportSnapshot { .. })
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Scan { .. } => "scan",
        Command::Census => "census",
        Command::Report { .. } => "report",
        Command::Badges { .. } => "badges",
        Command::ExportSnapshot { .. } => "export_snapshot",
        Command::ImportSnapshot { .. } => "import_snapshot",
    }
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::{run_with_snapshot, Command, Context, ReportKind};
    use checkin_core::{
        load_snapshot, AttendanceLedger, BadgeCatalog, CheckinConfig, Event,
        InMemoryAttendanceStore, StaticEventDirectory, StaticMemberDirectory,
    };
    use std::path::Path;

    fn context() -> Context {
        let mut config = CheckinConfig::default();
        config.scan.sample_interval_ms = 0;
        Context {
            config,
            members: StaticMemberDirectory::default(),
            catalog: BadgeCatalog::default(),
        }
    }

    fn scanner() -> AttendanceLedger<InMemoryAttendanceStore, StaticEventDirectory> {
        let events = StaticEventDirectory::new([Event::new(1, "Orientation", "2025-01-10", "Gym")])
            .unwrap();
        AttendanceLedger::new(InMemoryAttendanceStore::new(), events)
    }

    fn scan(
        ledger: &AttendanceLedger<InMemoryAttendanceStore, StaticEventDirectory>,
        snapshot: &Path,
        input: &[u8],
    ) -> (Result<(), String>, String) {
        let mut out = Vec::new();
        let result = run_with_snapshot(
            &Command::Scan { event: None },
            ledger,
            &context(),
            snapshot,
            input,
            &mut out,
        )
        .map_err(|err| err.to_string());
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn grants_before_a_capture_failure_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        let ledger = scanner();

        let (result, out) = scan(
            &ledger,
            &path,
            b"{\"memberId\":\"M1\",\"eventId\":1}\n\xff\xfe\n",
        );

        assert!(out.starts_with("granted event=1 member=M1"));
        assert!(result.unwrap_err().contains("capture failed"));
        assert!(load_snapshot(&path).unwrap().contains(1, "M1"));
    }

    #[test]
    fn scanners_sharing_a_snapshot_file_do_not_erase_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        let scanner_a = scanner();
        let scanner_b = scanner();

        let (result_b, _) = scan(&scanner_b, &path, b"{\"memberId\":\"B2\",\"eventId\":1}\n");
        let (result_a, _) = scan(&scanner_a, &path, b"{\"memberId\":\"A1\",\"eventId\":1}\n");
        result_b.unwrap();
        result_a.unwrap();

        let on_disk = load_snapshot(&path).unwrap();
        assert!(on_disk.contains(1, "A1"));
        assert!(on_disk.contains(1, "B2"));
    }

    #[test]
    fn read_only_commands_leave_snapshot_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        let ledger = scanner();
        ledger.record_attendance(1, "M1").unwrap();
        let mut out = Vec::new();

        run_with_snapshot(
            &Command::Report {
                kind: ReportKind::Attendance {
                    event: 1,
                    query: "m1".to_string(),
                },
            },
            &ledger,
            &context(),
            &path,
            &b""[..],
            &mut out,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "event,date,memberId,name,chapter\nOrientation,2025-01-10,M1,M1,Unknown\n"
        );
        assert!(!path.exists());
    }
}
