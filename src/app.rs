//! Terminal front-end: one subcommand per learner action.
//! The interactive session walks the due set first, then introduces catalog
//! items the learner has never reviewed.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use tracing::info;

use review_scheduler::database::{ReviewStore, SqliteStore, db};
use review_scheduler::export::json::{apply_import, export_json_to_path, import_json};
use review_scheduler::models::{Catalog, ContentResolver, ItemKey, LearnerId, ReviewItem};
use review_scheduler::{ReviewEngine, ReviewError, SessionController};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the items due now, most overdue first
    Due,
    /// Record one review: quality is 1 (forgot), 3 (hard) or 5 (easy)
    Review {
        level: u32,
        lesson_type: String,
        item_id: String,
        quality: u8,
    },
    /// Show progress counters
    Stats,
    /// Review due items interactively, then learn new ones
    Session {
        /// New catalog items to introduce after the due items
        #[arg(long, default_value_t = 5)]
        new: usize,
    },
    /// Move the simulated date forward by one day
    AdvanceDay,
    /// Write all review records to a JSON file
    Export { path: PathBuf },
    /// Merge review records from a JSON file
    Import { path: PathBuf },
}

pub struct App {
    engine: Arc<ReviewEngine>,
    store: Arc<SqliteStore>,
    catalog: Arc<Catalog>,
    learner: LearnerId,
    max_write_attempts: u32,
}

impl App {
    pub fn new(
        engine: Arc<ReviewEngine>,
        store: Arc<SqliteStore>,
        catalog: Catalog,
        learner: LearnerId,
        max_write_attempts: u32,
    ) -> Self {
        Self {
            engine,
            store,
            catalog: Arc::new(catalog),
            learner,
            max_write_attempts,
        }
    }

    pub fn run(&self, command: Command) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        match command {
            Command::Due => self.show_due(&mut stdout.lock()),
            Command::Review {
                level,
                lesson_type,
                item_id,
                quality,
            } => {
                let key = ItemKey::new(level, lesson_type, item_id);
                self.review(&key, quality, &mut stdout.lock())
            }
            Command::Stats => self.show_stats(&mut stdout.lock()),
            Command::Session { new } => {
                self.run_session(&mut stdin.lock(), &mut stdout.lock(), new)
            }
            Command::AdvanceDay => self.advance_day(&mut stdout.lock()),
            Command::Export { path } => self.export(&path, &mut stdout.lock()),
            Command::Import { path } => self.import(&path, &mut stdout.lock()),
        }
    }

    fn display_text(&self, key: &ItemKey) -> String {
        self.catalog
            .resolve_content(key)
            .map(|content| format!("{} ({})", content.display_text, content.translation))
            .unwrap_or_else(|_| key.item_id.clone())
    }

    /// Catalog items without any stored review.
    fn unseen_keys(&self) -> Result<Vec<ItemKey>> {
        let seen: HashSet<ItemKey> = self
            .store
            .list_all(&self.learner)?
            .into_iter()
            .map(|stored| stored.item.key)
            .collect();
        Ok(self.catalog.keys().filter(|key| !seen.contains(key)).collect())
    }

    fn show_due(&self, out: &mut impl Write) -> Result<()> {
        let now = self.engine.now();
        let due = self.engine.get_due_items(&self.learner, now)?;

        writeln!(out, "{} item(s) due on {}", due.len(), now.format("%Y-%m-%d"))?;
        for item in &due {
            writeln!(
                out,
                "  {}  {}  due {}",
                item.key,
                self.display_text(&item.key),
                item.due_date.format("%Y-%m-%d")
            )?;
        }
        let unseen = self.unseen_keys()?.len();
        if unseen > 0 {
            writeln!(out, "{} new item(s) waiting in the catalog", unseen)?;
        }
        Ok(())
    }

    fn review(&self, key: &ItemKey, quality: u8, out: &mut impl Write) -> Result<()> {
        let item = self.engine.record_review(&self.learner, key, quality)?;
        write_outcome(out, &item)
    }

    fn show_stats(&self, out: &mut impl Write) -> Result<()> {
        let stats = self.engine.get_stats(&self.learner, self.engine.now())?;

        writeln!(out, "Reviewed items: {}", stats.aggregates.total_reviews)?;
        writeln!(out, "Mastered:       {}", stats.aggregates.mastered_count)?;
        writeln!(out, "Learning:       {}", stats.learning_count)?;
        writeln!(out, "Due now:        {}", stats.aggregates.due_count)?;
        writeln!(out, "Reviewed today: {}", stats.reviewed_today)?;
        if let Some(ease) = stats.average_ease {
            writeln!(out, "Average ease:   {:.2}", ease)?;
        }
        for (lesson_type, breakdown) in &stats.by_lesson_type {
            writeln!(
                out,
                "  {}: {} items, {} mastered, {} due",
                lesson_type, breakdown.items, breakdown.mastered, breakdown.due
            )?;
        }
        Ok(())
    }

    /// Interactive review loop. Returns early when the learner quits with `q`
    /// or input ends.
    pub fn run_session(
        &self,
        input: &mut impl BufRead,
        out: &mut impl Write,
        new_items: usize,
    ) -> Result<()> {
        let controller = SessionController::new(Arc::clone(&self.engine), self.learner.clone())
            .with_resolver(self.catalog.clone());
        let mut session = controller.start_session()?;
        writeln!(
            out,
            "{} item(s) due as of {}",
            session.total_count(),
            session.started_at().format("%Y-%m-%d %H:%M")
        )?;

        while let Some(presented) = session.current_item() {
            let key = presented.item.key.clone();
            writeln!(out, "{}", session.progress_message())?;
            writeln!(out, "  {}", presented.display_text())?;

            match &presented.content {
                Some(content) => {
                    let back = format!("{} - {}", content.transliteration, content.translation);
                    writeln!(out, "Press Enter to reveal")?;
                    if read_line(input)?.is_none() {
                        return Ok(());
                    }
                    writeln!(out, "  {}", back)?;
                }
                None => writeln!(out, "  (no content for {})", key)?,
            }

            if !rate(input, out, |quality| session.submit_rating(&key, quality))? {
                return Ok(());
            }
        }
        writeln!(out, "{}", session.progress_message())?;

        for key in self.unseen_keys()?.into_iter().take(new_items) {
            writeln!(out, "New: {}", self.display_text(&key))?;
            if let Ok(content) = self.catalog.resolve_content(&key) {
                writeln!(out, "  {}", content.transliteration)?;
            }
            if !rate(input, out, |quality| controller.record_review(&key, quality))? {
                return Ok(());
            }
        }
        Ok(())
    }

    fn advance_day(&self, out: &mut impl Write) -> Result<()> {
        let conn = self.store.connection();
        let conn = conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))?;
        db::advance_day(&conn)?;
        let today = db::get_current_date(&conn)?;
        info!(date = %today.format("%Y-%m-%d"), "advanced simulated date");
        writeln!(out, "Today is now {}", today.format("%Y-%m-%d"))?;
        Ok(())
    }

    fn export(&self, path: &Path, out: &mut impl Write) -> Result<()> {
        let count = export_json_to_path(&*self.store, &self.learner, path, self.engine.now())
            .with_context(|| format!("exporting to {}", path.display()))?;
        writeln!(out, "Exported {} item(s) to {}", count, path.display())?;
        Ok(())
    }

    fn import(&self, path: &Path, out: &mut impl Write) -> Result<()> {
        let export = import_json(path).with_context(|| format!("reading {}", path.display()))?;
        let summary = apply_import(
            &*self.store,
            &self.learner,
            &export,
            self.engine.policy(),
            self.max_write_attempts,
        )?;
        writeln!(
            out,
            "Imported {} item(s); kept {} newer local record(s); rejected {}",
            summary.written, summary.kept_existing, summary.rejected
        )?;
        Ok(())
    }
}

fn write_outcome(out: &mut impl Write, item: &ReviewItem) -> Result<()> {
    writeln!(
        out,
        "  next review {} (in {} day(s)), ease {:.2}{}",
        item.due_date.format("%Y-%m-%d"),
        item.interval_days,
        item.ease_factor,
        if item.mastered { ", mastered" } else { "" }
    )?;
    Ok(())
}

/// Prompts until `submit` accepts a rating. Returns `false` when the learner
/// quits.
fn rate(
    input: &mut impl BufRead,
    out: &mut impl Write,
    mut submit: impl FnMut(u8) -> review_scheduler::error::Result<ReviewItem>,
) -> Result<bool> {
    loop {
        let Some(quality) = prompt_rating(input, out)? else {
            return Ok(false);
        };
        match submit(quality) {
            Ok(item) => {
                write_outcome(out, &item)?;
                return Ok(true);
            }
            Err(ReviewError::InvalidQuality(value)) => {
                writeln!(out, "Invalid rating {}: use 1, 3 or 5", value)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Reads ratings until one parses as a number; `None` on `q` or end of input.
fn prompt_rating(input: &mut impl BufRead, out: &mut impl Write) -> Result<Option<u8>> {
    loop {
        write!(out, "Rate: 1 - Forgot, 3 - Hard, 5 - Easy (q to quit): ")?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        if line.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match line.parse::<u8>() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => writeln!(out, "Not a number: {}", line)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_scheduler::SchedulerConfig;
    use review_scheduler::database::StoredClock;
    use review_scheduler::models::LessonType;
    use std::io::Cursor;

    fn app() -> App {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let clock = Arc::new(StoredClock::new(&store));
        let engine = Arc::new(ReviewEngine::new(
            store.clone(),
            clock,
            &SchedulerConfig::default(),
        ));
        App::new(engine, store, Catalog::sample(), LearnerId::from("local"), 5)
    }

    fn run_session(app: &App, input: &str, new_items: usize) -> String {
        let mut out = Vec::new();
        app.run_session(&mut Cursor::new(input.as_bytes()), &mut out, new_items)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_session_introduces_new_items() {
        let app = app();
        let output = run_session(&app, "5\n3\n", 2);

        assert!(output.contains("Session complete: 0 reviewed"));
        assert!(output.contains("New: ㄱ (giyeok)"));
        assert!(output.contains("New: ㄴ (nieun)"));
        assert_eq!(app.store.list_all(&app.learner).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_rating_is_reported_and_skipped() {
        let app = app();
        let output = run_session(&app, "4\nabc\nq\n", 1);

        assert!(output.contains("Invalid rating 4"));
        assert!(output.contains("Not a number: abc"));
        assert!(app.store.list_all(&app.learner).unwrap().is_empty());
    }

    #[test]
    fn test_due_items_come_back_after_advancing_days() {
        let app = app();
        let key = ItemKey::new(1, LessonType::Consonants, "giyeok");
        app.review(&key, 5, &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        app.show_due(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("0 item(s) due"));

        app.advance_day(&mut Vec::new()).unwrap();
        let mut out = Vec::new();
        app.show_due(&mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert!(listing.starts_with("1 item(s) due"));
        assert!(listing.contains("1/consonants/giyeok"));

        let output = run_session(&app, "\n5\n", 0);
        assert!(output.starts_with("1 item(s) due as of "));
        assert!(output.contains("Item 1 of 1"));
        assert!(output.contains("Session complete: 1 reviewed"));
    }
}
