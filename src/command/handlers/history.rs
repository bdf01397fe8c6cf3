//! Read history command
//!
//! The "My Data" menu holds four pages: boluses, errors, daily totals and
//! TBRs, always in that order. Each page lists its records newest first; the
//! down key moves to the next older record. TBRs show up only once they
//! have finished running.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use combo_shared::history::{resolve_record_date, resolve_record_time};
use combo_shared::{
    Bolus, BolusType, CommandError, CommandResult, HistoryRange, HistoryRecord, HistoryRequest, Key,
    Menu, MenuAttribute, MenuType, PumpError, PumpHistory, Tbr, Tdd,
};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::command::{Command, CommandKind};
use crate::pump::PumpOps;

/// Refreshes to wait for the next record after pressing down
const RECORD_WAIT_ATTEMPTS: u32 = 5;

fn incomplete(page: MenuType) -> CommandError {
    CommandError::failed(format!("Incomplete record on {page}"))
}

fn record_time(menu: &Menu, today: NaiveDate, page: MenuType) -> Result<chrono::NaiveDateTime, CommandError> {
    let date = menu.date(MenuAttribute::Date).ok_or_else(|| incomplete(page))?;
    let time = menu.time(MenuAttribute::Time).ok_or_else(|| incomplete(page))?;
    resolve_record_time(date, time, today).ok_or_else(|| incomplete(page))
}

fn read_bolus(menu: &Menu, today: NaiveDate) -> Result<Bolus, CommandError> {
    let page = MenuType::BolusData;
    Ok(Bolus {
        timestamp: record_time(menu, today, page)?,
        amount: menu.decimal(MenuAttribute::Bolus).ok_or_else(|| incomplete(page))?,
        is_valid: menu.bolus_type(MenuAttribute::BolusType) == Some(BolusType::Normal),
    })
}

fn read_error(menu: &Menu, today: NaiveDate) -> Result<PumpError, CommandError> {
    Ok(PumpError {
        timestamp: record_time(menu, today, MenuType::ErrorData)?,
        warning_code: menu.integer(MenuAttribute::WarningCode),
        error_code: menu.integer(MenuAttribute::ErrorCode),
        message: menu.message().unwrap_or_default().to_string(),
    })
}

fn read_tdd(menu: &Menu, today: NaiveDate) -> Result<Tdd, CommandError> {
    let page = MenuType::DailyData;
    let date = menu.date(MenuAttribute::Date).ok_or_else(|| incomplete(page))?;
    let timestamp = resolve_record_date(date, today)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| incomplete(page))?;
    Ok(Tdd {
        timestamp,
        total: menu.decimal(MenuAttribute::DailyTotal).ok_or_else(|| incomplete(page))?,
    })
}

fn read_tbr(menu: &Menu, today: NaiveDate) -> Result<Tbr, CommandError> {
    let page = MenuType::TbrData;
    let percent = menu.decimal(MenuAttribute::Tbr).ok_or_else(|| incomplete(page))?;
    let duration = menu
        .time(MenuAttribute::Runtime)
        .map(|t| t.total_minutes())
        .ok_or_else(|| incomplete(page))?;
    // The pump shows when the TBR ended
    let ended = record_time(menu, today, page)?;
    Ok(Tbr {
        timestamp: ended - ChronoDuration::minutes(i64::from(duration)),
        duration,
        percent: percent.round() as u32,
    })
}

async fn wait_for_record(ops: &PumpOps, page: MenuType, record: i64) -> Result<Menu, CommandError> {
    for _ in 0..RECORD_WAIT_ATTEMPTS {
        let snapshot = ops.verify_menu_is_displayed(page).await?;
        if snapshot.menu.integer(MenuAttribute::CurrentRecord) == Some(record) {
            return Ok(snapshot.menu.clone());
        }
        ops.wait_for_screen_update(Duration::from_secs(1)).await?;
    }
    Err(CommandError::menu_not_reached(format!(
        "Record {record} on {page} not displayed"
    )))
}

/// Read the records of the displayed page selected by `range`
async fn read_page<T: HistoryRecord>(
    ops: &PumpOps,
    page: MenuType,
    range: HistoryRange,
    today: NaiveDate,
    read: fn(&Menu, NaiveDate) -> Result<T, CommandError>,
) -> Result<Vec<T>, CommandError> {
    let mut records = Vec::new();
    let first = ops.verify_menu_is_displayed(page).await?;
    let total = first.menu.integer(MenuAttribute::TotalRecord).unwrap_or(0);
    if range == HistoryRange::Skip || total == 0 {
        return Ok(records);
    }

    let mut record = first.menu.integer(MenuAttribute::CurrentRecord).unwrap_or(1);
    let mut menu = first.menu.clone();
    loop {
        debug!("Reading {} record #{}/{}", page, record, total);
        let entry = read(&menu, today)?;
        if let HistoryRange::Since(since) = range {
            if entry.timestamp() <= since {
                break;
            }
        }
        records.push(entry);
        if range == HistoryRange::Last || record >= total {
            break;
        }

        ops.press_and_wait(Key::Down).await?;
        record += 1;
        menu = wait_for_record(ops, page, record).await?;
    }
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHistoryCommand {
    request: HistoryRequest,
}

impl ReadHistoryCommand {
    pub fn new(request: HistoryRequest) -> Self {
        Self { request }
    }
}

impl fmt::Display for ReadHistoryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadHistoryCommand{{request={:?}}}", self.request)
    }
}

#[async_trait]
impl Command for ReadHistoryCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ReadHistory
    }

    fn needs_run_mode(&self) -> bool {
        false
    }

    async fn execute(&self, ops: &PumpOps) -> Result<CommandResult, CommandError> {
        let mut history = PumpHistory::default();
        if !self.request.reads_anything() {
            return Ok(CommandResult::succeeded("No history requested").with_history(history));
        }

        let today = Local::now().date_naive();
        ops.navigate_to_menu(MenuType::MyDataMenu).await?;
        ops.verify_menu_is_displayed(MenuType::MyDataMenu).await?;
        ops.press_check().await?;

        history.bolus_history =
            read_page(ops, MenuType::BolusData, self.request.bolus, today, read_bolus).await?;

        ops.press_and_wait(Key::Menu).await?;
        history.pump_error_history =
            read_page(ops, MenuType::ErrorData, self.request.pump_errors, today, read_error).await?;

        ops.press_and_wait(Key::Menu).await?;
        history.tdd_history = read_page(ops, MenuType::DailyData, self.request.tdd, today, read_tdd).await?;

        ops.press_and_wait(Key::Menu).await?;
        history.tbr_history = read_page(ops, MenuType::TbrData, self.request.tbr, today, read_tbr).await?;

        ops.return_to_root_menu().await?;
        ops.verify_root_menu_is_displayed().await?;

        debug!(
            "Read {} bolus, {} error, {} TDD and {} TBR records",
            history.bolus_history.len(),
            history.pump_error_history.len(),
            history.tdd_history.len(),
            history.tbr_history.len()
        );
        Ok(CommandResult::succeeded("History read")
            .with_history(history)
            .with_state(ops.pump_state()))
    }
}
