//! Simulated pump
//!
//! An in-process [`PumpDriver`] that models the pump menus closely enough to
//! run every built-in command: main/stop screens, bolus and TBR entry, the
//! "My Data" history pages, basal profile 1 and warning screens. Used for
//! development without hardware and by the tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, Timelike};
use combo_shared::{
    BolusType, Key, Menu, MenuAttribute, MenuDate, MenuTime, MenuType, MenuValue, PumpError,
    PumpHistory, Tbr,
};
use combo_shared::history::{Bolus, BASAL_SLOTS};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::debug;

use super::driver::{driver_event_channel, DriverEvent, DriverEventReceiver, DriverEventSender, PumpDriver};

pub const BOLUS_CANCELLED_CODE: i64 = 8;
pub const TBR_CANCELLED_CODE: i64 = 6;

/// Auto-repeat interval while an up/down key is held
const KEY_REPEAT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Display refresh interval
    pub refresh: Duration,
    /// Time between a connect request and the link coming up
    pub connect_delay: Duration,
    /// Bolus delivery speed in units per second
    pub bolus_speed: f64,
    pub battery_state: i64,
    pub insulin_state: i64,
    /// Initial hourly basal rates
    pub basal_rates: [f64; BASAL_SLOTS],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            refresh: Duration::from_millis(500),
            connect_delay: Duration::from_secs(1),
            bolus_speed: 0.2,
            battery_state: 2,
            insulin_state: 2,
            basal_rates: [0.8; BASAL_SLOTS],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryPage {
    Bolus,
    Errors,
    Daily,
    Tbr,
}

impl HistoryPage {
    fn next(self) -> Self {
        match self {
            HistoryPage::Bolus => HistoryPage::Errors,
            HistoryPage::Errors => HistoryPage::Daily,
            HistoryPage::Daily => HistoryPage::Tbr,
            HistoryPage::Tbr => HistoryPage::Bolus,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Screen {
    Root,
    BolusMenu,
    BolusEnter { tenths: u32 },
    TbrMenu,
    TbrSet { percent: u32 },
    TbrDuration { percent: u32, minutes: u32 },
    MyData,
    History { page: HistoryPage, index: usize },
    Basal1Menu,
    BasalTotal,
    BasalSet { hour: usize, rates: [u32; BASAL_SLOTS] },
    Alert { message: String, code: i64, confirmed: bool },
}

#[derive(Debug, Clone, Copy)]
struct ActiveTbr {
    percent: u32,
    duration: u32,
    started_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy)]
struct BolusDelivery {
    amount: f64,
    delivered: f64,
}

struct SimState {
    link_up: bool,
    reachable: bool,
    frozen: bool,
    suspended: bool,
    screen: Screen,
    tbr: Option<ActiveTbr>,
    /// Hourly basal rates in hundredths of a unit
    basal: [u32; BASAL_SLOTS],
    bolus: Option<BolusDelivery>,
    /// Newest record first on every page
    history: PumpHistory,
    presses: Vec<Key>,
    connects: u32,
    disconnects: u32,
    battery_state: i64,
    insulin_state: i64,
    clock_base: NaiveDateTime,
    started: Instant,
}

impl SimState {
    fn now(&self) -> NaiveDateTime {
        let elapsed = ChronoDuration::from_std(self.started.elapsed()).unwrap_or_default();
        self.clock_base + elapsed
    }

    fn base_rate(&self) -> u32 {
        let hour = self.now().hour() as usize;
        self.basal.get(hour).copied().unwrap_or_default()
    }

    fn tbr_elapsed_minutes(&self, tbr: &ActiveTbr) -> u32 {
        u32::try_from((self.now() - tbr.started_at).num_minutes().max(0)).unwrap_or(u32::MAX)
    }

    fn end_tbr(&mut self) {
        if let Some(tbr) = self.tbr.take() {
            let ran = self.tbr_elapsed_minutes(&tbr).min(tbr.duration);
            self.history.tbr_history.insert(
                0,
                Tbr {
                    timestamp: tbr.started_at,
                    duration: ran,
                    percent: tbr.percent,
                },
            );
        }
    }

    fn finish_bolus(&mut self) {
        if let Some(bolus) = self.bolus.take() {
            let delivered = (bolus.delivered.min(bolus.amount) * 10.0).round() / 10.0;
            let timestamp = self.now();
            self.history.bolus_history.insert(
                0,
                Bolus {
                    timestamp,
                    amount: delivered,
                    is_valid: true,
                },
            );
        }
    }

    fn raise_alert(&mut self, message: &str, code: i64) {
        let timestamp = self.now();
        self.history.pump_error_history.insert(
            0,
            PumpError {
                timestamp,
                warning_code: Some(code),
                error_code: None,
                message: message.to_string(),
            },
        );
        self.screen = Screen::Alert {
            message: message.to_string(),
            code,
            confirmed: false,
        };
    }

    fn cancel_bolus(&mut self) {
        if self.bolus.is_some() {
            self.finish_bolus();
            self.raise_alert("BOLUS CANCELLED", BOLUS_CANCELLED_CODE);
        }
    }

    fn advance(&mut self, elapsed: Duration, speed: f64) {
        if let Some(bolus) = self.bolus.as_mut() {
            bolus.delivered += speed * elapsed.as_secs_f64();
            if bolus.delivered >= bolus.amount {
                self.finish_bolus();
            }
        }
        if let Some(tbr) = self.tbr {
            if self.tbr_elapsed_minutes(&tbr) >= tbr.duration {
                self.end_tbr();
            }
        }
    }

    fn apply(&mut self, key: Key) {
        self.presses.push(key);
        let screen = std::mem::replace(&mut self.screen, Screen::Root);
        self.screen = match (screen, key) {
            (Screen::Root, Key::Menu) if self.suspended => Screen::MyData,
            (Screen::Root, Key::Menu) => Screen::BolusMenu,
            (Screen::Root, Key::Up) if self.bolus.is_some() => {
                self.cancel_bolus();
                return;
            }
            (Screen::BolusMenu, Key::Menu) => Screen::TbrMenu,
            (Screen::BolusMenu, Key::Check) => Screen::BolusEnter { tenths: 0 },
            (Screen::BolusEnter { tenths }, Key::Up) => Screen::BolusEnter {
                tenths: (tenths + 1).min(250),
            },
            (Screen::BolusEnter { tenths }, Key::Down) => Screen::BolusEnter {
                tenths: tenths.saturating_sub(1),
            },
            (Screen::BolusEnter { tenths }, Key::Check) if tenths > 0 => {
                self.bolus = Some(BolusDelivery {
                    amount: f64::from(tenths) / 10.0,
                    delivered: 0.0,
                });
                Screen::Root
            }
            (Screen::BolusEnter { .. }, Key::Back) => Screen::BolusMenu,
            (Screen::TbrMenu, Key::Menu) => Screen::MyData,
            (Screen::TbrMenu, Key::Check) => Screen::TbrSet {
                percent: self.tbr.map_or(100, |t| t.percent),
            },
            (Screen::TbrSet { percent }, Key::Up) => Screen::TbrSet {
                percent: (percent + 10).min(500),
            },
            (Screen::TbrSet { percent }, Key::Down) => Screen::TbrSet {
                percent: percent.saturating_sub(10),
            },
            (Screen::TbrSet { percent: 100 }, Key::Check) => {
                if self.tbr.is_some() {
                    self.end_tbr();
                    self.raise_alert("TBR CANCELLED", TBR_CANCELLED_CODE);
                    return;
                }
                Screen::Root
            }
            (Screen::TbrSet { percent }, Key::Check) => {
                let minutes = self.tbr.map_or(30, |t| {
                    let remaining = t.duration.saturating_sub(self.tbr_elapsed_minutes(&t));
                    remaining.div_ceil(15).max(1) * 15
                });
                Screen::TbrDuration { percent, minutes }
            }
            (Screen::TbrSet { .. }, Key::Back) => Screen::TbrMenu,
            (Screen::TbrDuration { percent, minutes }, Key::Up) => Screen::TbrDuration {
                percent,
                minutes: (minutes + 15).min(24 * 60),
            },
            (Screen::TbrDuration { percent, minutes }, Key::Down) => Screen::TbrDuration {
                percent,
                minutes: minutes.saturating_sub(15).max(15),
            },
            (Screen::TbrDuration { percent, minutes }, Key::Check) => {
                self.end_tbr();
                self.tbr = Some(ActiveTbr {
                    percent,
                    duration: minutes,
                    started_at: self.now(),
                });
                Screen::Root
            }
            (Screen::TbrDuration { percent, .. }, Key::Back) => Screen::TbrSet { percent },
            (Screen::MyData, Key::Menu) => Screen::Basal1Menu,
            (Screen::MyData, Key::Check) => Screen::History {
                page: HistoryPage::Bolus,
                index: 0,
            },
            (Screen::History { page, index }, Key::Down) => Screen::History {
                page,
                index: (index + 1).min(self.page_len(page).saturating_sub(1)),
            },
            (Screen::History { page, index }, Key::Up) => Screen::History {
                page,
                index: index.saturating_sub(1),
            },
            (Screen::History { page, .. }, Key::Menu) => Screen::History {
                page: page.next(),
                index: 0,
            },
            (Screen::History { .. }, Key::Back) => Screen::MyData,
            (Screen::Basal1Menu, Key::Menu) => Screen::Root,
            (Screen::Basal1Menu, Key::Check) => Screen::BasalTotal,
            (Screen::BasalTotal, Key::Check) => Screen::BasalSet {
                hour: 0,
                rates: self.basal,
            },
            (Screen::BasalTotal, Key::Back) => Screen::Basal1Menu,
            (Screen::BasalSet { hour, mut rates }, key @ (Key::Up | Key::Down)) => {
                if let Some(rate) = rates.get_mut(hour) {
                    *rate = if key == Key::Up {
                        (*rate + 1).min(2500)
                    } else {
                        rate.saturating_sub(1)
                    };
                }
                Screen::BasalSet { hour, rates }
            }
            (Screen::BasalSet { hour, rates }, Key::Menu) => Screen::BasalSet {
                hour: (hour + 1) % BASAL_SLOTS,
                rates,
            },
            (Screen::BasalSet { rates, .. }, Key::Check) => {
                self.basal = rates;
                Screen::BasalTotal
            }
            (Screen::BasalSet { .. }, Key::Back) => Screen::BasalTotal,
            (Screen::Alert { message, code, confirmed: false }, Key::Check) => Screen::Alert {
                message,
                code,
                confirmed: true,
            },
            (Screen::Alert { confirmed: true, .. }, Key::Check) => Screen::Root,
            (Screen::BolusMenu | Screen::TbrMenu | Screen::MyData, Key::Back) => Screen::Root,
            (Screen::Basal1Menu, Key::Back) => Screen::Root,
            (screen, _) => screen,
        };
    }

    fn page_len(&self, page: HistoryPage) -> usize {
        match page {
            HistoryPage::Bolus => self.history.bolus_history.len(),
            HistoryPage::Errors => self.history.pump_error_history.len(),
            HistoryPage::Daily => self.history.tdd_history.len(),
            HistoryPage::Tbr => self.history.tbr_history.len(),
        }
    }

    fn render(&self) -> Menu {
        match &self.screen {
            Screen::Root if self.suspended => Menu::new(MenuType::StopMenu)
                .with(MenuAttribute::BatteryState, MenuValue::Integer(self.battery_state))
                .with(MenuAttribute::InsulinState, MenuValue::Integer(self.insulin_state)),
            Screen::Root => self.render_main(),
            Screen::BolusMenu => Menu::new(MenuType::BolusMenu),
            Screen::BolusEnter { tenths } => Menu::new(MenuType::BolusEnter)
                .with(MenuAttribute::Bolus, MenuValue::Decimal(f64::from(*tenths) / 10.0))
                .with(MenuAttribute::BolusType, MenuValue::BolusType(BolusType::Normal)),
            Screen::TbrMenu => Menu::new(MenuType::TbrMenu),
            Screen::TbrSet { percent } => Menu::new(MenuType::TbrSet)
                .with(MenuAttribute::Tbr, MenuValue::Decimal(f64::from(*percent))),
            Screen::TbrDuration { percent, minutes } => Menu::new(MenuType::TbrDuration)
                .with(MenuAttribute::Tbr, MenuValue::Decimal(f64::from(*percent)))
                .with(MenuAttribute::Runtime, MenuValue::Time(MenuTime::from_minutes(*minutes))),
            Screen::MyData => Menu::new(MenuType::MyDataMenu),
            Screen::History { page, index } => self.render_history(*page, *index),
            Screen::Basal1Menu => Menu::new(MenuType::Basal1Menu),
            Screen::BasalTotal => Menu::new(MenuType::BasalTotal).with(
                MenuAttribute::BasalTotal,
                MenuValue::Decimal(f64::from(self.basal.iter().sum::<u32>()) / 100.0),
            ),
            Screen::BasalSet { hour, rates } => {
                let rate = rates.get(*hour).copied().unwrap_or_default();
                let hour = u32::try_from(*hour).unwrap_or_default();
                Menu::new(MenuType::BasalSet)
                    .with(MenuAttribute::BasalStart, MenuValue::Time(MenuTime::new(hour, 0)))
                    .with(MenuAttribute::BasalEnd, MenuValue::Time(MenuTime::new((hour + 1) % 24, 0)))
                    .with(MenuAttribute::BasalRate, MenuValue::Decimal(f64::from(rate) / 100.0))
            }
            Screen::Alert { message, code, .. } => Menu::new(MenuType::WarningOrError)
                .with(MenuAttribute::Message, MenuValue::Text(message.clone()))
                .with(MenuAttribute::WarningCode, MenuValue::Integer(*code)),
        }
    }

    fn render_main(&self) -> Menu {
        let base = self.base_rate();
        let mut menu = Menu::new(MenuType::MainMenu)
            .with(MenuAttribute::BatteryState, MenuValue::Integer(self.battery_state))
            .with(MenuAttribute::InsulinState, MenuValue::Integer(self.insulin_state));
        menu = match self.tbr {
            Some(tbr) => {
                let remaining = tbr.duration.saturating_sub(self.tbr_elapsed_minutes(&tbr));
                menu.with(MenuAttribute::Tbr, MenuValue::Decimal(f64::from(tbr.percent)))
                    .with(MenuAttribute::Runtime, MenuValue::Time(MenuTime::from_minutes(remaining)))
                    .with(
                        MenuAttribute::BasalRate,
                        MenuValue::Decimal(f64::from(base * tbr.percent) / 10_000.0),
                    )
            }
            None => menu
                .with(MenuAttribute::Tbr, MenuValue::Decimal(100.0))
                .with(MenuAttribute::BasalRate, MenuValue::Decimal(f64::from(base) / 100.0)),
        };
        if let Some(bolus) = self.bolus {
            let remaining = ((bolus.amount - bolus.delivered).max(0.0) * 10.0).round() / 10.0;
            menu = menu.with(MenuAttribute::BolusRemaining, MenuValue::Decimal(remaining));
        }
        menu
    }

    fn render_history(&self, page: HistoryPage, index: usize) -> Menu {
        let menu_type = match page {
            HistoryPage::Bolus => MenuType::BolusData,
            HistoryPage::Errors => MenuType::ErrorData,
            HistoryPage::Daily => MenuType::DailyData,
            HistoryPage::Tbr => MenuType::TbrData,
        };
        let total = self.page_len(page);
        let current = if total == 0 { 0 } else { index + 1 };
        let menu = Menu::new(menu_type)
            .with(MenuAttribute::CurrentRecord, MenuValue::Integer(current as i64))
            .with(MenuAttribute::TotalRecord, MenuValue::Integer(total as i64));

        match page {
            HistoryPage::Bolus => match self.history.bolus_history.get(index) {
                Some(bolus) => with_timestamp(menu, bolus.timestamp)
                    .with(MenuAttribute::Bolus, MenuValue::Decimal(bolus.amount))
                    .with(
                        MenuAttribute::BolusType,
                        MenuValue::BolusType(if bolus.is_valid {
                            BolusType::Normal
                        } else {
                            BolusType::Extended
                        }),
                    ),
                None => menu,
            },
            HistoryPage::Errors => match self.history.pump_error_history.get(index) {
                Some(error) => {
                    let mut menu = with_timestamp(menu, error.timestamp)
                        .with(MenuAttribute::Message, MenuValue::Text(error.message.clone()));
                    if let Some(code) = error.warning_code {
                        menu = menu.with(MenuAttribute::WarningCode, MenuValue::Integer(code));
                    }
                    if let Some(code) = error.error_code {
                        menu = menu.with(MenuAttribute::ErrorCode, MenuValue::Integer(code));
                    }
                    menu
                }
                None => menu,
            },
            HistoryPage::Daily => match self.history.tdd_history.get(index) {
                Some(tdd) => menu
                    .with(MenuAttribute::DailyTotal, MenuValue::Decimal(tdd.total))
                    .with(MenuAttribute::Date, MenuValue::Date(menu_date(tdd.timestamp))),
                None => menu,
            },
            HistoryPage::Tbr => match self.history.tbr_history.get(index) {
                Some(tbr) => {
                    let ended = tbr.timestamp + ChronoDuration::minutes(i64::from(tbr.duration));
                    with_timestamp(menu, ended)
                        .with(MenuAttribute::Tbr, MenuValue::Decimal(f64::from(tbr.percent)))
                        .with(MenuAttribute::Runtime, MenuValue::Time(MenuTime::from_minutes(tbr.duration)))
                }
                None => menu,
            },
        }
    }
}

fn menu_date(timestamp: NaiveDateTime) -> MenuDate {
    use chrono::Datelike;
    MenuDate::new(timestamp.day(), timestamp.month())
}

fn with_timestamp(menu: Menu, timestamp: NaiveDateTime) -> Menu {
    menu.with(MenuAttribute::Date, MenuValue::Date(menu_date(timestamp)))
        .with(
            MenuAttribute::Time,
            MenuValue::Time(MenuTime::new(timestamp.hour(), timestamp.minute())),
        )
}

/// In-process pump driver
pub struct SimulatedPump {
    config: SimConfig,
    state: Mutex<SimState>,
    event_tx: DriverEventSender,
}

impl SimulatedPump {
    /// Create the simulated pump and start its display refresh loop
    pub fn new(config: SimConfig) -> (Arc<Self>, DriverEventReceiver) {
        let (event_tx, event_rx) = driver_event_channel();
        let basal = config.basal_rates.map(|rate| (rate * 100.0).round() as u32);
        let state = SimState {
            link_up: false,
            reachable: true,
            frozen: false,
            suspended: false,
            screen: Screen::Root,
            tbr: None,
            basal,
            bolus: None,
            history: PumpHistory::default(),
            presses: Vec::new(),
            connects: 0,
            disconnects: 0,
            battery_state: config.battery_state,
            insulin_state: config.insulin_state,
            clock_base: Local::now().naive_local(),
            started: Instant::now(),
        };
        let pump = Arc::new(Self {
            config,
            state: Mutex::new(state),
            event_tx,
        });

        let refresh = pump.clone();
        tokio::spawn(async move {
            refresh.refresh_loop().await;
        });

        (pump, event_rx)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh_loop(&self) {
        let mut ticker = interval(self.config.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.event_tx.is_closed() {
                break;
            }
            let menu = {
                let mut state = self.lock();
                state.advance(self.config.refresh, self.config.bolus_speed);
                (state.link_up && !state.frozen).then(|| state.render())
            };
            if let Some(menu) = menu {
                let _ = self.event_tx.send(DriverEvent::MenuUpdated(menu)).await;
            }
        }
    }

    async fn publish(&self) {
        let menu = {
            let state = self.lock();
            (state.link_up && !state.frozen).then(|| state.render())
        };
        if let Some(menu) = menu {
            let _ = self.event_tx.send(DriverEvent::MenuUpdated(menu)).await;
        }
    }

    /// Whether the pump answers connect requests
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Stop or resume display updates without dropping the link
    pub fn set_frozen(&self, frozen: bool) {
        self.lock().frozen = frozen;
    }

    pub fn suspend(&self) {
        let mut state = self.lock();
        state.suspended = true;
        state.end_tbr();
    }

    pub fn resume(&self) {
        self.lock().suspended = false;
    }

    /// Show a warning screen as the pump would on its own
    pub fn raise_alert(&self, message: &str, code: i64) {
        self.lock().raise_alert(message, code);
    }

    /// Start a TBR directly on the pump
    pub fn start_tbr(&self, percent: u32, minutes: u32) {
        let mut state = self.lock();
        let started_at = state.now();
        state.tbr = Some(ActiveTbr {
            percent,
            duration: minutes,
            started_at,
        });
    }

    /// Lose the link the way a radio dropout would
    pub async fn drop_link(&self) {
        {
            let mut state = self.lock();
            if !state.link_up {
                return;
            }
            state.link_up = false;
            if state.bolus.is_some() {
                state.cancel_bolus();
            } else if matches!(state.screen, Screen::TbrSet { .. } | Screen::TbrDuration { .. }) {
                if state.tbr.is_some() {
                    state.end_tbr();
                    state.raise_alert("TBR CANCELLED", TBR_CANCELLED_CODE);
                } else {
                    state.screen = Screen::Root;
                }
            } else if !matches!(state.screen, Screen::Alert { .. }) {
                state.screen = Screen::Root;
            }
        }
        debug!("[SIM] Link dropped");
        let _ = self.event_tx.send(DriverEvent::LinkStopped).await;
    }

    /// Edit the stored history; every list is newest first
    pub fn edit_history(&self, edit: impl FnOnce(&mut PumpHistory)) {
        edit(&mut self.lock().history);
    }

    pub fn history(&self) -> PumpHistory {
        self.lock().history.clone()
    }

    pub fn basal_rates(&self) -> Vec<f64> {
        self.lock().basal.iter().map(|r| f64::from(*r) / 100.0).collect()
    }

    /// Every key pressed so far
    pub fn presses(&self) -> Vec<Key> {
        self.lock().presses.clone()
    }

    pub fn connect_count(&self) -> u32 {
        self.lock().connects
    }

    pub fn disconnect_count(&self) -> u32 {
        self.lock().disconnects
    }

    pub fn tbr(&self) -> Option<(u32, u32)> {
        let state = self.lock();
        state.tbr.map(|t| (t.percent, t.duration))
    }

    pub fn current_menu(&self) -> Menu {
        self.lock().render()
    }
}

#[async_trait]
impl PumpDriver for SimulatedPump {
    async fn connect(&self) -> Result<()> {
        let reachable = {
            let mut state = self.lock();
            state.connects += 1;
            state.reachable
        };
        if !reachable {
            debug!("[SIM] Connect request ignored, pump unreachable");
            return Ok(());
        }
        sleep(self.config.connect_delay).await;
        self.lock().link_up = true;
        let _ = self.event_tx.send(DriverEvent::LinkStarted).await;
        self.publish().await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let was_up = {
            let mut state = self.lock();
            state.disconnects += 1;
            let was_up = state.link_up;
            state.link_up = false;
            if !matches!(state.screen, Screen::Alert { .. }) {
                state.screen = Screen::Root;
            }
            was_up
        };
        if was_up {
            let _ = self.event_tx.send(DriverEvent::LinkStopped).await;
        }
        Ok(())
    }

    async fn press(&self, key: Key, hold: Duration) -> Result<()> {
        {
            let mut state = self.lock();
            if !state.link_up {
                return Err(anyhow!("Pump not connected, cannot press {:?}", key));
            }
            if key != Key::NoKey {
                let repeats = match key {
                    Key::Up | Key::Down => 1 + hold.saturating_sub(KEY_REPEAT * 2).as_millis() / KEY_REPEAT.as_millis(),
                    _ => 1,
                };
                for _ in 0..repeats {
                    state.apply(key);
                }
            }
        }
        self.publish().await;
        sleep(hold).await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().link_up
    }

    fn name(&self) -> &'static str {
        "simulator"
    }
}
