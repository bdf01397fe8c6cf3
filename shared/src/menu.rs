//! Decoded pump display
//!
//! The driver turns every display refresh into a [`Menu`]: the kind of screen
//! being shown plus whatever values could be read off it.

use std::collections::BTreeMap;
use std::fmt;

/// Screens the driver can recognise on the pump display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MenuType {
    MainMenu,
    StopMenu,
    WarningOrError,
    BolusMenu,
    BolusEnter,
    TbrMenu,
    TbrSet,
    TbrDuration,
    MyDataMenu,
    BolusData,
    ErrorData,
    DailyData,
    TbrData,
    Basal1Menu,
    BasalTotal,
    BasalSet,
}

impl MenuType {
    /// MAIN and STOP are the two screens the pump rests on
    pub fn is_root(self) -> bool {
        matches!(self, MenuType::MainMenu | MenuType::StopMenu)
    }
}

impl fmt::Display for MenuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MenuType::MainMenu => "MAIN_MENU",
            MenuType::StopMenu => "STOP",
            MenuType::WarningOrError => "WARNING_OR_ERROR",
            MenuType::BolusMenu => "BOLUS_MENU",
            MenuType::BolusEnter => "BOLUS_ENTER",
            MenuType::TbrMenu => "TBR_MENU",
            MenuType::TbrSet => "TBR_SET",
            MenuType::TbrDuration => "TBR_DURATION",
            MenuType::MyDataMenu => "MY_DATA_MENU",
            MenuType::BolusData => "BOLUS_DATA",
            MenuType::ErrorData => "ERROR_DATA",
            MenuType::DailyData => "DAILY_DATA",
            MenuType::TbrData => "TBR_DATA",
            MenuType::Basal1Menu => "BASAL_1_MENU",
            MenuType::BasalTotal => "BASAL_TOTAL",
            MenuType::BasalSet => "BASAL_SET",
        };
        f.write_str(name)
    }
}

/// Values the driver extracts from a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MenuAttribute {
    /// TBR percentage, 100 when no TBR runs
    Tbr,
    /// Remaining TBR runtime or a record's duration
    Runtime,
    BasalRate,
    BatteryState,
    InsulinState,
    Message,
    WarningCode,
    ErrorCode,
    Bolus,
    BolusType,
    BolusRemaining,
    CurrentRecord,
    TotalRecord,
    Date,
    Time,
    DailyTotal,
    BasalStart,
    BasalEnd,
    BasalTotal,
}

impl fmt::Display for MenuAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Hours and minutes as displayed, used both for clock times and durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MenuTime {
    pub hour: u32,
    pub minute: u32,
}

impl MenuTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(minutes / 60, minutes % 60)
    }

    pub fn total_minutes(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl fmt::Display for MenuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Day and month as displayed; the pump never shows the year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MenuDate {
    pub day: u32,
    pub month: u32,
}

impl MenuDate {
    pub fn new(day: u32, month: u32) -> Self {
        Self { day, month }
    }
}

impl fmt::Display for MenuDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}.", self.day, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusType {
    Normal,
    Extended,
    Multiwave,
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum MenuValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
    Time(MenuTime),
    Date(MenuDate),
    BolusType(BolusType),
    /// The value was blinking and could not be read on this refresh
    Blink,
}

impl fmt::Display for MenuValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuValue::Integer(v) => write!(f, "{v}"),
            MenuValue::Decimal(v) => write!(f, "{v}"),
            MenuValue::Text(v) => f.write_str(v),
            MenuValue::Time(v) => write!(f, "{v}"),
            MenuValue::Date(v) => write!(f, "{v}"),
            MenuValue::BolusType(v) => write!(f, "{v:?}"),
            MenuValue::Blink => f.write_str("<blinking>"),
        }
    }
}

/// One decoded screen
#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    pub menu_type: MenuType,
    attributes: BTreeMap<MenuAttribute, MenuValue>,
}

impl Menu {
    pub fn new(menu_type: MenuType) -> Self {
        Self {
            menu_type,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter used by drivers
    pub fn with(mut self, attribute: MenuAttribute, value: MenuValue) -> Self {
        self.attributes.insert(attribute, value);
        self
    }

    pub fn attribute(&self, attribute: MenuAttribute) -> Option<&MenuValue> {
        self.attributes.get(&attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&MenuAttribute, &MenuValue)> {
        self.attributes.iter()
    }

    pub fn integer(&self, attribute: MenuAttribute) -> Option<i64> {
        match self.attribute(attribute)? {
            MenuValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Decimal value; integers are widened since the decoder is not always consistent
    pub fn decimal(&self, attribute: MenuAttribute) -> Option<f64> {
        match self.attribute(attribute)? {
            MenuValue::Decimal(v) => Some(*v),
            MenuValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text(&self, attribute: MenuAttribute) -> Option<&str> {
        match self.attribute(attribute)? {
            MenuValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn time(&self, attribute: MenuAttribute) -> Option<MenuTime> {
        match self.attribute(attribute)? {
            MenuValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn date(&self, attribute: MenuAttribute) -> Option<MenuDate> {
        match self.attribute(attribute)? {
            MenuValue::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bolus_type(&self, attribute: MenuAttribute) -> Option<BolusType> {
        match self.attribute(attribute)? {
            MenuValue::BolusType(v) => Some(*v),
            _ => None,
        }
    }

    /// Alarm text of a WARNING_OR_ERROR screen
    pub fn message(&self) -> Option<&str> {
        self.text(MenuAttribute::Message)
    }
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.menu_type)?;
        for (i, (attribute, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{attribute}={value}")?;
        }
        f.write_str("}")
    }
}

/// Physical pump buttons with the codes the driver sends for them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    NoKey,
    Menu,
    Check,
    Up,
    Down,
    Back,
}

impl Key {
    pub fn code(self) -> u8 {
        match self {
            Key::NoKey => 0x00,
            Key::Menu => 0x03,
            Key::Check => 0x0C,
            Key::Up => 0x30,
            Key::Down => 0xC0,
            Key::Back => 0x33,
        }
    }
}
