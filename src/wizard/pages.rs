// src/wizard/pages.rs - Wizard page navigation
use serde::Serialize;
use std::fmt;

use crate::models::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    SlotPick = 0,
    FunctionPick = 1,
    SpoolPick = 2,
    NozzleHeat = 3,
    Operation = 4,
}

impl Page {
    pub fn index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Page::SlotPick),
            1 => Some(Page::FunctionPick),
            2 => Some(Page::SpoolPick),
            3 => Some(Page::NozzleHeat),
            4 => Some(Page::Operation),
            _ => None,
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Where a navigation step lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Navigation {
    Page(Page),
    /// Leave the wizard entirely.
    MainScreen,
}

#[derive(Debug, Clone)]
pub struct PageController {
    page: Page,
    operation: Option<Operation>,
    previous_hotend_target: f64,
}

impl PageController {
    /// `previous_hotend_target` is restored on teardown.
    pub fn new(previous_hotend_target: f64) -> Self {
        Self {
            page: Page::SlotPick,
            operation: None,
            previous_hotend_target,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn previous_hotend_target(&self) -> f64 {
        self.previous_hotend_target
    }

    pub fn choose_operation(&mut self, operation: Operation) {
        self.operation = Some(operation);
    }

    pub fn set_page(&mut self, page: Page) {
        if page != self.page {
            tracing::info!("Wizard page {} -> {}", self.page, page);
        }
        self.page = page;
    }

    /// Where forward leads from the current page, without moving.
    pub fn forward_target(&self, return_to_main: bool) -> Navigation {
        if return_to_main {
            return Navigation::MainScreen;
        }
        match self.page {
            Page::FunctionPick => match self.operation {
                Some(Operation::LoadToNozzle | Operation::UnloadFromNozzle) => {
                    Navigation::Page(Page::SpoolPick)
                }
                Some(Operation::Load) => Navigation::Page(Page::NozzleHeat),
                Some(_) => Navigation::Page(Page::Operation),
                None => Navigation::Page(Page::FunctionPick),
            },
            Page::SpoolPick => Navigation::Page(Page::Operation),
            Page::Operation => Navigation::MainScreen,
            page => Page::from_index(page.index() + 1)
                .map(Navigation::Page)
                .unwrap_or(Navigation::MainScreen),
        }
    }

    /// Where back leads from the current page, without moving.
    pub fn back_target(&self) -> Navigation {
        match self.page {
            Page::SlotPick => Navigation::MainScreen,
            Page::NozzleHeat => Navigation::Page(Page::FunctionPick),
            Page::Operation => match self.operation {
                Some(Operation::Load) => Navigation::Page(Page::NozzleHeat),
                Some(Operation::LoadToNozzle | Operation::UnloadFromNozzle) => {
                    Navigation::Page(Page::SpoolPick)
                }
                _ => Navigation::Page(Page::FunctionPick),
            },
            page => Page::from_index(page.index() - 1)
                .map(Navigation::Page)
                .unwrap_or(Navigation::MainScreen),
        }
    }

    pub fn forward(&mut self, return_to_main: bool) -> Navigation {
        let target = self.forward_target(return_to_main);
        self.follow(target);
        target
    }

    pub fn back(&mut self) -> Navigation {
        let target = self.back_target();
        self.follow(target);
        target
    }

    fn follow(&mut self, target: Navigation) {
        if let Navigation::Page(page) = target {
            self.set_page(page);
        }
    }
}
