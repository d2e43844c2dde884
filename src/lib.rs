//! sheetdo: a todo list kept in a Google spreadsheet, with daily LINE
//! reminders for items falling due.

pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod paths;
pub mod schedule;
pub mod sheet;
pub mod storage;
pub mod todo;
pub mod web;
