//! SQLite calendar store and sample-data seeder.
//!
//! # Intention
//!
//! - Own the calendar schema: users, meeting rooms, events and the user/event join.
//! - Load a fixed sample data set in one transaction, all or nothing.
//! - Offer the small set of calendar queries the sample data is meant to exercise.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No HTTP surface and no natural-language handling.

pub mod config;
pub mod error;
pub mod models;
pub mod schema;
pub mod seed;
pub mod service;
pub mod store;

pub use config::CalendarConfig;
pub use error::{CalendarError, Result};
pub use models::{
    Attendee, Event, EventDetails, EventUpdate, MeetingRoom, NewEvent, TimeSlot, User,
};
pub use seed::{seed, SeedData, SeedReport};
pub use service::{CalendarService, Lifecycle};
pub use store::CalendarStore;
