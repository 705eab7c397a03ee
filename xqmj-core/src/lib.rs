pub mod ai;
pub mod directory;
pub mod error;
pub mod messages;
pub mod room;
pub mod rules;
pub mod seat;
pub mod tile;
pub mod timers;
