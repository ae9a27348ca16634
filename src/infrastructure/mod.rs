pub mod clock;
pub mod memory;
pub mod progress;
pub mod settings;
pub mod sqlite;
