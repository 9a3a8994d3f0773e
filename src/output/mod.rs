pub mod formatters;

pub use formatters::{
    format_frame_dump, formatter_for, ConsoleFormatter, DataFormatter, HexFormatter, JsonFormatter,
    RegisterReading,
};
