pub mod console;
pub mod process_file;
