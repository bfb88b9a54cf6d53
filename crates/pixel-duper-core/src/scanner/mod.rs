mod walk;

pub use walk::collect_input_files;
