mod jsonl;

pub use jsonl::{flush_citizen_names, load_citizen_names};
