pub mod vault;

pub use vault::{VaultPaths, export_month, render_month_note};
