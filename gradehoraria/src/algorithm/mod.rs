// Algoritmos del núcleo: tiempo, conflictos, diff, sufijos y créditos.
pub mod conflict;
pub mod credits;
pub mod diff;
pub mod suffix;
pub mod time;

pub use conflict::{conflicts_for, detect_conflicts, merge_sources};
pub use credits::{CreditSummary, summarize};
pub use diff::{PendingChanges, RowChange, compute_changes, flatten_entries};
pub use suffix::allocate_slots;
pub use time::{Timed, end_time, overlaps};
