//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
pub const ITEM_FAILURES: i32 = 1; // Batch completed, at least one item failed or was cancelled
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, config or input file
