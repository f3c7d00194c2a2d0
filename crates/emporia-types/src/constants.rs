//! System-wide constants for the Emporia round orchestrator.

/// Default IDLE phase duration in milliseconds.
pub const DEFAULT_IDLE_MS: u64 = 250;

/// Default ENTERING phase duration in milliseconds.
pub const DEFAULT_ENTERING_MS: u64 = 1000;

/// Default OFFERING phase duration in milliseconds.
pub const DEFAULT_OFFERING_MS: u64 = 2000;

/// Minimum MATCHING phase dwell in milliseconds (after the engine ran).
pub const DEFAULT_MATCHING_MS: u64 = 100;

/// Default LEAVING phase duration in milliseconds.
pub const DEFAULT_LEAVING_MS: u64 = 2000;

/// How long a round report stays available after LEAVING opens.
pub const DEFAULT_RETENTION_MS: u64 = 5000;

/// Scheduler tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 10;

/// Per-arrival stagger added to ENTER wait hints, in milliseconds.
pub const DEFAULT_ENTER_STAGGER_MS: u64 = 1;

/// Fuel (executed instructions) granted to each program.
pub const DEFAULT_FUEL: u64 = 100_000;

/// Maximum data stack depth.
pub const DEFAULT_MAX_STACK: usize = 256;

/// Maximum return stack depth (nested word calls).
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Maximum intents a single program may emit.
pub const DEFAULT_MAX_INTENTS: usize = 64;

/// Screen buffer capacity in bytes.
pub const DEFAULT_SCREEN_BYTES: usize = 4096;

/// Maximum programs in a single OFFER call.
pub const MAX_PROGRAMS_PER_OFFER: usize = 10_000;

/// Maximum programs a single trader may submit per round.
pub const MAX_PROGRAMS_PER_TRADER: usize = 10_000;

/// Maximum program source size in bytes.
pub const MAX_CODE_BYTES: usize = 16 * 1024;

/// Maximum accounts a single program may act for.
pub const MAX_ACCOUNTS_PER_PROGRAM: usize = 16;

/// Maximum participants per round.
pub const MAX_PARTICIPANTS: usize = 100_000;

/// Maximum programs queued for a single round.
pub const MAX_PROGRAMS_PER_ROUND: usize = 1_000_000;

/// Depth of each market's inbound command queue.
pub const DEFAULT_COMMAND_QUEUE_DEPTH: usize = 1024;

/// Name of the market served when no configuration is supplied.
pub const DEFAULT_MARKET_NAME: &str = "0";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Emporia";
