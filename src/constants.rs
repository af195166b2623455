// --- ACCRUAL CONSTANTS ---
/// Seconds in the 365.25-day accrual year
pub const SECONDS_PER_YEAR: i64 = 31_557_600;
/// 10000 bps = 100%
pub const BPS_DENOMINATOR: i64 = 10_000;
pub const SECONDS_PER_DAY: i64 = 86_400;
/// Horizon used when a projection request names none
pub const DEFAULT_PROJECTION_DAYS: u32 = 30;
pub const MAX_PROJECTION_DAYS: u32 = 3_650;

// --- RATE SYNC CONSTANTS ---
/// Volatility index treated as neutral (multiplier of exactly 1)
pub const NEUTRAL_VOLATILITY_INDEX: i64 = 25;
/// Index points per unit of multiplier change
pub const VOLATILITY_SCALE: i64 = 250;
pub const MAX_VOLATILITY_INDEX: i64 = 100;
/// Requests per second allowed against a single HTTP rate source
pub const RATE_SOURCE_REQUESTS_PER_SECOND: u32 = 5;

// --- SCORING CONSTANTS ---
pub const DEFAULT_RISK_TOLERANCE: u8 = 5;
/// Strategies riskier than tolerance + this margin are never recommended
pub const RISK_TOLERANCE_MARGIN: u8 = 2;
pub const HIGH_CONFIDENCE_SCORE: u8 = 80;
pub const MEDIUM_CONFIDENCE_SCORE: u8 = 60;

// --- JOB NAMES ---
pub const RATE_SYNC_JOB: &str = "rate_sync";
pub const ACCRUAL_JOB: &str = "accrual";
