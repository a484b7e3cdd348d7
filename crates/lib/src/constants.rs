//! Fixed business constants: point rules, default notes and user-facing text.

/// Point rule for submissions handed in at a partner pharmacy.
pub const PHARMACY_POINTS_FLOOR: i64 = 15;
pub const PHARMACY_POINTS_PER_TEN: i64 = 15;
/// Point rule for every other submission.
pub const SYSTEM_POINTS_FLOOR: i64 = 10;
pub const SYSTEM_POINTS_PER_TEN: i64 = 10;
/// Largest quantity a single submission may declare.
pub const MAX_SUBMISSION_QUANTITY: i64 = 1_000_000;

pub const DEFAULT_REJECT_NOTE: &str = "Không đạt tiêu chuẩn";
pub const DEFAULT_RETURN_NOTE: &str = "Cần bổ sung thông tin";
pub const DEFAULT_RECALL_NOTE: &str = "Vi phạm quy định";

pub const LEDGER_STATUS_COMPLETED: &str = "completed";

/// Prefix that marks chatbot turns stored in the shared messages table.
pub const BOT_PREFIX: &str = "[BOT] ";
pub const CHATBOT_HISTORY_LIMIT: usize = 10;
pub const CHATBOT_TIMEOUT_SECS: u64 = 30;

pub const CHATBOT_BUSY_REPLY: &str = "Xin lỗi, chatbot đang bận. Vui lòng thử lại sau.";
pub const CHATBOT_TIMEOUT_REPLY: &str = "Yêu cầu mất quá nhiều thời gian. Vui lòng thử lại.";
pub const CHATBOT_ERROR_REPLY: &str = "Đã xảy ra lỗi khi kết nối với chatbot. Vui lòng thử lại.";
pub const CHATBOT_EMPTY_REPLY: &str = "Xin lỗi, tôi không thể trả lời lúc này.";

/// Months covered by the dashboard trend series, current month included.
pub const DASHBOARD_MONTHS: u32 = 6;
pub const DASHBOARD_TOP_MEDICINES: i64 = 6;
/// Balance thresholds for the Silver, Gold and Platinum tiers.
pub const SILVER_TIER_POINTS: i64 = 150;
pub const GOLD_TIER_POINTS: i64 = 300;
pub const PLATINUM_TIER_POINTS: i64 = 500;
/// Label for submissions whose medicine type no longer resolves.
pub const UNKNOWN_MEDICINE_LABEL: &str = "Khác";

pub const NOTIFICATION_LIST_LIMIT: i64 = 100;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
