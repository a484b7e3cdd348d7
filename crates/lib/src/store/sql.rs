//! # SQLite Schema
//!
//! This module centralizes the table definitions for the take-back store.
//! Referential checks are performed by the application before writing, so no
//! foreign-key clauses appear here.

pub const CREATE_USERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT UNIQUE,
    phone TEXT UNIQUE,
    address TEXT,
    password_hash TEXT,
    role TEXT NOT NULL DEFAULT 'USER',
    points INTEGER NOT NULL DEFAULT 0,
    wants_collaborator INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
)";

pub const CREATE_USER_SESSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS user_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    session_token TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    expires_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

pub const CREATE_PHARMACIES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS pharmacies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT,
    phone TEXT,
    opening_hours TEXT,
    latitude REAL,
    longitude REAL,
    note TEXT,
    created_at TEXT NOT NULL
)";

pub const CREATE_MEDICINE_TYPES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS medicine_types (
    id TEXT PRIMARY KEY,
    active_ingredient TEXT NOT NULL,
    brand TEXT,
    strength TEXT,
    dosage_form TEXT,
    note TEXT,
    created_at TEXT NOT NULL
)";

pub const CREATE_SUBMISSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY,
    submitter_id TEXT NOT NULL,
    pharmacy_id TEXT NOT NULL,
    medicine_type_id TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit TEXT,
    expiry_date TEXT,
    certificate_url TEXT,
    note TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    points_awarded INTEGER,
    submitted_at TEXT NOT NULL
)";

pub const CREATE_CRITERIA_TABLE: &str = "
CREATE TABLE IF NOT EXISTS criteria (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    data_type TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
)";

pub const CREATE_CLASSIFICATION_RESULTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS classification_results (
    id TEXT PRIMARY KEY,
    submission_id TEXT NOT NULL UNIQUE,
    overall TEXT NOT NULL,
    reviewer_id TEXT,
    notes TEXT,
    evaluated_at TEXT NOT NULL
)";

pub const CREATE_CLASSIFICATION_DETAILS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS classification_details (
    id TEXT PRIMARY KEY,
    result_id TEXT NOT NULL,
    criterion_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    measured_value TEXT,
    evidence_url TEXT,
    note TEXT
)";

pub const CREATE_VOUCHERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS vouchers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    points_cost INTEGER NOT NULL,
    remaining INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    expires_on TEXT,
    created_at TEXT NOT NULL
)";

pub const CREATE_VOUCHER_USAGES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS voucher_usages (
    id TEXT PRIMARY KEY,
    voucher_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    redeemed_at TEXT NOT NULL,
    points_used INTEGER NOT NULL
)";

pub const CREATE_NOTIFICATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    sender_id TEXT,
    recipient_id TEXT NOT NULL,
    body TEXT NOT NULL,
    kind TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    metadata TEXT,
    created_at TEXT NOT NULL
)";

pub const CREATE_POINT_LEDGER_TABLE: &str = "
CREATE TABLE IF NOT EXISTS point_ledger (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    reason TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

pub const CREATE_MESSAGES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL,
    recipient_id TEXT,
    content TEXT NOT NULL,
    kind TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

pub const CREATE_MESSAGE_DETAILS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS message_details (
    message_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    is_delivered INTEGER NOT NULL DEFAULT 0,
    read_at TEXT,
    delivered_at TEXT,
    PRIMARY KEY (message_id, user_id)
)";

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_submissions_submitter ON submissions (submitter_id)",
    "CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions (status)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications (recipient_id)",
    "CREATE INDEX IF NOT EXISTS idx_point_ledger_user ON point_ledger (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages (conversation_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON user_sessions (user_id)",
];

/// All table definitions in creation order.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_USER_SESSIONS_TABLE,
    CREATE_PHARMACIES_TABLE,
    CREATE_MEDICINE_TYPES_TABLE,
    CREATE_SUBMISSIONS_TABLE,
    CREATE_CRITERIA_TABLE,
    CREATE_CLASSIFICATION_RESULTS_TABLE,
    CREATE_CLASSIFICATION_DETAILS_TABLE,
    CREATE_VOUCHERS_TABLE,
    CREATE_VOUCHER_USAGES_TABLE,
    CREATE_NOTIFICATIONS_TABLE,
    CREATE_POINT_LEDGER_TABLE,
    CREATE_MESSAGES_TABLE,
    CREATE_MESSAGE_DETAILS_TABLE,
];
