use anyhow::Result;
use async_trait::async_trait;
use core_access::{Role, User};
use medreturn::{
    errors::ChatbotError,
    points,
    providers::chatbot::{ChatbotProvider, ChatbotRequest},
    reference::{self, Criterion, CriterionInput, MedicineType, MedicineTypeInput, Pharmacy, PharmacyInput},
    store::{columns, Store},
    vouchers::{self, Voucher, VoucherInput},
};
use std::sync::{Arc, Mutex, OnceLock};
use turso::params;
use uuid::Uuid;

/// Password every seeded user can log in with.
pub const SEED_PASSWORD: &str = "secret123";

/// Hashed once per test binary; argon2 is too slow to run per seeded user.
fn seed_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        core_access::password::hash_password(SEED_PASSWORD).expect("seed password hashes")
    })
}

// --- Test Setup ---

/// A helper struct to manage database creation for each test.
pub struct TestSetup {
    pub store: Store,
}

impl TestSetup {
    /// Creates a new, isolated in-memory store and initializes the schema.
    pub async fn new() -> Result<Self> {
        let store = Store::open_in_memory().await?;
        store.initialize_schema().await?;
        Ok(Self { store })
    }

    /// Inserts a user directly, bypassing registration and its first-user rule.
    pub async fn seed_user(&self, full_name: &str, role: Role) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@example.com", &id[..8]);
        let tx = self.store.write().await?;
        tx.execute(
            "INSERT INTO users (id, full_name, email, phone, address, password_hash, role, points, wants_collaborator, created_at) VALUES (?, ?, ?, NULL, NULL, ?, ?, 0, 0, ?)",
            params![
                id.as_str(),
                full_name,
                email.as_str(),
                seed_password_hash(),
                role.as_str(),
                columns::timestamp_now()
            ],
        )
        .await?;
        tx.commit().await?;
        let conn = self.store.read().await?;
        Ok(core_access::get_user(&conn, &id).await?)
    }

    /// Gives the user points through the ledger, as an approval would.
    pub async fn seed_points(&self, user_id: &str, amount: i64) -> Result<i64> {
        let tx = self.store.write().await?;
        let balance = points::credit(&tx, user_id, amount, "Điểm khởi tạo").await;
        Ok(tx.settle(balance).await?)
    }

    pub async fn seed_pharmacy(&self, name: &str) -> Result<Pharmacy> {
        let tx = self.store.write().await?;
        let input = PharmacyInput {
            name: name.to_string(),
            address: Some("12 Lê Lợi, Quận 1".to_string()),
            ..Default::default()
        };
        let pharmacy = reference::create_pharmacy(&tx, input).await;
        Ok(tx.settle(pharmacy).await?)
    }

    pub async fn seed_medicine_type(&self, active_ingredient: &str) -> Result<MedicineType> {
        let tx = self.store.write().await?;
        let input = MedicineTypeInput {
            active_ingredient: active_ingredient.to_string(),
            brand: Some("Generic".to_string()),
            ..Default::default()
        };
        let medicine_type = reference::create_medicine_type(&tx, input).await;
        Ok(tx.settle(medicine_type).await?)
    }

    pub async fn seed_criterion(&self, code: &str, name: &str) -> Result<Criterion> {
        let tx = self.store.write().await?;
        let input = CriterionInput {
            code: code.to_string(),
            name: name.to_string(),
            ..Default::default()
        };
        let criterion = reference::create_criterion(&tx, input).await;
        Ok(tx.settle(criterion).await?)
    }

    pub async fn seed_voucher(
        &self,
        name: &str,
        points_cost: i64,
        remaining: i64,
        expires_on: Option<&str>,
    ) -> Result<Voucher> {
        let tx = self.store.write().await?;
        let input = VoucherInput {
            name: name.to_string(),
            description: None,
            points_cost,
            remaining,
            status: None,
            expires_on: expires_on.map(str::to_string),
        };
        let voucher = vouchers::create_voucher(&tx, &input).await;
        Ok(tx.settle(voucher).await?)
    }

    /// Counts rows in `table` matching an optional `column = value` filter.
    pub async fn count_rows(&self, table: &str, filter: Option<(&str, &str)>) -> Result<i64> {
        let conn = self.store.read().await?;
        let mut rows = match filter {
            Some((column, value)) => {
                let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?");
                conn.query(&sql, params![value]).await?
            }
            None => {
                let sql = format!("SELECT COUNT(*) FROM {table}");
                conn.query(&sql, ()).await?
            }
        };
        match rows.next().await? {
            Some(row) => Ok(columns::integer(&row, 0)?),
            None => Ok(0),
        }
    }

    pub async fn balance(&self, user_id: &str) -> Result<i64> {
        let conn = self.store.read().await?;
        Ok(points::balance(&conn, user_id).await?)
    }
}

// --- Mock Chatbot ---

/// What the mock does when called.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Timeout,
    Status(u16),
}

#[derive(Clone, Debug)]
pub struct MockChatbot {
    reply: Arc<Mutex<MockReply>>,
    calls: Arc<Mutex<Vec<ChatbotRequest>>>,
}

impl MockChatbot {
    pub fn replying(text: &str) -> Self {
        Self::with(MockReply::Text(text.to_string()))
    }

    pub fn with(reply: MockReply) -> Self {
        Self {
            reply: Arc::new(Mutex::new(reply)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<ChatbotRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockChatbot {
    fn default() -> Self {
        Self::replying("Xin chào, tôi có thể giúp gì?")
    }
}

#[async_trait]
impl ChatbotProvider for MockChatbot {
    async fn reply(&self, request: &ChatbotRequest) -> Result<String, ChatbotError> {
        self.calls.lock().unwrap().push(request.clone());
        match self.reply.lock().unwrap().clone() {
            MockReply::Text(text) => Ok(text),
            MockReply::Timeout => Err(ChatbotError::Timeout),
            MockReply::Status(code) => Err(ChatbotError::Status(code)),
        }
    }
}
