//! Collaborator requests: a user asks to become CONGTACVIEN, an admin decides.

use crate::{
    errors::DomainError,
    notifications::{self, OutgoingNotification},
    store::Store,
    types::NotificationKind,
};
use core_access::{Role, User};
use serde::Serialize;
use tracing::info;

const APPROVED_NOTICE: &str = "Chúc mừng! Yêu cầu trở thành Cộng tác viên của bạn đã được phê duyệt. Bạn giờ có thể truy cập các tính năng dành cho Cộng tác viên.";
const REJECTED_NOTICE: &str = "Rất tiếc, yêu cầu trở thành Cộng tác viên của bạn đã bị từ chối. Vui lòng liên hệ admin để biết thêm chi tiết hoặc gửi lại yêu cầu sau.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorDecision {
    Approve,
    Reject,
}

impl CollaboratorDecision {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(DomainError::InvalidInput(format!(
                "Hành động '{other}' không hợp lệ, chỉ chấp nhận approve hoặc reject"
            ))),
        }
    }
}

/// Flags the user's wish to become a collaborator.
pub async fn request_collaborator(store: &Store, user: &User) -> Result<(), DomainError> {
    if user.role != Role::User.as_str() {
        return Err(DomainError::Conflict(
            "Bạn đã là Cộng tác viên hoặc Quản trị viên".to_string(),
        ));
    }
    if user.wants_collaborator {
        return Err(DomainError::Conflict(
            "Bạn đã gửi yêu cầu trước đó".to_string(),
        ));
    }
    let tx = store.write().await?;
    let result = core_access::set_collaborator_request(&tx, &user.id, true)
        .await
        .map_err(DomainError::from);
    tx.settle(result).await?;
    info!(user_id = %user.id, "Collaborator request submitted");
    Ok(())
}

/// Approves (role becomes CONGTACVIEN) or rejects a pending request. Either
/// way the flag is cleared and the user gets a SYSTEM notification.
pub async fn decide_collaborator_request(
    store: &Store,
    user_id: &str,
    decision: CollaboratorDecision,
) -> Result<User, DomainError> {
    let tx = store.write().await?;
    let result: Result<User, DomainError> = async {
        let user = core_access::find_user_by_id(&tx, user_id)
            .await?
            .filter(|u| u.wants_collaborator)
            .ok_or_else(|| {
                DomainError::not_found("Không tìm thấy người dùng hoặc yêu cầu cộng tác viên")
            })?;

        let body = match decision {
            CollaboratorDecision::Approve => {
                core_access::set_role(&tx, &user.id, Role::Collaborator).await?;
                APPROVED_NOTICE
            }
            CollaboratorDecision::Reject => REJECTED_NOTICE,
        };
        core_access::set_collaborator_request(&tx, &user.id, false).await?;
        notifications::notify(
            &tx,
            &user.id,
            &OutgoingNotification::system(NotificationKind::System, body),
        )
        .await?;
        Ok(core_access::get_user(&tx, &user.id).await?)
    }
    .await;
    let user = tx.settle(result).await?;
    info!(user_id, ?decision, "Collaborator request decided");
    Ok(user)
}
