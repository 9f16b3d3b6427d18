use sqlx::PgPool;

use crate::repository::billing as billing_repo;

/// Roles that receive billing notifications.
pub const BILLING_ADMIN_ROLES: &[&str] = &["org_admin", "property_manager"];

/// Insert one in-app notification per billing admin in the organization.
/// Notification failures are logged, never fatal to the caller.
pub async fn notify_billing_admins(
    pool: &PgPool,
    org_id: &str,
    category: &str,
    title: &str,
    body: &str,
) -> usize {
    let recipients = match billing_repo::member_ids_with_roles(pool, org_id, BILLING_ADMIN_ROLES)
        .await
    {
        Ok(recipients) => recipients,
        Err(error) => {
            tracing::warn!(org_id, category, error = %error, "failed to resolve notification recipients");
            return 0;
        }
    };
    if recipients.is_empty() {
        return 0;
    }

    if let Err(error) =
        billing_repo::insert_notifications(pool, org_id, &recipients, category, title, body).await
    {
        tracing::warn!(org_id, category, error = %error, "failed to insert notifications");
        return 0;
    }

    recipients.len()
}
