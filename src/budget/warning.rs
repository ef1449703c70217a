//! Warns users by push notification once they have spent half of their budget.

use crate::{
    Error,
    achievement::{AchievementKind, increment_achievement},
    auth::UserID,
    budget::{BudgetSummary, get_budget_summary},
    db::lock_connection,
    events::EventContext,
    notification::{SpendNotification, get_fcm_token},
    timezone::local_now,
};

const WARNING_TITLE: &str = "예산 경고";

fn warning_body(nickname: &str, summary: &BudgetSummary) -> String {
    format!(
        "{nickname}님, 이번 달 예산 {}원 중 {}원을 사용해 {}%를 사용했어요.",
        summary.budget, summary.total, summary.usage_rate
    )
}

/// Send a budget warning to the user if their spend this month has reached half of their budget.
///
/// Users without a budget are skipped. The "budget warnings" achievement is
/// only counted once the notification has been delivered.
///
/// # Errors
/// Returns [Error::FcmTokenNotFound] if a warning is due but the user has not
/// registered a device, or any error from the notifier.
pub async fn send_limit_warning(
    user_id: UserID,
    nickname: &str,
    context: &EventContext,
) -> Result<(), Error> {
    let now = local_now(&context.local_timezone)?;

    let (summary, token) = {
        let connection = lock_connection(&context.db_connection)?;

        let summary = match get_budget_summary(user_id, now, &connection) {
            Ok(summary) => summary,
            Err(Error::BudgetNotFound) => return Ok(()),
            Err(error) => return Err(error),
        };

        if !summary.needs_warning() {
            tracing::debug!(
                "User {user_id} has used {}% of their budget, no warning needed",
                summary.usage_rate
            );
            return Ok(());
        }

        let token = get_fcm_token(user_id, &connection)?;

        (summary, token)
    };

    let notification = SpendNotification {
        token,
        title: WARNING_TITLE.to_owned(),
        body: warning_body(nickname, &summary),
        usage_rate: summary.usage_rate,
    };

    context
        .notifier
        .send_spend_notification(&notification)
        .await?;

    let connection = lock_connection(&context.db_connection)?;
    increment_achievement(user_id, AchievementKind::BudgetWarnings, &connection)?;

    tracing::info!(
        "Sent budget warning to user {user_id} at {}% usage",
        summary.usage_rate
    );

    Ok(())
}
