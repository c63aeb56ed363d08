use tracing::{error, warn};

use crossbar_core::activity::{Activity, EndOfConversationCode};
use crossbar_core::error::CrossbarError;

use super::{Replies, TurnRouter};

const USER_NOTICE: &str = "The agent hit an error and could not finish handling your message.";
const REMEDIATION_HINT: &str =
    "If this keeps happening, ask the operator to check the crossbard logs for the turn trace.";

impl TurnRouter {
    /// Best-effort cleanup after a failed turn. Three isolated steps: tell
    /// the user, let the active skill release its resources, purge the
    /// conversation's state. A failing step never blocks the next one, and
    /// recovery itself never fails.
    pub(super) async fn recover_turn(&self, activity: &Activity, err: CrossbarError) -> Replies {
        // Raw detail is operator-facing only; the user gets the generic
        // two-part notice.
        error!(
            conversation_id = %activity.conversation_id,
            error = %err,
            detail = ?err,
            "turn_failed"
        );
        let replies = vec![activity.reply(USER_NOTICE), activity.reply(REMEDIATION_HINT)];

        self.notify_active_skill(activity).await;

        if let Err(purge_err) = self.store.delete(&activity.conversation_id).await {
            error!(
                conversation_id = %activity.conversation_id,
                error = %purge_err,
                "state_purge_failed"
            );
        }

        replies
    }

    /// If a skill is still active, send it a root-caused termination so it
    /// can clean up its side of the conversation. Failures here are logged
    /// and swallowed.
    async fn notify_active_skill(&self, activity: &Activity) {
        let record = match self.load_record(&activity.conversation_id).await {
            Ok(record) => record,
            Err(load_err) => {
                warn!(
                    conversation_id = %activity.conversation_id,
                    error = %load_err,
                    "skill_termination_notice_skipped"
                );
                return;
            }
        };
        let Ok(Some((skill_id, skill_conversation_id))) =
            record.delegation.delegation(&activity.conversation_id)
        else {
            return;
        };
        let Some(skill) = self.registry.get(skill_id) else {
            warn!(
                conversation_id = %activity.conversation_id,
                skill_id,
                "skill_termination_notice_skipped"
            );
            return;
        };

        let termination = Activity::end_of_conversation(
            &activity.conversation_id,
            &activity.channel_id,
            EndOfConversationCode::RootSkillError,
        );
        if let Err(notice_err) = self
            .forwarder
            .forward(
                &self.caller_app_id,
                skill,
                self.registry.skill_host_endpoint(),
                skill_conversation_id,
                &termination,
            )
            .await
        {
            warn!(
                conversation_id = %activity.conversation_id,
                skill_id,
                error = %notice_err,
                "skill_termination_notice_failed"
            );
        }
    }
}
