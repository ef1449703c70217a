//! Inviting friends to challenges and answering invites.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    auth::{UserID, change_participating_challenges, get_user_by_email},
    challenge::{
        ChallengeInvite, ChallengeStatus, get_challenge, increment_capacity, insert_participant,
        is_participant,
    },
    db::is_unique_violation,
};

const SELECT_INVITE: &str = "SELECT
        i.id, i.inviter_id, u.nickname, i.invitee_id, i.challenge_id, ch.title
    FROM challenge_invite i
    INNER JOIN user u ON u.id = i.inviter_id
    INNER JOIN challenge ch ON ch.id = i.challenge_id";

fn map_invite_row(row: &Row) -> Result<ChallengeInvite, rusqlite::Error> {
    Ok(ChallengeInvite {
        id: row.get(0)?,
        inviter_id: row.get(1)?,
        inviter_nickname: row.get(2)?,
        invitee_id: row.get(3)?,
        challenge_id: row.get(4)?,
        challenge_title: row.get(5)?,
    })
}

/// Get the invite `id` if it was sent to `invitee_id`.
///
/// # Errors
/// Returns [Error::InviteNotFound] if the invite does not exist or was sent to another user.
pub fn get_invite(
    id: i64,
    invitee_id: UserID,
    connection: &Connection,
) -> Result<ChallengeInvite, Error> {
    connection
        .prepare(&format!("{SELECT_INVITE} WHERE i.id = ?1 AND i.invitee_id = ?2"))?
        .query_row((id, invitee_id), map_invite_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InviteNotFound,
            error => error.into(),
        })
}

/// Invite the user registered with `invitee_email` to the challenge.
///
/// # Errors
/// Returns:
/// - [Error::ChallengeNotFound] or [Error::UserNotFound] if either does not exist,
/// - [Error::InviteInvalid] if the inviter does not participate in the challenge,
/// - [Error::ChallengeNotRecruiting] if the challenge has started,
/// - [Error::AlreadyParticipating] if the invitee already participates,
/// - [Error::ChallengeFull] if there are no places left,
/// - [Error::InviteAlreadyExists] if the invitee already has a pending invite.
pub fn invite_friend(
    inviter_id: UserID,
    challenge_id: i64,
    invitee_email: &str,
    connection: &Connection,
) -> Result<ChallengeInvite, Error> {
    let challenge = get_challenge(challenge_id, connection)?;
    let invitee = get_user_by_email(invitee_email.trim(), connection)?;

    if !is_participant(inviter_id, challenge_id, connection)? {
        return Err(Error::InviteInvalid);
    }

    if challenge.status != ChallengeStatus::Recruiting {
        return Err(Error::ChallengeNotRecruiting);
    }

    if is_participant(invitee.id, challenge_id, connection)? {
        return Err(Error::AlreadyParticipating);
    }

    if challenge.is_full() {
        return Err(Error::ChallengeFull);
    }

    connection
        .execute(
            "INSERT INTO challenge_invite (inviter_id, invitee_id, challenge_id)
            VALUES (?1, ?2, ?3)",
            (inviter_id, invitee.id, challenge_id),
        )
        .map_err(|error| {
            if is_unique_violation(&error) {
                Error::InviteAlreadyExists
            } else {
                error.into()
            }
        })?;

    let id = connection.last_insert_rowid();

    tracing::info!("User {inviter_id} invited user {} to challenge {challenge_id}", invitee.id);

    get_invite(id, invitee.id, connection)
}

/// Get the invites sent to the user, newest first.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_my_invites(
    invitee_id: UserID,
    connection: &Connection,
) -> Result<Vec<ChallengeInvite>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_INVITE} WHERE i.invitee_id = ?1 ORDER BY i.id DESC"
        ))?
        .query_map([invitee_id], map_invite_row)?
        .map(|maybe_invite| maybe_invite.map_err(Error::from))
        .collect()
}

/// Accept the invite and join its challenge.
///
/// Taking the place, removing the invite and recording the participant
/// happen in one transaction. If any step fails the invite is kept.
///
/// # Errors
/// Returns:
/// - [Error::InviteNotFound] if the invite does not exist or was sent to another user,
/// - [Error::AlreadyParticipating] if the user joined the challenge some other way,
/// - [Error::ChallengeNotRecruiting] if the challenge has started,
/// - [Error::ChallengeFull] if there are no places left.
pub fn accept_invite(
    invite_id: i64,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let invite = get_invite(invite_id, user_id, connection)?;
    let challenge = get_challenge(invite.challenge_id, connection)?;

    if is_participant(user_id, challenge.id, connection)? {
        return Err(Error::AlreadyParticipating);
    }

    if challenge.status != ChallengeStatus::Recruiting {
        return Err(Error::ChallengeNotRecruiting);
    }

    if challenge.is_full() {
        return Err(Error::ChallengeFull);
    }

    let transaction = connection.unchecked_transaction()?;

    increment_capacity(challenge.id, challenge.version, &transaction)?;
    transaction.execute("DELETE FROM challenge_invite WHERE id = ?1", [invite.id])?;
    insert_participant(user_id, challenge.id, &transaction)?;
    change_participating_challenges(user_id, 1, &transaction)?;

    transaction.commit()?;

    tracing::info!("User {user_id} accepted invite {invite_id} to challenge {}", challenge.id);

    Ok(())
}

/// Reject the invite, removing it without joining.
///
/// # Errors
/// Returns [Error::InviteNotFound] if the invite does not exist or was sent to another user.
pub fn reject_invite(invite_id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM challenge_invite WHERE id = ?1 AND invitee_id = ?2",
        (invite_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::InviteNotFound);
    }

    Ok(())
}

#[cfg(test)]
mod invite_tests {
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        Error, User,
        auth::get_user_by_id,
        challenge::{
            Challenge, ChallengeFields, Release, create_challenge, get_challenge, is_participant,
        },
        test_utils::{get_test_connection, insert_test_user},
    };

    use super::{accept_invite, get_my_invites, invite_friend, reject_invite};

    fn set_up(capacity: i64) -> (Connection, User, User, Challenge) {
        let conn = get_test_connection();
        let inviter = insert_test_user(&conn, "inviter@bar.baz");
        let invitee = insert_test_user(&conn, "invitee@bar.baz");
        let challenge = create_challenge(
            ChallengeFields {
                title: "No coffee April".to_owned(),
                text: "Spend less on coffee".to_owned(),
                capacity,
                release: Release::Private,
                start_date: date!(2025-04-01),
                end_date: date!(2025-04-30),
                categories: vec![],
            },
            inviter.id,
            datetime!(2025-03-20 10:00:00),
            &conn,
        )
        .unwrap();

        (conn, inviter, invitee, challenge)
    }

    fn count_invites(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM challenge_invite", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn invite_is_listed_for_invitee() {
        let (conn, inviter, invitee, challenge) = set_up(3);

        let invite = invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn).unwrap();

        assert_eq!(invite.inviter_nickname, "inviter");
        assert_eq!(invite.challenge_title, "No coffee April");
        assert_eq!(get_my_invites(invitee.id, &conn).unwrap(), vec![invite]);
        assert!(get_my_invites(inviter.id, &conn).unwrap().is_empty());
    }

    #[test]
    fn non_participant_cannot_invite() {
        let (conn, _inviter, invitee, challenge) = set_up(3);

        assert_eq!(
            invite_friend(invitee.id, challenge.id, "inviter@bar.baz", &conn),
            Err(Error::InviteInvalid)
        );
    }

    #[test]
    fn second_invite_is_rejected() {
        let (conn, inviter, _invitee, challenge) = set_up(3);
        invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn).unwrap();

        assert_eq!(
            invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn),
            Err(Error::InviteAlreadyExists)
        );
    }

    #[test]
    fn cannot_invite_to_full_challenge() {
        let (conn, inviter, _invitee, challenge) = set_up(1);

        assert_eq!(
            invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn),
            Err(Error::ChallengeFull)
        );
    }

    #[test]
    fn cannot_invite_unknown_email() {
        let (conn, inviter, _invitee, challenge) = set_up(3);

        assert_eq!(
            invite_friend(inviter.id, challenge.id, "nobody@bar.baz", &conn),
            Err(Error::UserNotFound)
        );
    }

    #[test]
    fn accept_removes_invite_and_joins_once() {
        let (conn, inviter, invitee, challenge) = set_up(3);
        let invite = invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn).unwrap();

        accept_invite(invite.id, invitee.id, &conn).unwrap();

        assert_eq!(count_invites(&conn), 0);
        assert!(is_participant(invitee.id, challenge.id, &conn).unwrap());
        let participants: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM user_challenge WHERE user_id = ?1",
                [invitee.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(participants, 1);
        assert_eq!(get_challenge(challenge.id, &conn).unwrap().current_capacity, 2);
        assert_eq!(
            get_user_by_id(invitee.id, &conn).unwrap().participating_challenges,
            1
        );
    }

    #[test]
    fn reject_removes_invite_without_joining() {
        let (conn, inviter, invitee, challenge) = set_up(3);
        let invite = invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn).unwrap();

        reject_invite(invite.id, invitee.id, &conn).unwrap();

        assert_eq!(count_invites(&conn), 0);
        assert!(!is_participant(invitee.id, challenge.id, &conn).unwrap());
        assert_eq!(get_challenge(challenge.id, &conn).unwrap().current_capacity, 1);
    }

    #[test]
    fn only_the_invitee_can_answer() {
        let (conn, inviter, _invitee, challenge) = set_up(3);
        let invite = invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn).unwrap();

        assert_eq!(
            accept_invite(invite.id, inviter.id, &conn),
            Err(Error::InviteNotFound)
        );
        assert_eq!(
            reject_invite(invite.id, inviter.id, &conn),
            Err(Error::InviteNotFound)
        );
        assert_eq!(count_invites(&conn), 1);
    }

    #[test]
    fn accept_when_already_participating_keeps_invite() {
        let (conn, inviter, invitee, challenge) = set_up(3);
        let invite = invite_friend(inviter.id, challenge.id, "invitee@bar.baz", &conn).unwrap();
        conn.execute(
            "INSERT INTO user_challenge (user_id, challenge_id) VALUES (?1, ?2)",
            (invitee.id, challenge.id),
        )
        .unwrap();

        assert_eq!(
            accept_invite(invite.id, invitee.id, &conn),
            Err(Error::AlreadyParticipating)
        );
        assert_eq!(count_invites(&conn), 1);
    }
}
