//! The services for creating, changing and deleting challenges, and for joining and leaving them.
//!
//! Taking a place in a challenge is guarded by the optimistic version column
//! on the challenge row, see [join_challenge].

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;
use time::PrimitiveDateTime;

use crate::{
    Error,
    auth::{UserID, change_participating_challenges},
    challenge::{
        Challenge, ChallengeFields, ChallengeStatus, decrement_capacity, get_challenge,
        increment_capacity, insert_challenge, insert_participant, is_participant,
        remove_participant, update_challenge_fields,
    },
    db::lock_connection,
};

/// How many times a join is attempted before giving up with [Error::CapacityChanged].
pub const MAX_JOIN_ATTEMPTS: u32 = 3;

const JOIN_BACKOFF: Duration = Duration::from_millis(20);

/// Create a challenge with the creator as its first participant.
///
/// # Errors
/// Returns an error if the fields are invalid or there is an SQL error.
pub fn create_challenge(
    fields: ChallengeFields,
    creator_id: UserID,
    now: PrimitiveDateTime,
    connection: &Connection,
) -> Result<Challenge, Error> {
    let fields = fields.validate()?;

    let transaction = connection.unchecked_transaction()?;

    let id = insert_challenge(&fields, creator_id, now, &transaction)?;
    increment_capacity(id, 0, &transaction)?;
    insert_participant(creator_id, id, &transaction)?;
    change_participating_challenges(creator_id, 1, &transaction)?;

    transaction.commit()?;

    tracing::info!("User {creator_id} created challenge {id}");

    get_challenge(id, connection)
}

fn check_creator(challenge: &Challenge, user_id: UserID) -> Result<(), Error> {
    if challenge.creator_id != user_id {
        return Err(Error::NotChallengeCreator);
    }

    Ok(())
}

fn check_recruiting(challenge: &Challenge) -> Result<(), Error> {
    if challenge.status != ChallengeStatus::Recruiting {
        return Err(Error::ChallengeNotRecruiting);
    }

    Ok(())
}

/// Replace the editable fields of a recruiting challenge.
///
/// # Errors
/// Returns:
/// - [Error::NotChallengeCreator] if the user did not create the challenge,
/// - [Error::ChallengeNotRecruiting] if the challenge has started,
/// - [Error::CapacityBelowParticipants] if the new capacity is too small,
/// - [Error::VersionConflict] if the challenge changed while being updated.
pub fn update_challenge(
    id: i64,
    user_id: UserID,
    fields: ChallengeFields,
    connection: &Connection,
) -> Result<Challenge, Error> {
    let fields = fields.validate()?;
    let challenge = get_challenge(id, connection)?;

    check_creator(&challenge, user_id)?;
    check_recruiting(&challenge)?;

    if fields.capacity < challenge.current_capacity {
        return Err(Error::CapacityBelowParticipants {
            capacity: fields.capacity,
            current: challenge.current_capacity,
        });
    }

    let transaction = connection.unchecked_transaction()?;
    update_challenge_fields(id, challenge.version, &fields, &transaction)?;
    transaction.commit()?;

    get_challenge(id, connection)
}

/// Delete a challenge along with its participants, invites and categories.
///
/// # Errors
/// Returns [Error::ChallengeNotFound] or [Error::NotChallengeCreator].
pub fn delete_challenge(id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let challenge = get_challenge(id, connection)?;
    check_creator(&challenge, user_id)?;

    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "UPDATE user
        SET participating_challenges = MAX(participating_challenges - 1, 0)
        WHERE id IN (SELECT user_id FROM user_challenge WHERE challenge_id = ?1)",
        [id],
    )?;
    transaction.execute("DELETE FROM challenge_invite WHERE challenge_id = ?1", [id])?;
    transaction.execute("DELETE FROM user_challenge WHERE challenge_id = ?1", [id])?;
    transaction.execute("DELETE FROM challenge_category WHERE challenge_id = ?1", [id])?;
    transaction.execute("DELETE FROM challenge WHERE id = ?1", [id])?;

    transaction.commit()?;

    tracing::info!("User {user_id} deleted challenge {id}");

    Ok(())
}

/// A single read-check-write attempt at joining.
///
/// The read and the write take the database lock separately, so another
/// request may change the challenge in between. The version check in the
/// write catches that.
fn try_join(
    db_connection: &Arc<Mutex<Connection>>,
    user_id: UserID,
    challenge_id: i64,
) -> Result<(), Error> {
    let challenge = {
        let connection = lock_connection(db_connection)?;
        let challenge = get_challenge(challenge_id, &connection)?;

        check_recruiting(&challenge)?;

        if is_participant(user_id, challenge_id, &connection)? {
            return Err(Error::AlreadyParticipating);
        }

        if challenge.is_full() {
            return Err(Error::ChallengeFull);
        }

        challenge
    };

    let connection = lock_connection(db_connection)?;
    let transaction = connection.unchecked_transaction()?;

    increment_capacity(challenge_id, challenge.version, &transaction)?;
    insert_participant(user_id, challenge_id, &transaction)?;
    change_participating_challenges(user_id, 1, &transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Add the user to the challenge's participants.
///
/// Lost version checks are retried up to [MAX_JOIN_ATTEMPTS] times with a
/// growing pause between attempts.
///
/// # Errors
/// Returns:
/// - [Error::ChallengeNotFound] if the challenge does not exist,
/// - [Error::ChallengeNotRecruiting] if the challenge has started,
/// - [Error::AlreadyParticipating] if the user already joined,
/// - [Error::ChallengeFull] if there are no places left,
/// - [Error::CapacityChanged] if every attempt lost the version check.
pub async fn join_challenge(
    db_connection: &Arc<Mutex<Connection>>,
    user_id: UserID,
    challenge_id: i64,
) -> Result<Challenge, Error> {
    for attempt in 1..=MAX_JOIN_ATTEMPTS {
        match try_join(db_connection, user_id, challenge_id) {
            Ok(()) => {
                tracing::info!("User {user_id} joined challenge {challenge_id}");
                let connection = lock_connection(db_connection)?;
                return get_challenge(challenge_id, &connection);
            }
            Err(Error::VersionConflict) => {
                tracing::debug!(
                    "Join of challenge {challenge_id} by user {user_id} lost the version check \
                    (attempt {attempt}/{MAX_JOIN_ATTEMPTS})"
                );
                tokio::time::sleep(JOIN_BACKOFF * attempt).await;
            }
            Err(error) => return Err(error),
        }
    }

    tracing::warn!("User {user_id} gave up joining challenge {challenge_id}");

    Err(Error::CapacityChanged)
}

/// Remove the user from the challenge's participants.
///
/// # Errors
/// Returns [Error::ChallengeNotFound] or [Error::NotParticipant].
pub fn leave_challenge(
    user_id: UserID,
    challenge_id: i64,
    connection: &Connection,
) -> Result<(), Error> {
    get_challenge(challenge_id, connection)?;

    let transaction = connection.unchecked_transaction()?;

    remove_participant(user_id, challenge_id, &transaction)?;
    decrement_capacity(challenge_id, &transaction)?;
    change_participating_challenges(user_id, -1, &transaction)?;

    transaction.commit()?;

    tracing::info!("User {user_id} left challenge {challenge_id}");

    Ok(())
}
