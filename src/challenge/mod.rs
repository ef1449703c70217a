//! Group challenges: creating them, joining within capacity, inviting friends
//! and moving them through their lifecycle.

mod core;
mod endpoints;
mod invite;
mod participation;
mod scheduler;

pub use core::{
    Challenge, ChallengeFields, ChallengeInvite, ChallengeStatus, Release, create_challenge_tables,
    decrement_capacity, get_challenge, get_new_challenges, get_participating_challenges,
    get_top_challenges, increment_capacity, insert_challenge, insert_participant, is_participant,
    remove_participant, search_challenges, set_challenge_status, update_challenge_fields,
};
pub use endpoints::{
    accept_invite_endpoint, create_challenge_endpoint, delete_challenge_endpoint, exit_endpoint,
    get_challenge_endpoint, invite_endpoint, my_challenges_endpoint, my_invites_endpoint,
    new_challenges_endpoint, participate_endpoint, reject_invite_endpoint,
    search_challenges_endpoint, top_challenges_endpoint, update_challenge_endpoint,
};
pub use invite::{accept_invite, get_my_invites, invite_friend, reject_invite};
pub use participation::{
    create_challenge, delete_challenge, join_challenge, leave_challenge, update_challenge,
};
pub use scheduler::run_challenge_scheduler;
