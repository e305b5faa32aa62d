use std::f32::consts::PI;

use ndarray::Array1;

use crate::world::{EntityState, MAX_HEALTH};

/// Length of an encoded state vector.
pub const STATE_SIZE: usize = 10;

/// Distance at which the distance feature saturates.
const DISTANCE_SCALE: f32 = 20.0;
const VELOCITY_SCALE: f32 = 10.0;

pub type StateVector = Array1<f32>;

/// Encode one combatant's view of a duel.
///
/// Feature order: own health, own food, distance, relative heading, velocity x,
/// velocity z, opponent reported health, sprinting, can-attack, distance delta. The
/// vector is all-zero when either entity is missing.
pub fn encode_state(
    own: Option<&EntityState>,
    opponent: Option<&EntityState>,
    previous_distance: Option<f32>,
    opponent_reported_health: f32,
) -> StateVector {
    let (own, opponent) = match (own, opponent) {
        (Some(own), Some(opponent)) => (own, opponent),
        _ => return Array1::zeros(STATE_SIZE),
    };

    let distance = own.position.distance(opponent.position);
    let dx = opponent.position.x - own.position.x;
    let dz = opponent.position.z - own.position.z;
    let relative_angle = wrap_angle(dz.atan2(dx) - own.yaw);
    let distance_delta = previous_distance.map_or(0.0, |prev| (distance - prev).tanh());

    Array1::from(vec![
        own.health / MAX_HEALTH,
        own.food / MAX_HEALTH,
        (distance / DISTANCE_SCALE).min(1.0),
        relative_angle / PI,
        own.velocity.x * VELOCITY_SCALE,
        own.velocity.z * VELOCITY_SCALE,
        opponent_reported_health / MAX_HEALTH,
        if own.sprinting { 1.0 } else { 0.0 },
        1.0,
        distance_delta,
    ])
}

/// Wrap an angle into `[-PI, PI)`.
fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}
